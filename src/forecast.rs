/// Forecast orchestrator: chooses the prediction strategy, drives the
/// 72-step simulation (or the 3-day regression fallback) and assembles the
/// sorted output tables.
///
/// Strategy selection happens once per run: the hydrologic routing branch
/// requires a non-empty reach list, rating-curve list, and basin list; any
/// of them missing drops the whole run to the per-station regression
/// fallback. The engine is a pure function of its inputs: the regression
/// model is read-only here and identical inputs produce identical outputs.

use crate::config::EngineConfig;
use crate::hydro::basin::{lateral_inflow, resolve_precipitation};
use crate::hydro::network::RiverNetwork;
use crate::hydro::rating::{discharge_to_stage, stage_to_discharge};
use crate::hydro::routing::{route_step, update_node_discharge, EdgeState};
use crate::model::{
    join_key, round_stage, BasinParams, BasinRecord, DailyRow, EngineError, ForecastRow,
    ObservationRecord, RatingCurve, RatingCurveRecord, Reach, SeriesPoint, Station, StationSeries,
};
use crate::regression::{feature_vector, RegressionModel};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use std::collections::{BTreeMap, HashMap};

/// The pre-materialized input collections of one forecast run.
#[derive(Debug, Clone, Copy)]
pub struct ForecastInputs<'a> {
    pub stations: &'a [Station],
    pub observations: &'a [ObservationRecord],
    pub reaches: &'a [Reach],
    pub rating_curves: &'a [RatingCurveRecord],
    pub basins: &'a [BasinRecord],
}

/// Everything one run produces. Hourly rows sorted by (station code,
/// timestamp); daily rows by (river, station); the series map is ordered by
/// station code.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastOutput {
    pub hourly: Vec<ForecastRow>,
    pub daily: Vec<DailyRow>,
    pub series: BTreeMap<String, StationSeries>,
}

/// Display fields joined from station metadata, with lenient fallbacks for
/// observed stations that have no metadata row.
struct StationInfo<'a> {
    code: String,
    name: String,
    river: String,
    station: Option<&'a Station>,
}

fn station_info<'a>(key: &str, stations_by_code: &HashMap<String, &'a Station>) -> StationInfo<'a> {
    match stations_by_code.get(key) {
        Some(s) => StationInfo {
            code: s.code.trim().to_string(),
            name: s.name.clone(),
            river: s.river.clone(),
            station: Some(s),
        },
        None => StationInfo {
            code: key.to_string(),
            name: key.to_string(),
            river: String::new(),
            station: None,
        },
    }
}

/// Runs one forecast. `run_start` anchors step t=0; hourly steps are
/// t=1..=horizon.
pub fn run_forecast(
    inputs: &ForecastInputs,
    model: &RegressionModel,
    run_start: DateTime<Utc>,
    cfg: &EngineConfig,
) -> Result<ForecastOutput, EngineError> {
    if inputs.observations.is_empty() {
        return Err(EngineError::MissingInput(
            "no current water-level observations to forecast from".to_string(),
        ));
    }

    // one "now" snapshot per station; a later record for the same code wins
    let mut now_by_code: HashMap<String, ObservationRecord> = HashMap::new();
    for obs in inputs.observations {
        let key = join_key(&obs.station_code);
        if key.is_empty() {
            continue;
        }
        now_by_code.insert(key, obs.clone());
    }

    let stations_by_code: HashMap<String, &Station> = inputs
        .stations
        .iter()
        .map(|s| (join_key(&s.code), s))
        .collect();
    let curves_by_code: HashMap<String, RatingCurve> = inputs
        .rating_curves
        .iter()
        .map(|r| (join_key(&r.station_code), r.curve))
        .collect();
    let basins_by_name: HashMap<String, BasinParams> = inputs
        .basins
        .iter()
        .map(|b| (join_key(&b.basin), b.params))
        .collect();

    let use_routing = !inputs.reaches.is_empty()
        && !inputs.rating_curves.is_empty()
        && !inputs.basins.is_empty();

    let mut output = if use_routing {
        routing_branch(
            inputs,
            &now_by_code,
            &stations_by_code,
            &curves_by_code,
            &basins_by_name,
            run_start,
            cfg,
        )
    } else {
        fallback_branch(model, &now_by_code, &stations_by_code, run_start, cfg)
    };

    output.hourly.sort_by(|a, b| {
        a.station_code
            .cmp(&b.station_code)
            .then(a.timestamp.cmp(&b.timestamp))
    });
    output.daily.sort_by(|a, b| {
        a.river
            .cmp(&b.river)
            .then(a.station_name.cmp(&b.station_name))
            .then(a.station_code.cmp(&b.station_code))
    });
    Ok(output)
}

fn local_offset(cfg: &EngineConfig) -> FixedOffset {
    // the config offset is operator-supplied; fall back to UTC on a value
    // outside ±23 h rather than panicking mid-run
    cfg.local_utc_offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

fn hour_label(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format("%H:00").to_string()
}

fn local_date(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

// ---------------------------------------------------------------------------
// Branch A — hydrologic routing
// ---------------------------------------------------------------------------

fn routing_branch(
    inputs: &ForecastInputs,
    now_by_code: &HashMap<String, ObservationRecord>,
    stations_by_code: &HashMap<String, &Station>,
    curves_by_code: &HashMap<String, RatingCurve>,
    basins_by_name: &HashMap<String, BasinParams>,
    run_start: DateTime<Utc>,
    cfg: &EngineConfig,
) -> ForecastOutput {
    let offset = local_offset(cfg);
    let start_date = local_date(run_start, offset);

    let net = RiverNetwork::build(inputs.reaches);
    let params = net.reach_params(cfg);

    let curve_for = |key: &str| -> RatingCurve {
        curves_by_code
            .get(key)
            .copied()
            .unwrap_or(cfg.default_rating_curve)
    };

    // Observed stations outside the network are silently excluded from this
    // branch; unobserved network nodes still route with zero initial flow.
    let mut simulated: Vec<usize> = Vec::new();
    let mut discharge = vec![0.0_f64; net.node_count()];
    for node in 0..net.node_count() {
        let key = net.node_code(node).to_string();
        if let Some(obs) = now_by_code.get(&key) {
            discharge[node] = stage_to_discharge(obs.stage_cm(), Some(&curve_for(&key)));
            simulated.push(node);
        }
    }

    // lateral inflow from the current snapshot only, constant across steps
    let mut lateral = vec![0.0_f64; net.node_count()];
    for &node in &simulated {
        let key = net.node_code(node);
        let (precip, basin_params) = match stations_by_code.get(key) {
            Some(station) => {
                let precip = resolve_precipitation(station, inputs.stations, now_by_code);
                let params = basins_by_name
                    .get(&join_key(&station.basin))
                    .copied()
                    .unwrap_or(cfg.default_basin);
                (precip, params)
            }
            None => {
                // no metadata row: only the station's own reading can apply
                let precip = now_by_code
                    .get(key)
                    .and_then(|o| o.precipitation_mm)
                    .unwrap_or(0.0);
                (precip, cfg.default_basin)
            }
        };
        lateral[node] = lateral_inflow(precip, &basin_params);
    }

    let mut edge_states: Vec<EdgeState> = net
        .edges()
        .iter()
        .map(|e| EdgeState::steady(discharge[e.from]))
        .collect();

    let mut hourly: Vec<ForecastRow> = Vec::new();
    let mut series: BTreeMap<String, StationSeries> = BTreeMap::new();
    let mut daily_slots: HashMap<usize, [Option<f64>; 3]> = HashMap::new();

    // t=0 chart point carries the observed stage directly, not a value
    // re-derived from discharge
    for &node in &simulated {
        let key = net.node_code(node).to_string();
        let info = station_info(&key, stations_by_code);
        let observed = now_by_code.get(&key).map(|o| o.stage_cm()).unwrap_or(0.0);
        series.insert(
            key.clone(),
            StationSeries {
                station_code: info.code,
                station_name: info.name,
                river: info.river,
                points: vec![SeriesPoint {
                    timestamp: run_start,
                    hour_label: hour_label(run_start, offset),
                    stage_cm: round_stage(observed),
                }],
            },
        );
        daily_slots.insert(node, [None; 3]);
    }

    for t in 1..=cfg.horizon_hours {
        let ts = run_start + Duration::hours(t as i64);
        let local = ts.with_timezone(&offset);

        // route every edge using the previous step's node discharges, then
        // update all nodes at once
        let previous = discharge.clone();
        let mut routed = vec![0.0_f64; net.node_count()];
        for &edge_idx in net.traversal_order() {
            let edge = &net.edges()[edge_idx];
            let q_out = route_step(
                previous[edge.from],
                &mut edge_states[edge_idx],
                &params[edge_idx],
                cfg.step_seconds,
            );
            routed[edge.to] += q_out;
        }
        for node in 0..net.node_count() {
            discharge[node] = update_node_discharge(
                previous[node],
                routed[node],
                lateral[node],
                cfg.self_carry,
            );
        }

        for &node in &simulated {
            let key = net.node_code(node).to_string();
            let info = station_info(&key, stations_by_code);
            let stage = discharge_to_stage(discharge[node], Some(&curve_for(&key)));
            let rounded = round_stage(stage);

            hourly.push(ForecastRow {
                date: local.date_naive(),
                timestamp: ts,
                station_code: info.code,
                station_name: info.name,
                river: info.river,
                stage_cm: rounded,
            });
            if let Some(s) = series.get_mut(&key) {
                s.points.push(SeriesPoint {
                    timestamp: ts,
                    hour_label: hour_label(ts, offset),
                    stage_cm: rounded,
                });
            }

            if local.hour() == 23 {
                let day_index = (local.date_naive() - start_date).num_days();
                if (0..3).contains(&day_index) {
                    if let Some(slots) = daily_slots.get_mut(&node) {
                        slots[day_index as usize] = Some(stage);
                    }
                }
            }
        }
    }

    let daily = simulated
        .iter()
        .map(|&node| {
            let key = net.node_code(node).to_string();
            let info = station_info(&key, stations_by_code);
            let slots = daily_slots.get(&node).copied().unwrap_or([None; 3]);
            DailyRow {
                river: info.river,
                station_name: info.name,
                station_code: info.code,
                date: start_date,
                stage_day1_cm: round_stage(slots[0].unwrap_or(0.0)),
                stage_day2_cm: round_stage(slots[1].unwrap_or(0.0)),
                stage_day3_cm: round_stage(slots[2].unwrap_or(0.0)),
            }
        })
        .collect();

    ForecastOutput { hourly, daily, series }
}

// ---------------------------------------------------------------------------
// Branch B — regression fallback
// ---------------------------------------------------------------------------

/// Applies the datum offset and clamps into the station's valid range.
/// Offset application happens exactly once per day value, inside this call.
fn clamp_stage(raw: f64, datum_offset: f64, min_level: f64, max_level: f64) -> f64 {
    (raw + datum_offset).max(min_level).min(max_level)
}

fn fallback_branch(
    model: &RegressionModel,
    now_by_code: &HashMap<String, ObservationRecord>,
    stations_by_code: &HashMap<String, &Station>,
    run_start: DateTime<Utc>,
    cfg: &EngineConfig,
) -> ForecastOutput {
    let offset = local_offset(cfg);
    let start_date = local_date(run_start, offset);

    let mut hourly: Vec<ForecastRow> = Vec::new();
    let mut daily: Vec<DailyRow> = Vec::new();
    let mut series: BTreeMap<String, StationSeries> = BTreeMap::new();

    // BTreeMap view for deterministic station order
    let ordered: BTreeMap<&String, &ObservationRecord> = now_by_code.iter().collect();

    for (key, obs) in ordered {
        let info = station_info(key, stations_by_code);
        let (datum, min_level, max_level, roughness) = match info.station {
            Some(s) => (s.datum_offset_cm, s.min_level_cm, s.max_level_cm, s.roughness),
            None => (0.0, 0.0, 10_000.0, 0.0),
        };
        let clamped = |raw: f64| clamp_stage(raw, datum, min_level, max_level);

        let air_temp = obs.air_temp_c.unwrap_or(0.0);
        let days = match model.coefficients(key) {
            Some(coef) => {
                let features = feature_vector(
                    obs.water_level_cm,
                    obs.precipitation_mm,
                    obs.air_temp_c,
                    obs.wind_speed_ms,
                    obs.wind_dir_deg,
                    obs.humidity_pct,
                    roughness,
                );
                let day1 = clamped(coef.iter().zip(features.iter()).map(|(c, f)| c * f).sum());
                let day2 = clamped(cfg.day_decay * day1 + cfg.temp_nudge * air_temp);
                let day3 = clamped(cfg.day_decay * day2);
                [day1, day2, day3]
            }
            None => {
                // untrained station: today's stage held flat for all three days
                let flat = clamped(obs.stage_cm());
                [flat, flat, flat]
            }
        };

        let mut points = Vec::with_capacity(cfg.horizon_hours as usize);
        for t in 1..=cfg.horizon_hours {
            let ts = run_start + Duration::hours(t as i64);
            let day_value = days[(((t - 1) / 24) as usize).min(2)];
            let rounded = round_stage(day_value);
            hourly.push(ForecastRow {
                date: local_date(ts, offset),
                timestamp: ts,
                station_code: info.code.clone(),
                station_name: info.name.clone(),
                river: info.river.clone(),
                stage_cm: rounded,
            });
            points.push(SeriesPoint {
                timestamp: ts,
                hour_label: hour_label(ts, offset),
                stage_cm: rounded,
            });
        }

        daily.push(DailyRow {
            river: info.river.clone(),
            station_name: info.name.clone(),
            station_code: info.code.clone(),
            date: start_date,
            stage_day1_cm: round_stage(days[0]),
            stage_day2_cm: round_stage(days[1]),
            stage_day3_cm: round_stage(days[2]),
        });
        series.insert(
            key.clone(),
            StationSeries {
                station_code: info.code,
                station_name: info.name,
                river: info.river,
                points,
            },
        );
    }

    ForecastOutput { hourly, daily, series }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
