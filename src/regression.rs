/// Per-station ridge regression: the persisted model value and the trainer
/// that refits it from historical hourly records.
///
/// The model is an explicit value owned by the caller — the engine holds no
/// global state. A training run mutates the value additively: stations with
/// enough history get their coefficient vector overwritten, everything else
/// is left untouched, and the map never shrinks. Load-mutate-save is the
/// caller's contract; concurrent trainers are last-writer-wins unless
/// synchronized externally.

use crate::config::EngineConfig;
use crate::model::{join_key, EngineError, HistoricalRecord, Station};
use chrono::{DateTime, Utc};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Length of every coefficient / feature vector:
/// [intercept, water_level, precip, air_temp, wind_speed, wind_dir,
///  humidity, roughness].
pub const FEATURE_DIM: usize = 8;

// ---------------------------------------------------------------------------
// Persisted model
// ---------------------------------------------------------------------------

/// Coefficients for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationCoefficients {
    pub coef: Vec<f64>,
}

/// The persisted regression model:
/// `{ "trainedAt": ISO-8601 | null, "stations": { <code>: { "coef": [..] } } }`.
///
/// A `BTreeMap` keeps serialization and iteration order deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    #[serde(rename = "trainedAt")]
    pub trained_at: Option<String>,
    #[serde(default)]
    pub stations: BTreeMap<String, StationCoefficients>,
}

impl RegressionModel {
    /// Parses a persisted model, validating that every coefficient vector
    /// has exactly `FEATURE_DIM` entries. Station keys are normalized
    /// through `join_key` so hand-edited files with lower-case or padded
    /// codes still match lookups.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let parsed: RegressionModel = serde_json::from_str(json)
            .map_err(|e| EngineError::CorruptModel(format!("model JSON failed to parse: {}", e)))?;
        let mut stations = BTreeMap::new();
        for (code, entry) in parsed.stations {
            if entry.coef.len() != FEATURE_DIM {
                return Err(EngineError::CorruptModel(format!(
                    "station {} has {} coefficients, expected {}",
                    code,
                    entry.coef.len(),
                    FEATURE_DIM
                )));
            }
            stations.insert(join_key(&code), entry);
        }
        Ok(RegressionModel { trained_at: parsed.trained_at, stations })
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::CorruptModel(format!("model serialization failed: {}", e)))
    }

    /// Coefficients for a station, looked up by join key.
    pub fn coefficients(&self, station_code: &str) -> Option<&[f64]> {
        self.stations.get(&join_key(station_code)).map(|s| s.coef.as_slice())
    }
}

// ---------------------------------------------------------------------------
// Feature vectors
// ---------------------------------------------------------------------------

/// Builds one design vector. Missing observation fields become 0; the
/// roughness slot comes from station metadata, not the record.
pub fn feature_vector(
    water_level_cm: Option<f64>,
    precipitation_mm: Option<f64>,
    air_temp_c: Option<f64>,
    wind_speed_ms: Option<f64>,
    wind_dir_deg: Option<f64>,
    humidity_pct: Option<f64>,
    roughness: f64,
) -> [f64; FEATURE_DIM] {
    [
        1.0,
        water_level_cm.unwrap_or(0.0),
        precipitation_mm.unwrap_or(0.0),
        air_temp_c.unwrap_or(0.0),
        wind_speed_ms.unwrap_or(0.0),
        wind_dir_deg.unwrap_or(0.0),
        humidity_pct.unwrap_or(0.0),
        roughness,
    ]
}

fn features_from_history(rec: &HistoricalRecord, roughness: f64) -> [f64; FEATURE_DIM] {
    feature_vector(
        rec.water_level_cm,
        rec.precipitation_mm,
        rec.air_temp_c,
        rec.wind_speed_ms,
        rec.wind_dir_deg,
        rec.humidity_pct,
        roughness,
    )
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

/// Outcome summary of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Stations whose coefficients were refit this run.
    pub stations_fitted: usize,
    /// Stations seen in the history but left untouched (too few pairs or a
    /// persistently singular fit).
    pub stations_skipped: usize,
}

/// Refits the model from historical records.
///
/// Per station (join-keyed, stable timestamp sort with input order breaking
/// ties): each consecutive (today, tomorrow) record pair yields a design
/// vector from today and tomorrow's water level as target; pairs without a
/// target are dropped. Stations with fewer than `min_training_pairs` valid
/// pairs keep their prior coefficients. The model's `trained_at` stamp is
/// updated unconditionally at the end — that is part of the persisted-model
/// contract, even when no station qualified.
pub fn train(
    model: &mut RegressionModel,
    history: &[HistoricalRecord],
    stations: &[Station],
    trained_at: DateTime<Utc>,
    cfg: &EngineConfig,
) -> Result<TrainingReport, EngineError> {
    if history.is_empty() {
        return Err(EngineError::MissingInput(
            "no historical records available for training".to_string(),
        ));
    }

    let roughness_by_code: HashMap<String, f64> = stations
        .iter()
        .map(|s| (join_key(&s.code), s.roughness))
        .collect();

    // group by station, preserving input order within each group
    let mut by_station: BTreeMap<String, Vec<&HistoricalRecord>> = BTreeMap::new();
    for rec in history {
        let key = join_key(&rec.station_code);
        if key.is_empty() {
            continue;
        }
        by_station.entry(key).or_default().push(rec);
    }

    let mut report = TrainingReport { stations_fitted: 0, stations_skipped: 0 };

    for (code, mut records) in by_station {
        // stable: ties keep original input order
        records.sort_by_key(|r| r.timestamp);

        let roughness = roughness_by_code.get(&code).copied().unwrap_or(0.0);
        let mut rows: Vec<f64> = Vec::new();
        let mut targets: Vec<f64> = Vec::new();
        for pair in records.windows(2) {
            let Some(target) = pair[1].water_level_cm else {
                continue;
            };
            rows.extend_from_slice(&features_from_history(pair[0], roughness));
            targets.push(target);
        }

        if targets.len() < cfg.min_training_pairs {
            report.stations_skipped += 1;
            continue;
        }

        let x = DMatrix::from_row_slice(targets.len(), FEATURE_DIM, &rows);
        let y = DVector::from_vec(targets);
        match ridge_fit(&x, &y, cfg.ridge_lambda, cfg.singular_jitter) {
            Some(beta) => {
                model
                    .stations
                    .insert(code, StationCoefficients { coef: beta.iter().copied().collect() });
                report.stations_fitted += 1;
            }
            None => {
                // singular even after the jitter retry: keep prior coefficients
                report.stations_skipped += 1;
            }
        }
    }

    model.trained_at = Some(trained_at.to_rfc3339());
    Ok(report)
}

/// Solves β = (XᵗX + λI)⁻¹ Xᵗy.
///
/// A singular normal matrix gets one retry with `jitter` added to the
/// diagonal; `None` means the fit failed both times.
fn ridge_fit(x: &DMatrix<f64>, y: &DVector<f64>, lambda: f64, jitter: f64) -> Option<DVector<f64>> {
    let dim = x.ncols();
    let xtx = x.transpose() * x;
    let xty = x.transpose() * y;
    let regularized = &xtx + DMatrix::identity(dim, dim) * lambda;

    if let Some(inv) = regularized.clone().try_inverse() {
        return Some(inv * &xty);
    }
    let jittered = regularized + DMatrix::identity(dim, dim) * jitter;
    jittered.try_inverse().map(|inv| inv * &xty)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
