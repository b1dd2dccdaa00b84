/// Lateral inflow — the flow entering a station's reach from its basin,
/// outside the routed network flow.
///
/// Precipitation source priority, per station:
///   1. the station's own current reading;
///   2. the maximum precipitation among all stations tagged with the same
///      basin in the current snapshot;
///   3. zero.
///
/// The basin-maximum aggregation is a deliberate simplification standing in
/// for unknown catchment delineation: without delineated sub-catchments, the
/// wettest gauge in the basin is taken as representative.

use crate::model::{join_key, BasinParams, ObservationRecord, Station};
use std::collections::HashMap;

/// Resolves the precipitation (mm) to use for `station` from the current
/// snapshot, applying the source priority above.
pub fn resolve_precipitation(
    station: &Station,
    stations: &[Station],
    now_by_code: &HashMap<String, ObservationRecord>,
) -> f64 {
    // 1. direct station-level reading
    if let Some(obs) = now_by_code.get(&join_key(&station.code)) {
        if let Some(p) = obs.precipitation_mm {
            return p;
        }
    }

    // 2. basin-aggregated maximum
    let basin = join_key(&station.basin);
    if !basin.is_empty() {
        let basin_max = stations
            .iter()
            .filter(|s| join_key(&s.basin) == basin)
            .filter_map(|s| now_by_code.get(&join_key(&s.code)))
            .filter_map(|obs| obs.precipitation_mm)
            .fold(None::<f64>, |acc, p| Some(acc.map_or(p, |m| m.max(p))));
        if let Some(p) = basin_max {
            return p;
        }
    }

    // 3. nothing observed anywhere in the basin
    0.0
}

/// Lateral inflow (m³/s) for one station:
/// `baseflow + max(precip, 0) · runoff_coeff`.
pub fn lateral_inflow(precipitation_mm: f64, basin: &BasinParams) -> f64 {
    basin.baseflow + precipitation_mm.max(0.0) * basin.runoff_coeff
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn station(code: &str, basin: &str) -> Station {
        Station {
            code: code.to_string(),
            name: code.to_string(),
            river: String::new(),
            basin: basin.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            datum_offset_cm: 0.0,
            min_level_cm: 0.0,
            max_level_cm: 10000.0,
            roughness: 0.0,
        }
    }

    fn obs(code: &str, precip: Option<f64>) -> ObservationRecord {
        ObservationRecord {
            station_code: code.to_string(),
            timestamp: Utc::now(),
            water_level_cm: Some(100.0),
            precipitation_mm: precip,
            air_temp_c: None,
            wind_speed_ms: None,
            wind_dir_deg: None,
            humidity_pct: None,
        }
    }

    fn snapshot(entries: Vec<ObservationRecord>) -> HashMap<String, ObservationRecord> {
        entries
            .into_iter()
            .map(|o| (join_key(&o.station_code), o))
            .collect()
    }

    #[test]
    fn test_direct_reading_takes_priority_over_basin_max() {
        let stations = vec![station("A", "RED"), station("B", "RED")];
        let now = snapshot(vec![obs("A", Some(2.0)), obs("B", Some(9.0))]);
        assert_eq!(resolve_precipitation(&stations[0], &stations, &now), 2.0);
    }

    #[test]
    fn test_basin_maximum_used_when_station_reading_missing() {
        let stations = vec![station("A", "RED"), station("B", "RED"), station("C", "RED")];
        let now = snapshot(vec![obs("A", None), obs("B", Some(4.5)), obs("C", Some(7.0))]);
        assert_eq!(resolve_precipitation(&stations[0], &stations, &now), 7.0);
    }

    #[test]
    fn test_basin_join_is_case_and_whitespace_insensitive() {
        let stations = vec![station("A", " red "), station("B", "Red")];
        let now = snapshot(vec![obs("A", None), obs("B", Some(3.0))]);
        assert_eq!(resolve_precipitation(&stations[0], &stations, &now), 3.0);
    }

    #[test]
    fn test_no_reading_anywhere_defaults_to_zero() {
        let stations = vec![station("A", "RED"), station("B", "BLUE")];
        let now = snapshot(vec![obs("A", None)]);
        assert_eq!(resolve_precipitation(&stations[0], &stations, &now), 0.0);
    }

    #[test]
    fn test_untagged_station_skips_basin_aggregation() {
        // empty basin tag must not sweep up every other untagged station
        let stations = vec![station("A", ""), station("B", "")];
        let now = snapshot(vec![obs("A", None), obs("B", Some(5.0))]);
        assert_eq!(resolve_precipitation(&stations[0], &stations, &now), 0.0);
    }

    #[test]
    fn test_lateral_inflow_combines_baseflow_and_runoff() {
        let basin = BasinParams { runoff_coeff: 0.2, baseflow: 1.5 };
        assert_eq!(lateral_inflow(5.0, &basin), 1.5 + 5.0 * 0.2);
    }

    #[test]
    fn test_negative_precipitation_clamped() {
        let basin = BasinParams { runoff_coeff: 0.2, baseflow: 0.8 };
        assert_eq!(lateral_inflow(-3.0, &basin), 0.8);
    }
}
