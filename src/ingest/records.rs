/// Raw-record deserialization and the single defaulting step per record
/// type.
///
/// The upstream exports are loosely typed: numeric fields show up as JSON
/// numbers or as strings ("123.4"), timestamps as RFC 3339 or plain
/// `YYYY-MM-DD HH:MM:SS`, and optional fields are simply absent. All of that
/// is absorbed here, once, so the engine only ever sees the typed records in
/// `crate::model`. Records without a usable station code are dropped;
/// everything else is kept with defaulted fields.

use crate::model::{
    BasinParams, BasinRecord, EngineError, HistoricalRecord, ObservationRecord, RatingCurve,
    RatingCurveRecord, Reach, Station,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Lenient scalar parsing
// ---------------------------------------------------------------------------

/// A numeric field that may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Num(f64),
    Text(String),
}

/// Collapses a lenient numeric field to `Option<f64>`; unparseable text
/// degrades to `None`.
fn to_f64(value: Option<Numeric>) -> Option<f64> {
    match value {
        Some(Numeric::Num(n)) if n.is_finite() => Some(n),
        Some(Numeric::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Parses a timestamp string; RFC 3339 first, then the two naive formats
/// the exports use (interpreted as UTC). Anything else degrades to the
/// Unix epoch so the record survives with a harmless ordering key.
fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = value else {
        return DateTime::<Utc>::UNIX_EPOCH;
    };
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return naive.and_utc();
        }
    }
    DateTime::<Utc>::UNIX_EPOCH
}

fn parse_array<T: for<'de> Deserialize<'de>>(json: &str, what: &str) -> Result<Vec<T>, EngineError> {
    serde_json::from_str(json)
        .map_err(|e| EngineError::MalformedInput(format!("{} collection failed to parse: {}", what, e)))
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawStation {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    river: Option<String>,
    #[serde(default)]
    basin: Option<String>,
    #[serde(default)]
    latitude: Option<Numeric>,
    #[serde(default)]
    longitude: Option<Numeric>,
    #[serde(default, alias = "datumOffset")]
    datum_offset: Option<Numeric>,
    #[serde(default, alias = "minLevel")]
    min_level: Option<Numeric>,
    #[serde(default, alias = "maxLevel")]
    max_level: Option<Numeric>,
    #[serde(default)]
    roughness: Option<Numeric>,
}

/// Parses the station metadata collection. Records without a code are
/// dropped; a missing name falls back to the code.
pub fn parse_stations(json: &str) -> Result<Vec<Station>, EngineError> {
    let raw: Vec<RawStation> = parse_array(json, "station")?;
    Ok(raw
        .into_iter()
        .filter_map(|r| {
            let code = r.code?.trim().to_string();
            if code.is_empty() {
                return None;
            }
            let name = r
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| code.clone());
            Some(Station {
                name,
                river: r.river.unwrap_or_default().trim().to_string(),
                basin: r.basin.unwrap_or_default().trim().to_string(),
                latitude: to_f64(r.latitude).unwrap_or(0.0),
                longitude: to_f64(r.longitude).unwrap_or(0.0),
                datum_offset_cm: to_f64(r.datum_offset).unwrap_or(0.0),
                min_level_cm: to_f64(r.min_level).unwrap_or(0.0),
                max_level_cm: to_f64(r.max_level).unwrap_or(10_000.0),
                roughness: to_f64(r.roughness).unwrap_or(0.0),
                code,
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Observations & history
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawReading {
    #[serde(default, alias = "stationCode", alias = "station")]
    station_code: Option<String>,
    #[serde(default, alias = "time")]
    timestamp: Option<String>,
    #[serde(default, alias = "waterLevel", alias = "level")]
    water_level: Option<Numeric>,
    #[serde(default, alias = "precip", alias = "rainfall")]
    precipitation: Option<Numeric>,
    #[serde(default, alias = "airTemp", alias = "temperature")]
    air_temp: Option<Numeric>,
    #[serde(default, alias = "windSpeed")]
    wind_speed: Option<Numeric>,
    #[serde(default, alias = "windDir")]
    wind_dir: Option<Numeric>,
    #[serde(default, alias = "rh")]
    humidity: Option<Numeric>,
    #[serde(default)]
    discharge: Option<Numeric>,
}

/// Parses the current-observation snapshot collection.
pub fn parse_observations(json: &str) -> Result<Vec<ObservationRecord>, EngineError> {
    let raw: Vec<RawReading> = parse_array(json, "observation")?;
    Ok(raw
        .into_iter()
        .filter_map(|r| {
            let code = r.station_code?.trim().to_string();
            if code.is_empty() {
                return None;
            }
            Some(ObservationRecord {
                station_code: code,
                timestamp: parse_timestamp(r.timestamp.as_deref()),
                water_level_cm: to_f64(r.water_level),
                precipitation_mm: to_f64(r.precipitation),
                air_temp_c: to_f64(r.air_temp),
                wind_speed_ms: to_f64(r.wind_speed),
                wind_dir_deg: to_f64(r.wind_dir),
                humidity_pct: to_f64(r.humidity),
            })
        })
        .collect())
}

/// Parses the historical training collection. Input order is preserved so
/// downstream stable sorts can break timestamp ties by original order.
pub fn parse_history(json: &str) -> Result<Vec<HistoricalRecord>, EngineError> {
    let raw: Vec<RawReading> = parse_array(json, "historical")?;
    Ok(raw
        .into_iter()
        .filter_map(|r| {
            let code = r.station_code?.trim().to_string();
            if code.is_empty() {
                return None;
            }
            Some(HistoricalRecord {
                station_code: code,
                timestamp: parse_timestamp(r.timestamp.as_deref()),
                water_level_cm: to_f64(r.water_level),
                precipitation_mm: to_f64(r.precipitation),
                air_temp_c: to_f64(r.air_temp),
                wind_speed_ms: to_f64(r.wind_speed),
                wind_dir_deg: to_f64(r.wind_dir),
                humidity_pct: to_f64(r.humidity),
                discharge_m3s: to_f64(r.discharge),
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Hydrologic auxiliaries
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawReach {
    #[serde(default, alias = "fromCode", alias = "upstream")]
    from: Option<String>,
    #[serde(default, alias = "toCode", alias = "downstream")]
    to: Option<String>,
    #[serde(default, alias = "lengthM")]
    length_m: Option<Numeric>,
    #[serde(default)]
    slope: Option<Numeric>,
    #[serde(default, alias = "manningN", alias = "n")]
    manning_n: Option<Numeric>,
    #[serde(default, alias = "widthM")]
    width_m: Option<Numeric>,
    #[serde(default, alias = "depthM")]
    depth_m: Option<Numeric>,
}

/// Parses the reach list. Endpoints are kept as-is (trimming and interning
/// happen in the network builder); reaches with both endpoints missing are
/// dropped here.
pub fn parse_reaches(json: &str) -> Result<Vec<Reach>, EngineError> {
    let raw: Vec<RawReach> = parse_array(json, "reach")?;
    Ok(raw
        .into_iter()
        .filter_map(|r| {
            let from_code = r.from.unwrap_or_default().trim().to_string();
            let to_code = r.to.unwrap_or_default().trim().to_string();
            if from_code.is_empty() && to_code.is_empty() {
                return None;
            }
            Some(Reach {
                from_code,
                to_code,
                length_m: to_f64(r.length_m),
                slope: to_f64(r.slope),
                manning_n: to_f64(r.manning_n),
                width_m: to_f64(r.width_m),
                depth_m: to_f64(r.depth_m),
            })
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct RawRatingCurve {
    #[serde(default, alias = "stationCode", alias = "station")]
    station_code: Option<String>,
    #[serde(default)]
    h0: Option<Numeric>,
    #[serde(default)]
    a: Option<Numeric>,
    #[serde(default)]
    b: Option<Numeric>,
}

/// Parses the rating-curve list. Missing parameters take the standard
/// defaults `{h0: 0, a: 0.03, b: 1.6}` so a half-filled row still converts.
pub fn parse_rating_curves(json: &str) -> Result<Vec<RatingCurveRecord>, EngineError> {
    let raw: Vec<RawRatingCurve> = parse_array(json, "rating curve")?;
    Ok(raw
        .into_iter()
        .filter_map(|r| {
            let code = r.station_code?.trim().to_string();
            if code.is_empty() {
                return None;
            }
            Some(RatingCurveRecord {
                station_code: code,
                curve: RatingCurve {
                    h0: to_f64(r.h0).unwrap_or(0.0),
                    a: to_f64(r.a).unwrap_or(0.03),
                    b: to_f64(r.b).unwrap_or(1.6),
                },
            })
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct RawBasin {
    #[serde(default, alias = "name")]
    basin: Option<String>,
    #[serde(default, alias = "runoffCoeff")]
    runoff_coeff: Option<Numeric>,
    #[serde(default)]
    baseflow: Option<Numeric>,
}

/// Parses the basin-parameter list with the standard `{0.2, 0}` defaults.
pub fn parse_basins(json: &str) -> Result<Vec<BasinRecord>, EngineError> {
    let raw: Vec<RawBasin> = parse_array(json, "basin")?;
    Ok(raw
        .into_iter()
        .filter_map(|r| {
            let basin = r.basin?.trim().to_string();
            if basin.is_empty() {
                return None;
            }
            Some(BasinRecord {
                basin,
                params: BasinParams {
                    runoff_coeff: to_f64(r.runoff_coeff).unwrap_or(0.2),
                    baseflow: to_f64(r.baseflow).unwrap_or(0.0),
                },
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_numbers_accepted_as_numbers_or_strings() {
        let json = r#"[
            {"station_code": "ST01", "water_level": 123.4},
            {"station_code": "ST02", "water_level": "567.8"}
        ]"#;
        let obs = parse_observations(json).expect("should parse");
        assert_eq!(obs[0].water_level_cm, Some(123.4));
        assert_eq!(obs[1].water_level_cm, Some(567.8));
    }

    #[test]
    fn test_unparseable_field_degrades_without_dropping_record() {
        let json = r#"[{"station_code": "ST01", "water_level": "n/a", "precipitation": 5}]"#;
        let obs = parse_observations(json).expect("should parse");
        assert_eq!(obs.len(), 1, "record with one bad field must survive");
        assert_eq!(obs[0].water_level_cm, None);
        assert_eq!(obs[0].precipitation_mm, Some(5.0));
    }

    #[test]
    fn test_record_without_station_code_is_dropped() {
        let json = r#"[{"water_level": 10}, {"station_code": "  ", "water_level": 11},
                       {"station_code": "ST01", "water_level": 12}]"#;
        let obs = parse_observations(json).expect("should parse");
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].station_code, "ST01");
    }

    #[test]
    fn test_timestamp_formats() {
        let json = r#"[
            {"station_code": "A", "timestamp": "2024-06-01T08:00:00+00:00"},
            {"station_code": "B", "timestamp": "2024-06-01 08:00:00"},
            {"station_code": "C", "timestamp": "not a date"}
        ]"#;
        let obs = parse_observations(json).expect("should parse");
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(obs[0].timestamp, expected);
        assert_eq!(obs[1].timestamp, expected);
        assert_eq!(obs[2].timestamp, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_station_defaults() {
        let json = r#"[{"code": " ST01 ", "max_level": "800"}]"#;
        let stations = parse_stations(json).expect("should parse");
        let s = &stations[0];
        assert_eq!(s.code, "ST01");
        assert_eq!(s.name, "ST01", "missing name falls back to code");
        assert_eq!(s.min_level_cm, 0.0);
        assert_eq!(s.max_level_cm, 800.0);
        assert_eq!(s.roughness, 0.0);
    }

    #[test]
    fn test_rating_curve_defaults_fill_missing_parameters() {
        let json = r#"[{"station_code": "ST01", "h0": 12}]"#;
        let curves = parse_rating_curves(json).expect("should parse");
        assert_eq!(curves[0].curve.h0, 12.0);
        assert_eq!(curves[0].curve.a, 0.03);
        assert_eq!(curves[0].curve.b, 1.6);
    }

    #[test]
    fn test_reach_aliases() {
        let json = r#"[{"upstream": "A", "downstream": "B", "lengthM": "10000", "manningN": 0.03}]"#;
        let reaches = parse_reaches(json).expect("should parse");
        assert_eq!(reaches[0].from_code, "A");
        assert_eq!(reaches[0].to_code, "B");
        assert_eq!(reaches[0].length_m, Some(10_000.0));
        assert_eq!(reaches[0].manning_n, Some(0.03));
    }

    #[test]
    fn test_basin_defaults() {
        let json = r#"[{"basin": "Red"}, {"name": "Blue", "runoff_coeff": 0.35, "baseflow": 2}]"#;
        let basins = parse_basins(json).expect("should parse");
        assert_eq!(basins[0].params.runoff_coeff, 0.2);
        assert_eq!(basins[0].params.baseflow, 0.0);
        assert_eq!(basins[1].basin, "Blue");
        assert_eq!(basins[1].params.runoff_coeff, 0.35);
    }

    #[test]
    fn test_container_level_garbage_is_an_error() {
        let err = parse_observations("{\"not\": \"an array\"}").unwrap_err();
        assert!(matches!(err, EngineError::MalformedInput(_)));
    }
}
