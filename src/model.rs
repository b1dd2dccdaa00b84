/// Shared data types for the forecasting engine.
///
/// Every input collection (§ ingest) is converted into one of these typed
/// records exactly once, with all trimming and default substitution done at
/// conversion time. The simulation and training code never sees raw JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Join keys
// ---------------------------------------------------------------------------

/// Normalizes a station code or basin name for joining across collections.
///
/// The source spreadsheets are hand-maintained, so codes arrive with stray
/// whitespace and inconsistent casing. All cross-collection lookups go
/// through this function.
pub fn join_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// Metadata for a single monitoring station, loaded once per run and
/// immutable thereafter.
#[derive(Debug, Clone)]
pub struct Station {
    /// Station code, unique within a run (joins use `join_key`).
    pub code: String,
    /// Display name; falls back to the code when the source omits it.
    pub name: String,
    /// River the station sits on.
    pub river: String,
    /// Basin tag used for lateral-inflow parameter lookup.
    pub basin: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Offset added to predicted stages before clamping, in centimeters.
    pub datum_offset_cm: f64,
    /// Lower bound of the station's valid stage range, in centimeters.
    pub min_level_cm: f64,
    /// Upper bound of the station's valid stage range, in centimeters.
    pub max_level_cm: f64,
    /// Channel roughness coefficient; also the last regression feature.
    pub roughness: f64,
}

// ---------------------------------------------------------------------------
// Hydrologic auxiliaries
// ---------------------------------------------------------------------------

/// A directed river reach between two stations. Numeric fields are optional;
/// routing-parameter computation substitutes channel defaults.
///
/// Endpoints referencing unknown station codes are tolerated — the reach
/// still routes, it just feeds (or drains) a node nobody observes.
#[derive(Debug, Clone)]
pub struct Reach {
    pub from_code: String,
    pub to_code: String,
    pub length_m: Option<f64>,
    pub slope: Option<f64>,
    pub manning_n: Option<f64>,
    pub width_m: Option<f64>,
    pub depth_m: Option<f64>,
}

/// Power-law rating curve: discharge = a · max(stage − h0, 0)^b.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RatingCurve {
    pub h0: f64,
    pub a: f64,
    pub b: f64,
}

/// Lateral-inflow parameters for one basin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BasinParams {
    pub runoff_coeff: f64,
    pub baseflow: f64,
}

/// Rating curve keyed to a station, as loaded from the curve list.
#[derive(Debug, Clone)]
pub struct RatingCurveRecord {
    pub station_code: String,
    pub curve: RatingCurve,
}

/// Basin parameters keyed to a basin name, as loaded from the basin list.
#[derive(Debug, Clone)]
pub struct BasinRecord {
    pub basin: String,
    pub params: BasinParams,
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// One "now" snapshot per station, used to seed a forecast run.
///
/// Missing fields stay `None` after ingest; consumers default them to zero
/// at the point of use so a partly-filled record never aborts a run.
#[derive(Debug, Clone)]
pub struct ObservationRecord {
    pub station_code: String,
    pub timestamp: DateTime<Utc>,
    pub water_level_cm: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub air_temp_c: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_dir_deg: Option<f64>,
    pub humidity_pct: Option<f64>,
}

impl ObservationRecord {
    /// Observed stage with the missing-field default applied.
    pub fn stage_cm(&self) -> f64 {
        self.water_level_cm.unwrap_or(0.0)
    }
}

/// One historical hourly record, consumed only during training and
/// discarded afterwards.
#[derive(Debug, Clone)]
pub struct HistoricalRecord {
    pub station_code: String,
    pub timestamp: DateTime<Utc>,
    pub water_level_cm: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub air_temp_c: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_dir_deg: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub discharge_m3s: Option<f64>,
}

// ---------------------------------------------------------------------------
// Forecast outputs
// ---------------------------------------------------------------------------

/// One hourly forecast row. `date` is the local calendar date of the
/// timestamp; `timestamp` itself is UTC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub station_code: String,
    pub station_name: String,
    pub river: String,
    /// Forecast stage, centimeters, rounded to 0.1.
    pub stage_cm: f64,
}

/// Daily snapshot row: the stage at local hour 23 of days +1/+2/+3.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRow {
    pub river: String,
    pub station_name: String,
    pub station_code: String,
    pub date: NaiveDate,
    pub stage_day1_cm: f64,
    pub stage_day2_cm: f64,
    pub stage_day3_cm: f64,
}

/// One point of a station's chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    /// Local-clock hour label, e.g. "14:00".
    pub hour_label: String,
    pub stage_cm: f64,
}

/// Chart series for one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSeries {
    pub station_code: String,
    pub station_name: String,
    pub river: String,
    pub points: Vec<SeriesPoint>,
}

/// Rounds a stage to one decimal place for emission.
pub fn round_stage(stage_cm: f64) -> f64 {
    (stage_cm * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Engine error type.
///
/// `MissingInput` is the recoverable user-error case: the run aborts before
/// any simulation starts and no partial output is produced. Everything else
/// propagates to the caller as-is.
#[derive(Debug)]
pub enum EngineError {
    /// A required input collection was empty or absent.
    MissingInput(String),
    /// The persisted regression model failed to parse or validate.
    CorruptModel(String),
    /// Configuration file could not be read or parsed.
    InvalidConfig(String),
    /// An input collection file failed to parse at the container level.
    /// (Field-level problems never raise this — they degrade per record.)
    MalformedInput(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MissingInput(msg) => write!(f, "Missing input: {}", msg),
            EngineError::CorruptModel(msg) => write!(f, "Corrupt model: {}", msg),
            EngineError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            EngineError::MalformedInput(msg) => write!(f, "Malformed input: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_key_trims_and_uppercases() {
        assert_eq!(join_key("  st01 "), "ST01");
        assert_eq!(join_key("St01"), "ST01");
        assert_eq!(join_key("ST01"), join_key(" st01\t"));
    }

    #[test]
    fn test_round_stage_to_one_decimal() {
        assert_eq!(round_stage(123.4567), 123.5);
        assert_eq!(round_stage(0.04), 0.0);
        assert_eq!(round_stage(-1.26), -1.3);
    }

    #[test]
    fn test_stage_accessor_defaults_missing_level_to_zero() {
        let obs = ObservationRecord {
            station_code: "ST01".to_string(),
            timestamp: Utc::now(),
            water_level_cm: None,
            precipitation_mm: None,
            air_temp_c: None,
            wind_speed_ms: None,
            wind_dir_deg: None,
            humidity_pct: None,
        };
        assert_eq!(obs.stage_cm(), 0.0);
    }

    #[test]
    fn test_error_display_is_descriptive() {
        let err = EngineError::MissingInput("no current observations".to_string());
        assert!(err.to_string().contains("no current observations"));
    }
}
