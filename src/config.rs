/// Engine configuration — the calibration constants behind the simulation.
///
/// Several constants here (the 0.2 self-carry memory term, the 0.98 daily
/// decay, the 0.1 air-temperature nudge) are inherited calibration values
/// with no documented derivation. They stay configurable rather than
/// hardcoded so operators can tune them without recompiling, the same way
/// station metadata lives in a TOML file rather than in code.

use crate::model::{BasinParams, EngineError, RatingCurve};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// All tunable constants of the forecasting engine.
///
/// `Default` gives the operational values; `load_from_path` overlays a TOML
/// file where every field is optional.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Simulation length in hourly steps.
    pub horizon_hours: u32,
    /// Muskingum timestep, seconds.
    pub step_seconds: f64,
    /// Muskingum weighting factor X.
    pub muskingum_x: f64,
    /// Floor on reach travel time K, seconds. Enforces a minimum one-hour
    /// lag between adjacent stations.
    pub min_travel_time_s: f64,
    /// Floor on wave celerity, m/s.
    pub min_celerity_ms: f64,
    /// Floor on bed slope.
    pub min_slope: f64,

    // Channel-geometry fallbacks for reaches with missing fields.
    pub default_width_m: f64,
    pub default_depth_m: f64,
    pub default_manning_n: f64,
    pub default_slope: f64,

    /// Fraction of a station's previous discharge carried into the next
    /// step. A simplified memory term, not a mass balance.
    pub self_carry: f64,
    /// Fallback day+2/day+3 decay factor.
    pub day_decay: f64,
    /// Fallback day+2 air-temperature coefficient.
    pub temp_nudge: f64,

    /// Ridge regularization strength λ.
    pub ridge_lambda: f64,
    /// Diagonal jitter added when the normal matrix is singular.
    pub singular_jitter: f64,
    /// Minimum valid (today, tomorrow) pairs before a station is refit.
    pub min_training_pairs: usize,

    /// Fixed UTC offset of the local clock, hours. Drives the hour-23 daily
    /// snapshot rule and chart hour labels.
    pub local_utc_offset_hours: i32,

    /// Rating curve used for stations without one.
    pub default_rating_curve: RatingCurve,
    /// Basin parameters used for basins without an entry.
    pub default_basin: BasinParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon_hours: 72,
            step_seconds: 3600.0,
            muskingum_x: 0.2,
            min_travel_time_s: 3600.0,
            min_celerity_ms: 0.1,
            min_slope: 1e-6,
            default_width_m: 40.0,
            default_depth_m: 3.0,
            default_manning_n: 0.035,
            default_slope: 1e-4,
            self_carry: 0.2,
            day_decay: 0.98,
            temp_nudge: 0.1,
            ridge_lambda: 0.001,
            singular_jitter: 1e-6,
            min_training_pairs: 5,
            local_utc_offset_hours: 0,
            default_rating_curve: RatingCurve { h0: 0.0, a: 0.03, b: 1.6 },
            default_basin: BasinParams { runoff_coeff: 0.2, baseflow: 0.0 },
        }
    }
}

/// TOML shape of the config file: every field optional, so an override file
/// only needs to name the constants it changes.
#[derive(Debug, Deserialize)]
struct PartialConfig {
    horizon_hours: Option<u32>,
    step_seconds: Option<f64>,
    muskingum_x: Option<f64>,
    min_travel_time_s: Option<f64>,
    min_celerity_ms: Option<f64>,
    min_slope: Option<f64>,
    default_width_m: Option<f64>,
    default_depth_m: Option<f64>,
    default_manning_n: Option<f64>,
    default_slope: Option<f64>,
    self_carry: Option<f64>,
    day_decay: Option<f64>,
    temp_nudge: Option<f64>,
    ridge_lambda: Option<f64>,
    singular_jitter: Option<f64>,
    min_training_pairs: Option<usize>,
    local_utc_offset_hours: Option<i32>,
    default_rating_curve: Option<RatingCurve>,
    default_basin: Option<BasinParams>,
}

impl EngineConfig {
    /// Loads an override file on top of the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Applies a TOML override string on top of the defaults.
    pub fn from_toml(contents: &str) -> Result<Self, EngineError> {
        let partial: PartialConfig = toml::from_str(contents)
            .map_err(|e| EngineError::InvalidConfig(format!("failed to parse TOML: {}", e)))?;

        let mut cfg = Self::default();
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = partial.$field { cfg.$field = v; })*
            };
        }
        overlay!(
            horizon_hours,
            step_seconds,
            muskingum_x,
            min_travel_time_s,
            min_celerity_ms,
            min_slope,
            default_width_m,
            default_depth_m,
            default_manning_n,
            default_slope,
            self_carry,
            day_decay,
            temp_nudge,
            ridge_lambda,
            singular_jitter,
            min_training_pairs,
            local_utc_offset_hours,
            default_rating_curve,
            default_basin,
        );
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
