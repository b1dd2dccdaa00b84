/// Stage ↔ discharge conversion through per-station power-law rating curves.
///
/// Both conversions are pure and total over finite inputs: a missing curve
/// yields zero, and a non-invertible curve (a ≤ 0 or b ≤ 0) degenerates to
/// returning the curve's zero-flow stage `h0` instead of raising.

use crate::model::RatingCurve;

/// Converts a stage (cm) to discharge (m³/s): `a · max(stage − h0, 0)^b`.
///
/// Returns 0 when no curve is known for the station; the caller decides
/// whether to substitute the configured default curve first.
pub fn stage_to_discharge(stage_cm: f64, curve: Option<&RatingCurve>) -> f64 {
    match curve {
        Some(c) => c.a * (stage_cm - c.h0).max(0.0).powf(c.b),
        None => 0.0,
    }
}

/// Converts a discharge (m³/s) back to a stage (cm).
///
/// Degenerate cases: no curve → 0; a ≤ 0 or b ≤ 0 → `h0` (inverting the
/// power law would divide by zero or take a negative power).
pub fn discharge_to_stage(discharge_m3s: f64, curve: Option<&RatingCurve>) -> f64 {
    let Some(c) = curve else {
        return 0.0;
    };
    if c.a <= 0.0 || c.b <= 0.0 {
        return c.h0;
    }
    c.h0 + (discharge_m3s.max(0.0) / c.a).powf(1.0 / c.b)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn default_curve() -> RatingCurve {
        RatingCurve { h0: 0.0, a: 0.03, b: 1.6 }
    }

    #[test]
    fn test_round_trip_recovers_stage_above_h0() {
        let curve = RatingCurve { h0: 12.0, a: 0.05, b: 1.4 };
        for stage in [12.0, 13.7, 50.0, 480.25, 1200.0] {
            let q = stage_to_discharge(stage, Some(&curve));
            let back = discharge_to_stage(q, Some(&curve));
            assert!(
                (back - stage).abs() < 1e-6,
                "round trip of stage {} drifted to {}",
                stage,
                back
            );
        }
    }

    #[test]
    fn test_stage_below_h0_produces_zero_discharge() {
        let curve = RatingCurve { h0: 20.0, a: 0.03, b: 1.6 };
        assert_eq!(stage_to_discharge(15.0, Some(&curve)), 0.0);
        // and the inverse of zero discharge lands back at h0
        assert_eq!(discharge_to_stage(0.0, Some(&curve)), 20.0);
    }

    #[test]
    fn test_missing_curve_yields_zero_both_ways() {
        assert_eq!(stage_to_discharge(100.0, None), 0.0);
        assert_eq!(discharge_to_stage(42.0, None), 0.0);
    }

    #[test]
    fn test_degenerate_curve_returns_h0_regardless_of_discharge() {
        let zero_a = RatingCurve { h0: 7.5, a: 0.0, b: 1.6 };
        let zero_b = RatingCurve { h0: 7.5, a: 0.03, b: 0.0 };
        for q in [0.0, 1.0, 1e6] {
            assert_eq!(discharge_to_stage(q, Some(&zero_a)), 7.5);
            assert_eq!(discharge_to_stage(q, Some(&zero_b)), 7.5);
        }
    }

    #[test]
    fn test_negative_discharge_clamped_before_inversion() {
        let curve = default_curve();
        assert_eq!(discharge_to_stage(-5.0, Some(&curve)), curve.h0);
    }

    #[test]
    fn test_discharge_monotonic_in_stage() {
        let curve = default_curve();
        let mut prev = stage_to_discharge(0.0, Some(&curve));
        for stage in 1..200 {
            let q = stage_to_discharge(stage as f64, Some(&curve));
            assert!(q >= prev, "discharge should not decrease with stage");
            prev = q;
        }
    }
}
