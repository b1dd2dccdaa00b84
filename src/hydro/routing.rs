/// Muskingum linear storage routing, one reach and one timestep at a time.
///
/// Classic coefficient form with travel time K and weighting factor X:
///
/// ```text
/// denom = K − K·X + 0.5·dt
/// C0 = (−K·X + 0.5·dt) / denom
/// C1 = ( K·X + 0.5·dt) / denom
/// C2 = ( K − K·X − 0.5·dt) / denom
/// Qout = max(C0·Qin + C1·prev.in + C2·prev.out, 0)
/// ```
///
/// C0 + C1 + C2 = 1, so steady inflow passes through unchanged. Per-edge
/// state persists across the whole 72-step loop.

use crate::hydro::network::ReachParams;

/// Previous-step flow state for one edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeState {
    pub inflow: f64,
    pub outflow: f64,
}

impl EdgeState {
    /// Steady-state seed: inflow and outflow both equal the upstream
    /// station's initial discharge.
    pub fn steady(discharge_m3s: f64) -> Self {
        Self { inflow: discharge_m3s, outflow: discharge_m3s }
    }
}

/// Routes one step through one reach, returning the new outflow and
/// advancing the edge state.
pub fn route_step(q_in: f64, state: &mut EdgeState, params: &ReachParams, dt_s: f64) -> f64 {
    let k = params.travel_time_s;
    let x = params.weighting_x;
    let denom = k - k * x + 0.5 * dt_s;
    let c0 = (-k * x + 0.5 * dt_s) / denom;
    let c1 = (k * x + 0.5 * dt_s) / denom;
    let c2 = (k - k * x - 0.5 * dt_s) / denom;

    let q_out = (c0 * q_in + c1 * state.inflow + c2 * state.outflow).max(0.0);
    state.inflow = q_in;
    state.outflow = q_out;
    q_out
}

/// Node discharge update after all edges routed for a step:
/// `max(0, self_carry·Qprev + routed + lateral)`.
///
/// The self-carry term is an intentional simplified memory term carried
/// over from the source calibration, not a continuity equation.
pub fn update_node_discharge(
    q_prev: f64,
    routed_inflow: f64,
    lateral_inflow: f64,
    self_carry: f64,
) -> f64 {
    (self_carry * q_prev + routed_inflow + lateral_inflow).max(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
