//! Hydrologic building blocks for the routing branch of the forecast:
//! rating curves, basin lateral inflow, the reach network, and the
//! Muskingum router. All pure computation over the typed records in
//! `crate::model`; the orchestrator in `crate::forecast` wires them
//! together.
pub mod basin;
pub mod network;
pub mod rating;
pub mod routing;
