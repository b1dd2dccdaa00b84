//! hydrocast: 72-hour hydrologic water-level forecasting engine.
//!
//! # Module structure
//!
//! ```text
//! hydrocast
//! ├── model       — shared data types (Station, Reach, ObservationRecord, EngineError, …)
//! ├── config      — EngineConfig calibration constants (engine.toml overrides)
//! ├── ingest
//! │   └── records — lenient JSON record parsing + per-record defaulting
//! ├── hydro
//! │   ├── rating  — stage ↔ discharge power-law conversion
//! │   ├── basin   — lateral inflow (precipitation runoff + baseflow)
//! │   ├── network — reach graph, traversal order, per-reach routing parameters
//! │   └── routing — Muskingum per-reach, per-step flow routing
//! ├── regression  — persisted per-station ridge model + trainer
//! └── forecast    — orchestrator: branch choice, 72-step loop, output tables
//! ```
//!
//! The engine is a set of pure functions over pre-materialized input
//! collections plus an explicit `RegressionModel` value: no hidden global
//! state, no I/O. Everything around it (HTTP, storage, spreadsheets, UI)
//! lives outside this crate; `src/main.rs` is only a thin file-based runner.

pub mod config;
pub mod forecast;
pub mod hydro;
pub mod ingest;
pub mod model;
pub mod regression;
