//! Input-collection parsing.
//!
//! Each consumed collection arrives as a JSON array of flat records exported
//! upstream (spreadsheet imports, gauge telemetry dumps). Parsing is lenient
//! at the field level — numbers may arrive as strings, timestamps in a couple
//! of formats, and any unparseable field degrades to a missing value rather
//! than aborting the batch. Only a malformed container (not a JSON array of
//! objects at all) is an error.
pub mod records;
