// ABOUTME: Validated domain newtypes shared across the orchestrator.
// ABOUTME: Exports UnitName and its validation error.

mod unit_name;

pub use unit_name::{UnitName, UnitNameError};
