// ABOUTME: Library root for convoy - exposes public modules for the binary and tests.
// ABOUTME: The CLI entry point is in main.rs.

pub mod assemble;
pub mod error;
pub mod graph;
pub mod history;
pub mod manifest;
pub mod output;
pub mod provision;
pub mod run;
pub mod runtime;
pub mod types;
