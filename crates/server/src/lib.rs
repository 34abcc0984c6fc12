//! HTTP layer over the VM telemetry pipeline
//!
//! Each data route loads the configured raw telemetry file and runs the
//! pipeline on the blocking pool.

pub mod api;
pub mod config;
