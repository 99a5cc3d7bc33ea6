//! Command-line front end
//!
//! Runs the pipeline locally against a directory standing in for the object
//! store, and exposes the individual inference steps for inspection.

pub mod commands;
