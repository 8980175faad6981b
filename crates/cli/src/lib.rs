//! Command-line driver for the fleetdesk validation engine.
//!
//! - [`check`] loads a dataset snapshot and runs every validator over it.
//! - [`report`] collects the per-validator reports and renders them.

pub mod check;
pub mod report;
