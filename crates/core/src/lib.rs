//! Validation engine for the fleetdesk logistics back office.
//!
//! - [`validation::engine`] runs any [`RuleProvider`] and derives a
//!   [`ValidationSummary`] with the `can_save` / `can_submit` gates.
//! - [`validation::trip`] and [`validation::vehicle`] validate single
//!   entities.
//! - [`validation::business`] and [`validation::cross_entity`] validate
//!   whole [`Dataset`]s.
//! - [`validation::session`] re-runs validation when the input changes.

pub mod config;
pub mod error;
pub mod types;
pub mod validation;

pub use config::EngineConfig;
pub use error::CoreError;
pub use validation::dataset::Dataset;
pub use validation::engine::{run_validation, validate, validate_with, RuleProvider, ValidationReport};
pub use validation::rules::{Severity, ValidationResult, ValidationRule};
pub use validation::summary::ValidationSummary;
