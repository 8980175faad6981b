//! Rule-based validation engine.
//!
//! Provides the rule model, the fault-isolated validator core and summary,
//! single-entity validators (trips, vehicles), dataset-level business and
//! cross-entity validators, and a session that keeps results current as the
//! input changes. Pure logic only: no I/O.

pub mod business;
pub mod business_catalogue;
pub mod cross_entity;
pub mod dataset;
pub mod engine;
pub mod predicates;
pub mod rules;
pub mod session;
pub mod summary;
pub mod trip;
pub mod vehicle;
