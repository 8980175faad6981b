//! # Check command
//!
//! Loads a dataset snapshot and runs every validator of the engine over it:
//! business rules and cross-entity integrity over the whole dataset, then
//! the trip and vehicle validators over each record of those collections.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use serde_json::Value;

use fleetdesk_core::types::Record;
use fleetdesk_core::validation::business::{BusinessRuleValidator, RuleContext};
use fleetdesk_core::validation::business_catalogue::{
    default_business_rules, COLLECTION_ROUTES, COLLECTION_TRIPS, COLLECTION_VEHICLES,
};
use fleetdesk_core::validation::cross_entity::{default_cross_entity_rules, CrossEntityValidator};
use fleetdesk_core::validation::dataset::{id_key, record_id, record_label};
use fleetdesk_core::validation::trip::{RouteRef, Trip, TripValidator};
use fleetdesk_core::validation::vehicle::{Vehicle, VehicleValidator};
use fleetdesk_core::{validate_with, Dataset, EngineConfig};

use crate::report::{CheckReport, Section, Unreadable};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for a dataset check.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// JSON file with one array per collection (`clients`, `sites`, `routes`, ...).
    pub dataset: PathBuf,

    /// Disable a business rule (repeatable).
    #[arg(long = "disable", value_name = "RULE_ID")]
    pub disable: Vec<String>,

    /// Enable a business rule that is off by default (repeatable).
    #[arg(long = "enable", value_name = "RULE_ID")]
    pub enable: Vec<String>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Evaluate dates relative to this day instead of today.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub as_of: Option<NaiveDate>,
}

/// Read and parse a dataset file.
pub fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(Dataset::from_value(value)?)
}

/// Run every validator over `dataset`.
pub fn run_check(
    args: &CheckArgs,
    dataset: &Dataset,
    as_of: NaiveDate,
    config: &EngineConfig,
) -> anyhow::Result<CheckReport> {
    let business = business_validator(args, as_of, config)?;
    let integrity = CrossEntityValidator::new(default_cross_entity_rules())?;

    let mut report = CheckReport::new(as_of);
    report.push(Section::new(
        "business",
        validate_with(&business, dataset, config),
    ));
    report.push(Section::new(
        "integrity",
        validate_with(&integrity, dataset, config),
    ));

    let trips = TripValidator::with_config(as_of, config);
    let routes = index_by_id(dataset.records(COLLECTION_ROUTES));
    for (index, record) in dataset.records(COLLECTION_TRIPS).iter().enumerate() {
        let label = record_label(record, index);
        match trip_from_record(record, &routes) {
            Ok(trip) => report.push(Section::new(
                format!("trip {label}"),
                validate_with(&trips, &trip, config),
            )),
            Err(e) => report.unreadable(Unreadable::new(COLLECTION_TRIPS, label, e)),
        }
    }

    let vehicles = VehicleValidator::with_config(as_of, config);
    for (index, record) in dataset.records(COLLECTION_VEHICLES).iter().enumerate() {
        let label = record_label(record, index);
        match serde_json::from_value::<Vehicle>(Value::Object(record.clone())) {
            Ok(vehicle) => report.push(Section::new(
                format!("vehicle {label}"),
                validate_with(&vehicles, &vehicle, config),
            )),
            Err(e) => report.unreadable(Unreadable::new(COLLECTION_VEHICLES, label, e)),
        }
    }

    tracing::info!(
        sections = report.sections.len(),
        unreadable = report.unreadable.len(),
        can_save = report.can_save(),
        "Dataset check complete"
    );
    Ok(report)
}

/// Default catalogue with the `--enable` / `--disable` overrides applied.
fn business_validator(
    args: &CheckArgs,
    as_of: NaiveDate,
    config: &EngineConfig,
) -> anyhow::Result<BusinessRuleValidator> {
    let validator = BusinessRuleValidator::new(default_business_rules(), RuleContext::new(as_of))?
        .with_config(config);

    for id in &args.disable {
        if !validator.catalogue().iter().any(|r| r.id() == id) {
            tracing::warn!(rule_id = %id, "Ignoring --disable for unknown business rule");
        }
    }
    let enabled = validator
        .enabled_rules()
        .with_rules(args.enable.iter().cloned())
        .without_rules(&args.disable);
    Ok(validator.set_enabled_rules(enabled.iter()))
}

fn index_by_id(records: &[Record]) -> HashMap<String, &Record> {
    records
        .iter()
        .filter_map(|r| record_id(r).map(|id| (id, r)))
        .collect()
}

/// Decode a trip record, resolving a bare `route_id` against `routes`.
fn trip_from_record(
    record: &Record,
    routes: &HashMap<String, &Record>,
) -> Result<Trip, serde_json::Error> {
    let mut trip: Trip = serde_json::from_value(Value::Object(record.clone()))?;
    if trip.route.is_none() {
        let route = record
            .get("route_id")
            .and_then(id_key)
            .and_then(|id| routes.get(&id));
        if let Some(route) = route {
            trip.route = Some(serde_json::from_value::<RouteRef>(Value::Object((*route).clone()))?);
        }
    }
    Ok(trip)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    fn args(disable: &[&str], enable: &[&str]) -> CheckArgs {
        CheckArgs {
            dataset: PathBuf::from("dataset.json"),
            disable: disable.iter().map(|s| s.to_string()).collect(),
            enable: enable.iter().map(|s| s.to_string()).collect(),
            format: OutputFormat::Text,
            as_of: None,
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
    }

    fn dataset() -> Dataset {
        Dataset::from_value(json!({
            "clients": [{ "id": 1 }],
            "sites": [{ "id": 10, "client_id": 1 }, { "id": 11, "client_id": 1 }],
            "routes": [{ "id": 5, "client_id": 1, "origin_site_id": 10, "destination_site_id": 11, "distance_km": 300 }],
            "trips": [{ "id": 100, "client_id": 1, "route_id": 5, "vehicle_ids": [7], "driver_ids": [3], "status": "planned" }],
            "vehicles": [{ "id": 7, "plate": "AB-12-CD", "insurance_expiry": "2027-01-01" }]
        }))
        .unwrap()
    }

    #[test]
    fn loads_dataset_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "clients": [{{ "id": 1 }}] }}"#).unwrap();
        let dataset = load_dataset(file.path()).unwrap();
        assert_eq!(dataset.records("clients").len(), 1);
    }

    #[test]
    fn invalid_json_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load_dataset(file.path()).unwrap_err();
        assert!(err.to_string().contains("is not valid JSON"));
    }

    #[test]
    fn disable_and_enable_adjust_business_rules() {
        let validator =
            business_validator(&args(&["trip-status-known"], &["route-max-distance"]), as_of(), &EngineConfig::default())
                .unwrap();
        assert!(!validator.is_rule_enabled("trip-status-known"));
        assert!(validator.is_rule_enabled("route-max-distance"));
        assert!(validator.is_rule_enabled("trip-crew-assigned"));
    }

    #[test]
    fn runs_every_validator() {
        let report = run_check(&args(&[], &[]), &dataset(), as_of(), &EngineConfig::default()).unwrap();
        let names: Vec<&str> = report.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["business", "integrity", "trip id 100", "vehicle id 7"]);
        assert!(report.sections[1].report.summary.can_save);
    }

    #[test]
    fn trip_route_is_resolved_from_routes() {
        let data = dataset();
        let routes = index_by_id(data.records(COLLECTION_ROUTES));
        let trip = trip_from_record(&data.records(COLLECTION_TRIPS)[0], &routes).unwrap();
        let route = trip.route.unwrap();
        assert_eq!(route.id, 5);
        assert_eq!(route.client_id, Some(1));
    }

    #[test]
    fn undecodable_record_is_reported() {
        let data = Dataset::from_value(json!({ "vehicles": [{ "id": 7, "model_year": "new" }] })).unwrap();
        let report = run_check(&args(&[], &[]), &data, as_of(), &EngineConfig::default()).unwrap();
        assert_eq!(report.unreadable.len(), 1);
        assert!(!report.can_save());
    }
}
