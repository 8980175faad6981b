//! Engine-wide properties and end-to-end scenarios.

use std::sync::Arc;

use chrono::NaiveDate;
use fleetdesk_core::validation::business::{BusinessRule, BusinessRuleValidator, RecordCheck, RuleContext};
use fleetdesk_core::validation::business_catalogue::default_business_rules;
use fleetdesk_core::validation::cross_entity::{
    default_cross_entity_rules, CrossEntityCheck, CrossEntityRule, CrossEntityValidator,
};
use fleetdesk_core::validation::dataset::number_field;
use fleetdesk_core::validation::session::ValidationSession;
use fleetdesk_core::{
    run_validation, validate, CoreError, Dataset, RuleProvider, Severity, ValidationResult,
    ValidationRule,
};
use serde_json::{json, Value};

struct Rules(Vec<ValidationRule<Value>>);

impl RuleProvider<Value> for Rules {
    fn validation_rules(&self) -> Vec<ValidationRule<Value>> {
        self.0.clone()
    }
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
}

fn dataset(value: Value) -> Dataset {
    Dataset::from_value(value).unwrap()
}

fn always(id: &str, severity: Severity, passed: bool) -> ValidationRule<Value> {
    ValidationRule::new(id, "Basic Data", id, severity, move |_| {
        Ok(ValidationResult::check(passed, "ok", "not ok"))
    })
}

fn route_distance_rule() -> BusinessRule {
    BusinessRule::new(
        "route-distance",
        "Routes",
        "Route distance",
        "routes",
        Severity::Error,
        |r, _| {
            RecordCheck::when(
                number_field(r, "distance_km").is_some_and(|d| d > 0.0),
                "Distance must be positive",
            )
        },
    )
}

// ---------------------------------------------------------------------------
// Core properties
// ---------------------------------------------------------------------------

#[test]
fn one_result_per_rule_even_when_rules_fault() {
    let rules = Rules(vec![
        always("a", Severity::Error, true),
        ValidationRule::new("b", "Basic Data", "Throws", Severity::Warning, |_| {
            Err(CoreError::Validation("boom".into()))
        }),
        ValidationRule::new("c", "Basic Data", "Panics", Severity::Info, |_| panic!("boom")),
        always("d", Severity::Warning, false),
    ]);

    let report = validate(&rules, &json!({}));
    assert_eq!(report.results.len(), 4);
    assert_eq!(report.summary.total_rules, 4);
    assert_eq!(report.summary.passed_rules, 1);

    let faulted = &report.results["b"];
    assert!(!faulted.passed);
    assert_eq!(faulted.message, "Error validating: Throws");
    assert!(faulted.suggestion.is_some());
}

#[test]
fn score_bounds() {
    let empty = validate(&Rules(Vec::new()), &json!({}));
    assert_eq!(empty.summary.score, 0.0);
    assert_eq!(empty.summary.total_rules, 0);

    let all = validate(
        &Rules(vec![always("a", Severity::Error, true), always("b", Severity::Info, true)]),
        &json!({}),
    );
    assert_eq!(all.summary.score, 100.0);

    let most = validate(
        &Rules(vec![
            always("a", Severity::Error, true),
            always("b", Severity::Info, true),
            always("c", Severity::Info, false),
        ]),
        &json!({}),
    );
    assert!(most.summary.score < 100.0);
    assert!(most.summary.score > 66.0);
}

#[test]
fn warnings_allow_save_but_not_validity() {
    let report = validate(&Rules(vec![always("w", Severity::Warning, false)]), &json!({}));
    assert!(report.summary.can_save);
    assert!(!report.summary.is_valid);
    assert!(report.summary.can_submit);
}

#[test]
fn required_warning_blocks_submit() {
    let rules = Rules(vec![always("w", Severity::Warning, false).with_required(true)]);
    let report = validate(&rules, &json!({}));
    assert!(report.summary.can_save);
    assert!(!report.summary.can_submit);
    assert_eq!(report.summary.unsatisfied_required, ["w"]);
}

#[test]
fn rerunning_is_idempotent() {
    let rules = Rules(vec![
        always("a", Severity::Error, false),
        always("b", Severity::Warning, true),
    ]);
    let input = json!({ "x": 1 });
    assert_eq!(validate(&rules, &input), validate(&rules, &input));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn single_failing_required_error() {
    let report = validate(&Rules(vec![always("a", Severity::Error, false)]), &json!({}));
    let s = &report.summary;
    assert_eq!(s.total_rules, 1);
    assert_eq!(s.passed_rules, 0);
    assert_eq!(s.errors.len(), 1);
    assert_eq!(s.score, 0.0);
    assert!(!s.can_save);
    assert!(!s.can_submit);
}

#[test]
fn business_rule_reports_the_failing_route() {
    let validator =
        BusinessRuleValidator::new(vec![route_distance_rule()], RuleContext::new(as_of())).unwrap();
    let results = validator.evaluate(&dataset(json!({
        "routes": [
            { "id": "r1", "distance_km": 120 },
            { "id": "r2", "distance_km": -5 }
        ]
    })));

    let r = &results[0];
    assert!(!r.result.passed);
    assert_eq!(r.affected_records, 1);
    assert_eq!(r.entity_details.len(), 1);
    assert_eq!(r.entity_details[0].record["id"], json!("r2"));
}

#[test]
fn cross_entity_rule_skips_on_empty_dependency() {
    let rule = CrossEntityRule::new(
        "site-client",
        "Site client exists",
        "sites",
        &["clients"],
        Severity::Error,
        CrossEntityCheck::foreign_key(&["client_id"], "clients"),
    );
    let validator = CrossEntityValidator::new(vec![rule]).unwrap();
    let data = dataset(json!({ "sites": [{ "id": 1, "client_id": 4 }], "clients": [] }));

    let r = &validator.evaluate(&data)[0];
    assert!(r.result.passed);
    assert!(r.skipped);
    assert!(r.result.message.contains("insufficient data"));
    assert_eq!(r.affected_records, 0);

    let report = validate(&validator, &data);
    assert!(report.summary.errors.is_empty());
}

// ---------------------------------------------------------------------------
// Enablement
// ---------------------------------------------------------------------------

#[test]
fn toggle_removes_and_restores_identical_rule() {
    let validator =
        BusinessRuleValidator::new(default_business_rules(), RuleContext::new(as_of())).unwrap();
    let before = validator.validation_rules();
    let original = before.iter().find(|r| r.id() == "trip-crew-assigned").unwrap();

    let off = validator.toggle_rule("trip-crew-assigned");
    assert!(!off.is_rule_enabled("trip-crew-assigned"));
    assert!(off.validation_rules().iter().all(|r| r.id() != "trip-crew-assigned"));
    assert!(validator.is_rule_enabled("trip-crew-assigned"));

    let on = off.toggle_rule("trip-crew-assigned");
    let rules = on.validation_rules();
    let restored = rules.iter().find(|r| r.id() == "trip-crew-assigned").unwrap();
    assert_eq!(restored.id(), original.id());
    assert_eq!(restored.category(), original.category());
    assert_eq!(restored.severity(), original.severity());
    assert_eq!(rules.len(), before.len());
}

#[test]
fn disabled_rule_does_not_count() {
    let validator =
        BusinessRuleValidator::new(vec![route_distance_rule()], RuleContext::new(as_of())).unwrap();
    let data = dataset(json!({ "routes": [{ "id": 1, "distance_km": 0 }] }));
    assert!(!validate(&validator, &data).summary.can_save);

    let off = validator.set_enabled_rules(std::iter::empty::<&str>());
    let report = validate(&off, &data);
    assert_eq!(report.summary.total_rules, 0);
    assert!(report.summary.can_save);
}

// ---------------------------------------------------------------------------
// Full dataset
// ---------------------------------------------------------------------------

#[test]
fn consistent_dataset_passes_every_error_rule() {
    let data = dataset(json!({
        "clients": [{ "id": 1, "name": "Acme" }],
        "sites": [
            { "id": 10, "client_id": 1 },
            { "id": 11, "client_id": 1 }
        ],
        "routes": [{
            "id": 5, "client_id": 1, "origin_site_id": 10,
            "destination_site_id": 11, "distance_km": 420
        }],
        "vehicles": [{ "id": 7, "plate": "AB-12-CD", "insurance_expiry": "2027-01-01" }],
        "personnel": [{ "id": 3, "email": "d@fleet.example", "license_expiry": "2028-01-01" }],
        "trips": [{
            "id": 100, "client_id": 1, "route_id": 5, "vehicle_ids": [7],
            "driver_ids": [3], "status": "planned"
        }]
    }));

    let business =
        BusinessRuleValidator::new(default_business_rules(), RuleContext::new(as_of())).unwrap();
    let integrity = CrossEntityValidator::new(default_cross_entity_rules()).unwrap();

    let b = validate(&business, &data);
    assert!(b.summary.can_save, "{:?}", b.summary.errors);
    let c = validate(&integrity, &data);
    assert!(c.summary.can_save, "{:?}", c.summary.errors);
    assert!(c.summary.is_valid, "{:?}", c.summary.warnings);
}

#[test]
fn broken_reference_blocks_save() {
    let data = dataset(json!({
        "clients": [{ "id": 1 }],
        "sites": [{ "id": 10, "client_id": 2 }]
    }));
    let integrity = CrossEntityValidator::new(default_cross_entity_rules()).unwrap();
    let results = run_validation(&integrity, &data);
    assert!(!results["site-client-exists"].passed);
    assert!(results["route-sites-exist"].passed);
}

#[test]
fn session_tracks_dataset_changes() {
    let validator =
        BusinessRuleValidator::new(vec![route_distance_rule()], RuleContext::new(as_of())).unwrap();
    let mut session = ValidationSession::new(validator);

    session.set_input(Arc::new(dataset(json!({ "routes": [{ "id": 1, "distance_km": 0 }] }))));
    assert!(!session.summary().unwrap().can_save);

    session.set_input(Arc::new(dataset(json!({ "routes": [{ "id": 1, "distance_km": 9 }] }))));
    assert!(session.summary().unwrap().can_save);
    assert_eq!(session.runs(), 2);
}
