//! Cross-entity referential integrity between named collections.
//!
//! Each rule checks one collection (`entity_type`) against the collections it
//! depends on. When any dependency is absent or empty the rule is *skipped*:
//! reported as passing with `skipped = true`, so callers can tell "not yet
//! checkable" apart from "checked and fine".

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::business_catalogue::{
    COLLECTION_CLIENTS, COLLECTION_PERSONNEL, COLLECTION_PURCHASE_ORDERS, COLLECTION_ROUTES,
    COLLECTION_SITES, COLLECTION_TRIPS, COLLECTION_VEHICLES,
};
use super::dataset::{id_key, record_id, record_label, Dataset};
use super::engine::{fault_result, isolate, RuleProvider};
use super::rules::{ensure_unique_ids, Severity, ValidationResult, ValidationRule};
use crate::error::CoreError;
use crate::types::Record;

/// Message prefix for rules skipped on missing dependency data.
pub const SKIPPED_PREFIX: &str = "Skipped: insufficient data";

// ---------------------------------------------------------------------------
// Violations and dependencies
// ---------------------------------------------------------------------------

/// One broken reference found in a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub record_index: usize,
    pub record_id: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn new(index: usize, record: &Record, message: impl Into<String>) -> Self {
        Self {
            record_index: index,
            record_id: record_id(record),
            message: message.into(),
        }
    }
}

/// Dependency collections resolved from the dataset, all non-empty.
#[derive(Debug)]
pub struct Dependencies<'a> {
    collections: BTreeMap<&'a str, &'a [Record]>,
}

impl<'a> Dependencies<'a> {
    fn resolve(dataset: &'a Dataset, names: &'a [String]) -> Self {
        Self {
            collections: names
                .iter()
                .map(|name| (name.as_str(), dataset.records(name)))
                .collect(),
        }
    }

    pub fn records(&self, name: &str) -> &'a [Record] {
        self.collections.get(name).copied().unwrap_or(&[])
    }

    /// Canonical ids present in the named collection.
    pub fn ids(&self, name: &str) -> HashSet<String> {
        self.records(name).iter().filter_map(record_id).collect()
    }

    /// Records of the named collection keyed by canonical id.
    pub fn index(&self, name: &str) -> HashMap<String, &'a Record> {
        self.records(name)
            .iter()
            .filter_map(|r| record_id(r).map(|id| (id, r)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Custom checker: records of the checked collection plus the resolved
/// dependencies in, violations out.
pub type CrossEntityChecker =
    Arc<dyn Fn(&[Record], &Dependencies<'_>) -> Vec<Violation> + Send + Sync>;

/// What a cross-entity rule verifies.
///
/// Every variant is a pure fold over the checked records; all violations
/// of all fields are collected, nothing short-circuits.
#[derive(Clone)]
pub enum CrossEntityCheck {
    /// Each field, when set, holds the id of a record in `target`.
    ForeignKey { fields: Vec<String>, target: String },
    /// Every id in the array `field` exists in `target`.
    ForeignKeyList { field: String, target: String },
    /// The `target` record referenced by `reference_field` has the same
    /// `owner_field` value as the checked record.
    SameOwner {
        reference_field: String,
        target: String,
        owner_field: String,
    },
    /// Arbitrary check reading the collections in `reads`.
    Custom {
        reads: Vec<String>,
        checker: CrossEntityChecker,
    },
}

impl CrossEntityCheck {
    pub fn foreign_key(fields: &[&str], target: &str) -> Self {
        Self::ForeignKey {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            target: target.to_string(),
        }
    }

    pub fn foreign_key_list(field: &str, target: &str) -> Self {
        Self::ForeignKeyList {
            field: field.to_string(),
            target: target.to_string(),
        }
    }

    pub fn same_owner(reference_field: &str, target: &str, owner_field: &str) -> Self {
        Self::SameOwner {
            reference_field: reference_field.to_string(),
            target: target.to_string(),
            owner_field: owner_field.to_string(),
        }
    }

    pub fn custom<F>(reads: &[&str], checker: F) -> Self
    where
        F: Fn(&[Record], &Dependencies<'_>) -> Vec<Violation> + Send + Sync + 'static,
    {
        Self::Custom {
            reads: reads.iter().map(|r| r.to_string()).collect(),
            checker: Arc::new(checker),
        }
    }

    /// Collections this check looks up.
    pub fn reads(&self) -> Vec<&str> {
        match self {
            Self::ForeignKey { target, .. }
            | Self::ForeignKeyList { target, .. }
            | Self::SameOwner { target, .. } => vec![target.as_str()],
            Self::Custom { reads, .. } => reads.iter().map(String::as_str).collect(),
        }
    }

    fn run(&self, records: &[Record], deps: &Dependencies<'_>) -> Vec<Violation> {
        match self {
            Self::ForeignKey { fields, target } => {
                let ids = deps.ids(target);
                let ids = &ids;
                records
                    .iter()
                    .enumerate()
                    .flat_map(|(index, record)| {
                        fields.iter().filter_map(move |field| {
                            let value = record.get(field).and_then(id_key)?;
                            (!ids.contains(&value)).then(|| {
                                Violation::new(
                                    index,
                                    record,
                                    format!("{field} {value} not found in {target}"),
                                )
                            })
                        })
                    })
                    .collect()
            }
            Self::ForeignKeyList { field, target } => {
                let ids = deps.ids(target);
                records
                    .iter()
                    .enumerate()
                    .flat_map(|(index, record)| {
                        let listed: Vec<String> = record
                            .get(field)
                            .and_then(|v| v.as_array())
                            .map(|items| items.iter().filter_map(id_key).collect())
                            .unwrap_or_default();
                        listed
                            .into_iter()
                            .filter(|id| !ids.contains(id))
                            .map(|id| {
                                Violation::new(index, record, format!("{field} entry {id} not found in {target}"))
                            })
                            .collect::<Vec<_>>()
                    })
                    .collect()
            }
            Self::SameOwner {
                reference_field,
                target,
                owner_field,
            } => {
                let index_by_id = deps.index(target);
                records
                    .iter()
                    .enumerate()
                    .filter_map(|(index, record)| {
                        let reference = record.get(reference_field).and_then(id_key)?;
                        let referenced = index_by_id.get(&reference)?;
                        let own = record.get(owner_field).and_then(id_key)?;
                        let theirs = referenced.get(owner_field).and_then(id_key)?;
                        (own != theirs).then(|| {
                            Violation::new(
                                index,
                                record,
                                format!(
                                    "{reference_field} {reference} belongs to {owner_field} {theirs}, not {own}"
                                ),
                            )
                        })
                    })
                    .collect()
            }
            Self::Custom { checker, .. } => checker(records, deps),
        }
    }
}

impl fmt::Debug for CrossEntityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignKey { fields, target } => f
                .debug_struct("ForeignKey")
                .field("fields", fields)
                .field("target", target)
                .finish(),
            Self::ForeignKeyList { field, target } => f
                .debug_struct("ForeignKeyList")
                .field("field", field)
                .field("target", target)
                .finish(),
            Self::SameOwner {
                reference_field,
                target,
                owner_field,
            } => f
                .debug_struct("SameOwner")
                .field("reference_field", reference_field)
                .field("target", target)
                .field("owner_field", owner_field)
                .finish(),
            Self::Custom { reads, .. } => f
                .debug_struct("Custom")
                .field("reads", reads)
                .finish_non_exhaustive(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossEntityRuleConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Collection being checked.
    pub entity_type: String,
    /// Collections that must be present and non-empty for the rule to run.
    pub dependencies: Vec<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct CrossEntityRule {
    pub config: CrossEntityRuleConfig,
    pub check: CrossEntityCheck,
}

impl CrossEntityRule {
    pub fn new(
        id: &str,
        name: &str,
        entity_type: &str,
        dependencies: &[&str],
        severity: Severity,
        check: CrossEntityCheck,
    ) -> Self {
        Self {
            config: CrossEntityRuleConfig {
                id: id.to_string(),
                name: name.to_string(),
                description: String::new(),
                entity_type: entity_type.to_string(),
                dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
                severity,
            },
            check,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.config.description = description.to_string();
        self
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Dependency collections absent or empty in `dataset`.
    pub fn missing_dependencies<'a>(&'a self, dataset: &Dataset) -> Vec<&'a str> {
        self.config
            .dependencies
            .iter()
            .map(String::as_str)
            .filter(|name| !dataset.has_records(name))
            .collect()
    }
}

/// Dataset-level outcome of one cross-entity rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossEntityResult {
    pub rule_id: String,
    pub severity: Severity,
    #[serde(flatten)]
    pub result: ValidationResult,
    pub affected_records: usize,
    /// Not evaluated because dependency data was missing.
    pub skipped: bool,
    pub violations: Vec<Violation>,
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CrossEntityValidator {
    rules: Arc<[CrossEntityRule]>,
}

impl CrossEntityValidator {
    /// Reject duplicate ids and checks that read undeclared collections.
    pub fn new(rules: Vec<CrossEntityRule>) -> Result<Self, CoreError> {
        ensure_unique_ids(rules.iter().map(CrossEntityRule::id))?;
        for rule in &rules {
            for collection in rule.check.reads() {
                if !rule.config.dependencies.iter().any(|d| d == collection) {
                    return Err(CoreError::UndeclaredDependency {
                        rule_id: rule.id().to_string(),
                        collection: collection.to_string(),
                    });
                }
            }
        }
        Ok(Self {
            rules: rules.into(),
        })
    }

    pub fn rules(&self) -> &[CrossEntityRule] {
        &self.rules
    }

    pub fn evaluate(&self, dataset: &Dataset) -> Vec<CrossEntityResult> {
        self.rules
            .iter()
            .map(|rule| match isolate(|| Ok(evaluate_rule(rule, dataset))) {
                Ok(result) => result,
                Err(fault) => {
                    tracing::warn!(rule_id = rule.id(), fault = %fault, "Cross-entity rule faulted");
                    CrossEntityResult {
                        rule_id: rule.id().to_string(),
                        severity: rule.config.severity,
                        result: fault_result(&rule.config.name, &fault),
                        affected_records: 0,
                        skipped: false,
                        violations: Vec::new(),
                    }
                }
            })
            .collect()
    }
}

impl RuleProvider<Dataset> for CrossEntityValidator {
    fn validation_rules(&self) -> Vec<ValidationRule<Dataset>> {
        self.rules
            .iter()
            .map(|rule| {
                let owned = rule.clone();
                ValidationRule::new(
                    rule.id(),
                    "Integrity",
                    rule.config.name.as_str(),
                    rule.config.severity,
                    move |dataset: &Dataset| Ok(evaluate_rule(&owned, dataset).result),
                )
                .with_description(rule.config.description.as_str())
            })
            .collect()
    }
}

fn evaluate_rule(rule: &CrossEntityRule, dataset: &Dataset) -> CrossEntityResult {
    let config = &rule.config;
    let entity = config.entity_type.as_str();
    let mut outcome = CrossEntityResult {
        rule_id: config.id.clone(),
        severity: config.severity,
        result: ValidationResult::pass(format!("No {entity} records to check")),
        affected_records: 0,
        skipped: false,
        violations: Vec::new(),
    };

    let missing = rule.missing_dependencies(dataset);
    if !missing.is_empty() {
        tracing::debug!(rule_id = %config.id, missing = ?missing, "Cross-entity rule skipped");
        outcome.skipped = true;
        outcome.result = ValidationResult::pass(format!(
            "{SKIPPED_PREFIX} (missing or empty: {})",
            missing.join(", ")
        ));
        return outcome;
    }

    let records = dataset.records(entity);
    if records.is_empty() {
        return outcome;
    }

    let deps = Dependencies::resolve(dataset, &config.dependencies);
    let violations = rule.check.run(records, &deps);
    let affected: BTreeSet<usize> = violations.iter().map(|v| v.record_index).collect();
    let total = records.len();

    outcome.affected_records = affected.len();
    outcome.result = if violations.is_empty() {
        ValidationResult::pass(format!("All {total} {entity} records have valid references"))
    } else {
        ValidationResult::fail(format!(
            "{} of {total} {entity} records have broken references",
            affected.len()
        ))
        .with_details(violations.iter().map(|v| {
            let label = records
                .get(v.record_index)
                .map_or_else(|| format!("record #{}", v.record_index), |r| record_label(r, v.record_index));
            format!("{label}: {}", v.message)
        }))
        .with_suggestion("Fix or remove the references, or restore the missing records.")
    };
    outcome.violations = violations;
    outcome
}

// ---------------------------------------------------------------------------
// Default catalogue
// ---------------------------------------------------------------------------

/// Referential integrity rules between the back office collections.
pub fn default_cross_entity_rules() -> Vec<CrossEntityRule> {
    vec![
        CrossEntityRule::new(
            "site-client-exists",
            "Site client exists",
            COLLECTION_SITES,
            &[COLLECTION_CLIENTS],
            Severity::Error,
            CrossEntityCheck::foreign_key(&["client_id"], COLLECTION_CLIENTS),
        )
        .with_description("Every site references an existing client."),
        CrossEntityRule::new(
            "route-sites-exist",
            "Route endpoints exist",
            COLLECTION_ROUTES,
            &[COLLECTION_SITES],
            Severity::Error,
            CrossEntityCheck::foreign_key(
                &["origin_site_id", "destination_site_id"],
                COLLECTION_SITES,
            ),
        )
        .with_description("Route origin and destination reference existing sites."),
        CrossEntityRule::new(
            "trip-client-exists",
            "Trip client exists",
            COLLECTION_TRIPS,
            &[COLLECTION_CLIENTS],
            Severity::Error,
            CrossEntityCheck::foreign_key(&["client_id"], COLLECTION_CLIENTS),
        ),
        CrossEntityRule::new(
            "trip-route-exists",
            "Trip route exists",
            COLLECTION_TRIPS,
            &[COLLECTION_ROUTES],
            Severity::Error,
            CrossEntityCheck::foreign_key(&["route_id"], COLLECTION_ROUTES),
        ),
        CrossEntityRule::new(
            "trip-vehicles-exist",
            "Trip vehicles exist",
            COLLECTION_TRIPS,
            &[COLLECTION_VEHICLES],
            Severity::Error,
            CrossEntityCheck::foreign_key_list("vehicle_ids", COLLECTION_VEHICLES),
        ),
        CrossEntityRule::new(
            "trip-drivers-exist",
            "Trip drivers exist",
            COLLECTION_TRIPS,
            &[COLLECTION_PERSONNEL],
            Severity::Error,
            CrossEntityCheck::foreign_key_list("driver_ids", COLLECTION_PERSONNEL),
        ),
        CrossEntityRule::new(
            "trip-route-client-match",
            "Trip route belongs to client",
            COLLECTION_TRIPS,
            &[COLLECTION_ROUTES],
            Severity::Warning,
            CrossEntityCheck::same_owner("route_id", COLLECTION_ROUTES, "client_id"),
        ),
        CrossEntityRule::new(
            "po-vehicle-exists",
            "Purchase order vehicle exists",
            COLLECTION_PURCHASE_ORDERS,
            &[COLLECTION_VEHICLES],
            Severity::Warning,
            CrossEntityCheck::foreign_key(&["vehicle_id"], COLLECTION_VEHICLES),
        ),
        CrossEntityRule::new(
            "client-has-site",
            "Client has a site",
            COLLECTION_CLIENTS,
            &[COLLECTION_SITES],
            Severity::Info,
            CrossEntityCheck::custom(&[COLLECTION_SITES], |clients, deps| {
                let owners: HashSet<String> = deps
                    .records(COLLECTION_SITES)
                    .iter()
                    .filter_map(|s| s.get("client_id").and_then(id_key))
                    .collect();
                clients
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| record_id(c).is_some_and(|id| !owners.contains(&id)))
                    .map(|(index, c)| Violation::new(index, c, "Client has no registered site"))
                    .collect()
            }),
        ),
    ]
}
