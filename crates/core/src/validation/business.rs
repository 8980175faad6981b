//! Business rules: per-record predicates applied to one collection of a
//! dataset, with operator-controlled enablement.
//!
//! Each rule names the collection (`entity_type`) it inspects. Every record
//! of that collection is checked independently and the outcomes are folded
//! into one [`BusinessRuleValidationResult`]; the same rules are exposed to
//! the validator core through [`RuleProvider<Dataset>`].
//!
//! Enablement is a value, not hidden state: [`BusinessRuleValidator::toggle_rule`]
//! returns a new validator sharing the same catalogue.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use super::business_catalogue::CTX_EXPIRY_NOTICE_DAYS;
use super::dataset::{record_label, Dataset};
use super::engine::{fault_result, isolate, RuleProvider};
use super::rules::{ensure_unique_ids, Severity, ValidationResult, ValidationRule};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::types::Record;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Read-only lookups available to every record predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleContext {
    as_of: NaiveDate,
    values: serde_json::Map<String, Value>,
}

impl RuleContext {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            values: serde_json::Map::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// The date rules treat as "today".
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(default)
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// Outcome of one record predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordCheck {
    pub passed: bool,
    pub message: Option<String>,
    pub details: Vec<String>,
}

impl RecordCheck {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
            details: Vec::new(),
        }
    }

    pub fn when(passed: bool, fail_message: impl Into<String>) -> Self {
        if passed {
            Self::pass()
        } else {
            Self::fail(fail_message)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }
}

type RecordFn = Arc<dyn Fn(&Record, &RuleContext) -> RecordCheck + Send + Sync>;

/// A rule applied to every record of one collection.
pub struct BusinessRule {
    id: String,
    category: String,
    name: String,
    description: String,
    severity: Severity,
    entity_type: String,
    enabled: bool,
    required: bool,
    validation_fn: RecordFn,
}

impl BusinessRule {
    pub fn new<F>(
        id: impl Into<String>,
        category: impl Into<String>,
        name: impl Into<String>,
        entity_type: impl Into<String>,
        severity: Severity,
        validation_fn: F,
    ) -> Self
    where
        F: Fn(&Record, &RuleContext) -> RecordCheck + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            category: category.into(),
            name: name.into(),
            description: String::new(),
            severity,
            entity_type: entity_type.into(),
            enabled: true,
            required: false,
            validation_fn: Arc::new(validation_fn),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark a non-error rule as required for submit-readiness.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Leave the rule out of the default enabled set.
    pub fn disabled_by_default(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Explicitly required, or error severity.
    pub fn is_required(&self) -> bool {
        self.required || self.severity == Severity::Error
    }

    /// Whether the rule starts out enabled.
    pub fn enabled_by_default(&self) -> bool {
        self.enabled
    }

    pub fn check(&self, record: &Record, context: &RuleContext) -> RecordCheck {
        (self.validation_fn)(record, context)
    }
}

impl Clone for BusinessRule {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            category: self.category.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            severity: self.severity,
            entity_type: self.entity_type.clone(),
            enabled: self.enabled,
            required: self.required,
            validation_fn: Arc::clone(&self.validation_fn),
        }
    }
}

impl fmt::Debug for BusinessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusinessRule")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("entity_type", &self.entity_type)
            .field("severity", &self.severity)
            .field("enabled", &self.enabled)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A record that failed a business rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDetail {
    pub record: Record,
    pub message: String,
    pub details: Vec<String>,
}

/// Dataset-level outcome of one business rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessRuleValidationResult {
    pub rule_id: String,
    pub category: String,
    pub severity: Severity,
    #[serde(flatten)]
    pub result: ValidationResult,
    pub records_checked: usize,
    pub affected_records: usize,
    pub entity_details: Vec<EntityDetail>,
}

// ---------------------------------------------------------------------------
// Enablement
// ---------------------------------------------------------------------------

/// The set of enabled rule ids. Updates produce a new set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnabledRules(BTreeSet<String>);

impl EnabledRules {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// A copy with `id` flipped.
    pub fn toggle(&self, id: &str) -> Self {
        let mut ids = self.0.clone();
        if !ids.remove(id) {
            ids.insert(id.to_string());
        }
        Self(ids)
    }

    /// A copy with every id in `ids` added.
    pub fn with_rules<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = self.0.clone();
        set.extend(ids.into_iter().map(Into::into));
        Self(set)
    }

    /// A copy with every id in `ids` removed.
    pub fn without_rules<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = self.0.clone();
        for id in ids {
            set.remove(id.as_ref());
        }
        Self(set)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Runs a business rule catalogue over a [`Dataset`].
#[derive(Debug, Clone)]
pub struct BusinessRuleValidator {
    catalogue: Arc<[BusinessRule]>,
    context: Arc<RuleContext>,
    enabled: EnabledRules,
    strict_collections: bool,
}

impl BusinessRuleValidator {
    /// Build a validator with each rule's default enablement.
    pub fn new(catalogue: Vec<BusinessRule>, context: RuleContext) -> Result<Self, CoreError> {
        let defaults = EnabledRules::from_ids(
            catalogue
                .iter()
                .filter(|r| r.enabled_by_default())
                .map(|r| r.id().to_string()),
        );
        Self::with_enabled_rules(catalogue, context, defaults)
    }

    /// Build a validator with an explicit enabled set. Unknown ids are dropped.
    pub fn with_enabled_rules(
        catalogue: Vec<BusinessRule>,
        context: RuleContext,
        enabled: EnabledRules,
    ) -> Result<Self, CoreError> {
        ensure_unique_ids(catalogue.iter().map(BusinessRule::id))?;
        let validator = Self {
            catalogue: catalogue.into(),
            context: Arc::new(context),
            enabled: EnabledRules::default(),
            strict_collections: false,
        };
        Ok(validator.set_enabled_rules(enabled.iter()))
    }

    /// Apply engine settings. The expiry notice period fills
    /// [`CTX_EXPIRY_NOTICE_DAYS`] unless the context already sets it.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.strict_collections = config.strict_collections;
        if self.context.get(CTX_EXPIRY_NOTICE_DAYS).is_none() {
            let context = (*self.context)
                .clone()
                .with_value(CTX_EXPIRY_NOTICE_DAYS, Value::from(config.expiry_notice_days));
            self.context = Arc::new(context);
        }
        self
    }

    pub fn catalogue(&self) -> &[BusinessRule] {
        &self.catalogue
    }

    pub fn context(&self) -> &RuleContext {
        &self.context
    }

    pub fn enabled_rules(&self) -> &EnabledRules {
        &self.enabled
    }

    pub fn is_rule_enabled(&self, id: &str) -> bool {
        self.enabled.is_enabled(id)
    }

    /// A validator with `id` flipped in the enabled set.
    pub fn toggle_rule(&self, id: &str) -> Self {
        if !self.knows(id) {
            tracing::warn!(rule_id = id, "Toggle requested for unknown business rule");
            return self.clone();
        }
        Self {
            enabled: self.enabled.toggle(id),
            ..self.clone()
        }
    }

    /// A validator whose enabled set is exactly `ids` (unknown ids dropped).
    pub fn set_enabled_rules<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut known = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if self.knows(id) {
                known.push(id.to_string());
            } else {
                tracing::warn!(rule_id = id, "Ignoring unknown business rule id");
            }
        }
        Self {
            enabled: EnabledRules::from_ids(known),
            ..self.clone()
        }
    }

    /// Enabled rules in catalogue order.
    pub fn active_rules(&self) -> impl Iterator<Item = &BusinessRule> {
        self.catalogue
            .iter()
            .filter(|r| self.enabled.is_enabled(r.id()))
    }

    /// Evaluate every enabled rule, keeping per-record detail.
    pub fn evaluate(&self, dataset: &Dataset) -> Vec<BusinessRuleValidationResult> {
        self.active_rules()
            .map(|rule| {
                match isolate(|| Ok(evaluate_rule(rule, &self.context, self.strict_collections, dataset))) {
                    Ok(result) => result,
                    Err(fault) => {
                        tracing::warn!(rule_id = rule.id(), fault = %fault, "Business rule faulted");
                        BusinessRuleValidationResult {
                            rule_id: rule.id().to_string(),
                            category: rule.category().to_string(),
                            severity: rule.severity(),
                            result: fault_result(rule.name(), &fault),
                            records_checked: 0,
                            affected_records: 0,
                            entity_details: Vec::new(),
                        }
                    }
                }
            })
            .collect()
    }

    fn knows(&self, id: &str) -> bool {
        self.catalogue.iter().any(|r| r.id() == id)
    }
}

impl RuleProvider<Dataset> for BusinessRuleValidator {
    fn validation_rules(&self) -> Vec<ValidationRule<Dataset>> {
        self.active_rules()
            .map(|rule| {
                let owned = rule.clone();
                let context = Arc::clone(&self.context);
                let strict = self.strict_collections;
                ValidationRule::new(
                    rule.id(),
                    rule.category(),
                    rule.name(),
                    rule.severity(),
                    move |dataset: &Dataset| {
                        Ok(evaluate_rule(&owned, &context, strict, dataset).result)
                    },
                )
                .with_description(rule.description())
                .with_required(rule.required)
            })
            .collect()
    }
}

/// Apply `rule` to every record of its collection and fold the outcomes.
fn evaluate_rule(
    rule: &BusinessRule,
    context: &RuleContext,
    strict_collections: bool,
    dataset: &Dataset,
) -> BusinessRuleValidationResult {
    let entity = rule.entity_type();
    let mut outcome = BusinessRuleValidationResult {
        rule_id: rule.id().to_string(),
        category: rule.category().to_string(),
        severity: rule.severity(),
        result: ValidationResult::pass(format!("No {entity} records to check")),
        records_checked: 0,
        affected_records: 0,
        entity_details: Vec::new(),
    };

    let Some(records) = dataset.collection(entity) else {
        tracing::warn!(
            rule_id = rule.id(),
            collection = entity,
            "Business rule collection absent from dataset"
        );
        outcome.result = if strict_collections {
            ValidationResult::fail(format!(
                "No '{entity}' collection supplied; rule cannot be evaluated"
            ))
            .with_suggestion("Check the collection name the rule is keyed on.")
        } else {
            ValidationResult::pass(format!(
                "No {entity} records to check (collection not supplied)"
            ))
        };
        return outcome;
    };
    if records.is_empty() {
        return outcome;
    }

    let mut lines = Vec::new();
    for (index, record) in records.iter().enumerate() {
        let check = rule.check(record, context);
        if check.passed {
            continue;
        }
        let message = check
            .message
            .unwrap_or_else(|| format!("{} failed", rule.name()));
        lines.push(format!("{}: {message}", record_label(record, index)));
        outcome.entity_details.push(EntityDetail {
            record: record.clone(),
            message,
            details: check.details,
        });
    }

    let total = records.len();
    let failed = outcome.entity_details.len();
    outcome.records_checked = total;
    outcome.affected_records = failed;
    outcome.result = if failed == 0 {
        ValidationResult::pass(format!("All {total} {entity} records passed"))
    } else {
        ValidationResult::fail(format!("{failed} of {total} {entity} records failed"))
            .with_details(lines)
    };
    outcome
}
