//! Summary aggregation: counts, score and the save/submit gates.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use super::engine::ValidationResults;
use super::rules::{Severity, ValidationResult, ValidationRule};

/// A failing rule paired with its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub rule_name: String,
    pub category: String,
    pub severity: Severity,
    pub required: bool,
    pub result: ValidationResult,
}

/// Pass counts for one rule category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    pub total: usize,
    pub passed: usize,
}

/// Derived view over one set of results. Never stored, never patched:
/// recompute it from the results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSummary {
    /// No failing errors and no failing warnings.
    pub is_valid: bool,
    pub total_rules: usize,
    pub passed_rules: usize,
    pub errors: Vec<RuleOutcome>,
    pub warnings: Vec<RuleOutcome>,
    pub infos: Vec<RuleOutcome>,
    /// `passed_rules / total_rules * 100`, or 0 with no rules.
    pub score: f64,
    /// No error-severity failures.
    pub can_save: bool,
    /// `can_save` and every required rule present and passing.
    pub can_submit: bool,
    /// Ids of required rules that are missing from the results or failed.
    pub unsatisfied_required: Vec<String>,
    pub categories: BTreeMap<String, CategoryTally>,
}

impl ValidationSummary {
    /// Every failing rule: errors, then warnings, then infos.
    pub fn outcomes(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.errors.iter().chain(&self.warnings).chain(&self.infos)
    }

    /// Number of failing rules of any severity.
    pub fn failed_rules(&self) -> usize {
        self.total_rules - self.passed_rules
    }
}

/// Compute the score from total and passed rule counts.
///
/// Returns 0 if `total_rules` is 0.
pub fn compute_score(total_rules: usize, passed_rules: usize) -> f64 {
    if total_rules == 0 {
        return 0.0;
    }
    passed_rules as f64 / total_rules as f64 * 100.0
}

/// Pair each rule with its result and derive the summary.
///
/// Rules without a result are not counted, but a required rule without a
/// result still blocks `can_submit`.
pub fn calculate_validation_summary<T>(
    results: &ValidationResults,
    rules: &[ValidationRule<T>],
) -> ValidationSummary {
    let mut total_rules = 0usize;
    let mut passed_rules = 0usize;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut infos = Vec::new();
    let mut unsatisfied_required = Vec::new();
    let mut categories: BTreeMap<String, CategoryTally> = BTreeMap::new();

    let mut seen = HashSet::new();

    for rule in rules {
        // Repeated ids share one result; count it once.
        if !seen.insert(rule.id()) {
            continue;
        }
        let Some(result) = results.get(rule.id()) else {
            if rule.is_required() {
                unsatisfied_required.push(rule.id().to_string());
            }
            continue;
        };

        total_rules += 1;
        let tally = categories.entry(rule.category().to_string()).or_default();
        tally.total += 1;

        if result.passed {
            passed_rules += 1;
            tally.passed += 1;
            continue;
        }

        if rule.is_required() {
            unsatisfied_required.push(rule.id().to_string());
        }
        let outcome = RuleOutcome {
            rule_id: rule.id().to_string(),
            rule_name: rule.name().to_string(),
            category: rule.category().to_string(),
            severity: rule.severity(),
            required: rule.is_required(),
            result: result.clone(),
        };
        match rule.severity() {
            Severity::Error => errors.push(outcome),
            Severity::Warning => warnings.push(outcome),
            Severity::Info => infos.push(outcome),
        }
    }

    let can_save = errors.is_empty();
    ValidationSummary {
        is_valid: errors.is_empty() && warnings.is_empty(),
        total_rules,
        passed_rules,
        score: compute_score(total_rules, passed_rules),
        can_save,
        can_submit: can_save && unsatisfied_required.is_empty(),
        errors,
        warnings,
        infos,
        unsatisfied_required,
        categories,
    }
}
