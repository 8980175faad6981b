//! Validator core: fault-isolated rule execution.
//!
//! A validator only has to list its rules ([`RuleProvider`]); running them,
//! containing faults and aggregating the outcome is done here for every
//! specialization alike.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;

use super::rules::{ValidationResult, ValidationRule};
use super::summary::{calculate_validation_summary, ValidationSummary};
use crate::config::EngineConfig;
use crate::error::CoreError;

/// Remediation hint attached to every faulted rule.
pub const FAULT_SUGGESTION: &str = "Check your data and retry.";

/// Rule id → result, in rule-catalogue order.
pub type ValidationResults = IndexMap<String, ValidationResult>;

/// Anything that can list the rules to run against a `T`.
pub trait RuleProvider<T> {
    fn validation_rules(&self) -> Vec<ValidationRule<T>>;
}

/// Results and derived summary of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub results: ValidationResults,
    pub summary: ValidationSummary,
}

/// Run every rule of `provider` against `data` with the default
/// configuration.
pub fn run_validation<T, P>(provider: &P, data: &T) -> ValidationResults
where
    P: RuleProvider<T> + ?Sized,
{
    run_rules(&provider.validation_rules(), data, &EngineConfig::default())
}

/// Run `rules` against `data` sequentially, in order.
///
/// A rule that returns `Err` or panics yields a failing result; the
/// remaining rules still run. A repeated id is not run again: the id's
/// result becomes a [`CoreError::DuplicateRule`] fault.
pub fn run_rules<T>(
    rules: &[ValidationRule<T>],
    data: &T,
    config: &EngineConfig,
) -> ValidationResults {
    let run_started = Instant::now();
    let mut results = ValidationResults::with_capacity(rules.len());

    for rule in rules {
        if let Some(existing) = results.get_mut(rule.id()) {
            tracing::warn!(rule_id = rule.id(), "Duplicate rule id");
            *existing = fault_result(rule.name(), &CoreError::DuplicateRule(rule.id().to_string()));
            continue;
        }
        let started = Instant::now();
        let result = execute_rule(rule, data);
        let elapsed = started.elapsed();
        if elapsed > config.slow_rule_threshold {
            tracing::warn!(
                rule_id = rule.id(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow validation rule"
            );
        }
        results.insert(rule.id().to_string(), result);
    }

    tracing::debug!(
        rules = rules.len(),
        passed = results.values().filter(|r| r.passed).count(),
        elapsed_us = run_started.elapsed().as_micros() as u64,
        "Validation run complete"
    );
    results
}

/// Run and summarize in one call.
pub fn validate<T, P>(provider: &P, data: &T) -> ValidationReport
where
    P: RuleProvider<T> + ?Sized,
{
    validate_with(provider, data, &EngineConfig::default())
}

pub fn validate_with<T, P>(provider: &P, data: &T, config: &EngineConfig) -> ValidationReport
where
    P: RuleProvider<T> + ?Sized,
{
    let rules = provider.validation_rules();
    let results = run_rules(&rules, data, config);
    let summary = calculate_validation_summary(&results, &rules);
    ValidationReport { results, summary }
}

fn execute_rule<T>(rule: &ValidationRule<T>, data: &T) -> ValidationResult {
    match isolate(|| rule.validate(data)) {
        Ok(result) => result,
        Err(fault) => {
            tracing::warn!(rule_id = rule.id(), fault = %fault, "Validation rule faulted");
            fault_result(rule.name(), &fault)
        }
    }
}

/// Failing result standing in for a rule that could not be evaluated.
pub fn fault_result(rule_name: &str, fault: &CoreError) -> ValidationResult {
    ValidationResult::fail(format!("Error validating: {rule_name}"))
        .with_detail(fault.to_string())
        .with_suggestion(FAULT_SUGGESTION)
}

/// Run `f`, turning a panic into [`CoreError::RuleFault`].
pub(crate) fn isolate<R, F>(f: F) -> Result<R, CoreError>
where
    F: FnOnce() -> Result<R, CoreError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => Err(CoreError::RuleFault(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "rule panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::rules::Severity;

    struct Fixed(Vec<ValidationRule<i64>>);

    impl RuleProvider<i64> for Fixed {
        fn validation_rules(&self) -> Vec<ValidationRule<i64>> {
            self.0.clone()
        }
    }

    fn positive() -> ValidationRule<i64> {
        ValidationRule::new("positive", "Calculations", "Positive", Severity::Error, |n| {
            Ok(ValidationResult::check(*n > 0, "Positive", "Must be positive"))
        })
    }

    fn erroring() -> ValidationRule<i64> {
        ValidationRule::new("erroring", "Calculations", "Erroring", Severity::Warning, |_| {
            Err(CoreError::Validation("lookup table missing".into()))
        })
    }

    fn panicking() -> ValidationRule<i64> {
        ValidationRule::new("panicking", "Calculations", "Panicking", Severity::Info, |_| {
            panic!("index out of bounds")
        })
    }

    #[test]
    fn results_follow_rule_order() {
        let provider = Fixed(vec![erroring(), positive(), panicking()]);
        let results = run_validation(&provider, &3);
        let ids: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(ids, ["erroring", "positive", "panicking"]);
    }

    #[test]
    fn err_becomes_failing_result() {
        let results = run_validation(&Fixed(vec![erroring()]), &3);
        let r = &results["erroring"];
        assert!(!r.passed);
        assert_eq!(r.message, "Error validating: Erroring");
        assert!(r.details[0].contains("lookup table missing"));
        assert_eq!(r.suggestion.as_deref(), Some(FAULT_SUGGESTION));
    }

    #[test]
    fn panic_is_contained() {
        let results = run_validation(&Fixed(vec![panicking(), positive()]), &3);
        assert_eq!(results.len(), 2);
        assert!(!results["panicking"].passed);
        assert!(results["panicking"].details[0].contains("index out of bounds"));
        assert!(results["positive"].passed);
    }

    #[test]
    fn duplicate_id_faults_instead_of_double_counting() {
        let negative = ValidationRule::new("positive", "Calculations", "Negative", Severity::Error, |n| {
            Ok(ValidationResult::check(*n < 0, "Negative", "Must be negative"))
        });
        let report = validate(&Fixed(vec![positive(), erroring(), negative]), &3);

        assert_eq!(report.results.len(), 2);
        let r = &report.results["positive"];
        assert!(!r.passed);
        assert_eq!(r.message, "Error validating: Negative");
        assert!(r.details[0].contains("Duplicate rule id 'positive'"));

        assert_eq!(report.summary.total_rules, 2);
        assert_eq!(report.summary.passed_rules, 0);
        assert_eq!(report.summary.errors.len(), 1);
        assert_eq!(report.summary.warnings.len(), 1);
    }

    #[test]
    fn validate_pairs_results_with_summary() {
        let report = validate(&Fixed(vec![positive(), erroring()]), &-4);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.summary.total_rules, 2);
        assert_eq!(report.summary.passed_rules, 0);
        assert!(!report.summary.can_save);
    }
}
