//! Validation session: keeps one validator and its current input in sync.
//!
//! Work happens only when asked for: a new input (by reference), an
//! explicit [`ValidationSession::revalidate`], or a provider update such as
//! toggling a business rule. Summary listeners fire only when the derived
//! summary actually changes.

use std::fmt;
use std::sync::Arc;

use super::engine::{run_rules, RuleProvider, ValidationReport, ValidationResults};
use super::rules::ValidationRule;
use super::summary::{calculate_validation_summary, ValidationSummary};
use crate::config::EngineConfig;

pub type SummaryListener = Box<dyn FnMut(&ValidationSummary) + Send>;

pub struct ValidationSession<T, P> {
    provider: P,
    config: EngineConfig,
    /// Memoized `provider.validation_rules()`; refreshed on provider update.
    rules: Vec<ValidationRule<T>>,
    input: Option<Arc<T>>,
    report: Option<ValidationReport>,
    listeners: Vec<SummaryListener>,
    runs: usize,
}

impl<T, P> ValidationSession<T, P>
where
    P: RuleProvider<T>,
{
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, EngineConfig::default())
    }

    pub fn with_config(provider: P, config: EngineConfig) -> Self {
        let rules = provider.validation_rules();
        Self {
            provider,
            config,
            rules,
            input: None,
            report: None,
            listeners: Vec::new(),
            runs: 0,
        }
    }

    /// Register a listener called with the new summary whenever it changes.
    pub fn on_summary_change<F>(&mut self, listener: F)
    where
        F: FnMut(&ValidationSummary) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Replace the input. Validation re-runs only when `input` is a
    /// different allocation from the current one; returns whether it ran.
    pub fn set_input(&mut self, input: Arc<T>) -> bool {
        if self
            .input
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &input))
        {
            return false;
        }
        self.input = Some(input);
        self.run();
        true
    }

    /// Re-run against the current input. No-op without an input.
    pub fn revalidate(&mut self) -> Option<&ValidationSummary> {
        self.run();
        self.summary()
    }

    /// Derive a new provider from the current one, refresh the memoized
    /// rules and re-run.
    pub fn update_provider<F>(&mut self, update: F)
    where
        F: FnOnce(&P) -> P,
    {
        self.provider = update(&self.provider);
        self.rules = self.provider.validation_rules();
        self.run();
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn rules(&self) -> &[ValidationRule<T>] {
        &self.rules
    }

    pub fn input(&self) -> Option<&Arc<T>> {
        self.input.as_ref()
    }

    pub fn report(&self) -> Option<&ValidationReport> {
        self.report.as_ref()
    }

    pub fn results(&self) -> Option<&ValidationResults> {
        self.report.as_ref().map(|r| &r.results)
    }

    pub fn summary(&self) -> Option<&ValidationSummary> {
        self.report.as_ref().map(|r| &r.summary)
    }

    /// Number of validation runs performed so far.
    pub fn runs(&self) -> usize {
        self.runs
    }

    fn run(&mut self) {
        let Some(input) = self.input.as_deref() else {
            return;
        };
        let results = run_rules(&self.rules, input, &self.config);
        let summary = calculate_validation_summary(&results, &self.rules);
        self.runs += 1;

        let changed = self
            .report
            .as_ref()
            .map_or(true, |previous| previous.summary != summary);
        let report = self.report.insert(ValidationReport { results, summary });
        if changed {
            tracing::debug!(
                score = report.summary.score,
                can_save = report.summary.can_save,
                "Validation summary changed"
            );
            for listener in &mut self.listeners {
                listener(&report.summary);
            }
        }
    }
}

impl<T, P: fmt::Debug> fmt::Debug for ValidationSession<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationSession")
            .field("provider", &self.provider)
            .field("rules", &self.rules.len())
            .field("has_input", &self.input.is_some())
            .field("listeners", &self.listeners.len())
            .field("runs", &self.runs)
            .finish()
    }
}
