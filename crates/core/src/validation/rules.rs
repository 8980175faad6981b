//! Validation rule and result types.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

pub const SEVERITY_ERROR: &str = "error";
pub const SEVERITY_WARNING: &str = "warning";
pub const SEVERITY_INFO: &str = "info";

/// All valid severity strings.
pub const VALID_SEVERITIES: &[&str] = &[SEVERITY_ERROR, SEVERITY_WARNING, SEVERITY_INFO];

/// How strongly a failing rule gates the caller.
///
/// `Error` blocks save, `Warning` blocks submit-readiness only, `Info` is
/// advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Convert from the wire string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            SEVERITY_ERROR => Ok(Self::Error),
            SEVERITY_WARNING => Ok(Self::Warning),
            SEVERITY_INFO => Ok(Self::Info),
            _ => Err(CoreError::Validation(format!(
                "Invalid severity '{s}'. Must be one of: {}",
                VALID_SEVERITIES.join(", ")
            ))),
        }
    }

    /// Stable string representation matching serde's `rename_all = "lowercase"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => SEVERITY_ERROR,
            Self::Warning => SEVERITY_WARNING,
            Self::Info => SEVERITY_INFO,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Suggested correction a caller may choose to apply. The engine never
/// applies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoFix {
    pub field: String,
    pub value: serde_json::Value,
    pub description: String,
}

/// Outcome of running one rule against one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_fix: Option<AutoFix>,
}

impl ValidationResult {
    pub fn pass(message: impl Into<String>) -> Self {
        Self::new(true, message)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(false, message)
    }

    /// Pick the pass or fail message depending on `passed`.
    pub fn check(passed: bool, pass_message: &str, fail_message: &str) -> Self {
        if passed {
            Self::pass(pass_message)
        } else {
            Self::fail(fail_message)
        }
    }

    fn new(passed: bool, message: impl Into<String>) -> Self {
        Self {
            passed,
            message: message.into(),
            details: Vec::new(),
            suggestion: None,
            auto_fix: None,
        }
    }

    pub fn with_details<I, S>(mut self, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details.extend(details.into_iter().map(Into::into));
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Attach a remediation hint. Ignored on passing results.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        if !self.passed {
            self.suggestion = Some(suggestion.into());
        }
        self
    }

    pub fn with_auto_fix(mut self, fix: AutoFix) -> Self {
        self.auto_fix = Some(fix);
        self
    }
}

/// What a rule's validator function returns. `Err` is a rule fault, not a
/// validation failure.
pub type RuleOutput = Result<ValidationResult, CoreError>;

type ValidatorFn<T> = Arc<dyn Fn(&T) -> RuleOutput + Send + Sync>;

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A single validation rule over inputs of type `T`.
///
/// Rules are immutable once built; cloning shares the validator function.
pub struct ValidationRule<T> {
    id: String,
    category: String,
    name: String,
    description: String,
    severity: Severity,
    required: bool,
    validator: ValidatorFn<T>,
}

impl<T> ValidationRule<T> {
    pub fn new<F>(
        id: impl Into<String>,
        category: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
        validator: F,
    ) -> Self
    where
        F: Fn(&T) -> RuleOutput + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            category: category.into(),
            name: name.into(),
            description: String::new(),
            severity,
            required: false,
            validator: Arc::new(validator),
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

    /// Error-severity rules are always required.
    pub fn is_required(&self) -> bool {
        self.required || self.severity == Severity::Error
    }

    /// Invoke the validator function directly, without fault isolation.
    pub fn validate(&self, data: &T) -> RuleOutput {
        (self.validator)(data)
    }
}

impl<T> Clone for ValidationRule<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            category: self.category.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            severity: self.severity,
            required: self.required,
            validator: Arc::clone(&self.validator),
        }
    }
}

impl<T> fmt::Debug for ValidationRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Reject rule sets in which an id appears more than once.
pub fn ensure_unique_ids<'a, I>(ids: I) -> Result<(), CoreError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CoreError::DuplicateRule(id.to_string()));
        }
    }
    Ok(())
}
