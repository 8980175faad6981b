#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Duplicate rule id '{0}' in rule set")]
    DuplicateRule(String),

    #[error("Rule '{rule_id}' reads collection '{collection}' which is not a declared dependency")]
    UndeclaredDependency { rule_id: String, collection: String },

    #[error("Rule fault: {0}")]
    RuleFault(String),
}
