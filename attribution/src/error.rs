use thiserror::Error;

/// Fatal configuration problems. Raised during validation, before any
/// expression is generated, so a bad config can never produce partial
/// output.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate column `{column}` found in {category} - please rename")]
    DuplicateColumn { column: String, category: String },

    #[error("invalid column name `{column}` found in {category} - please rename")]
    InvalidColumnName { column: String, category: String },

    #[error("click id `{click_id}` has an empty precedence list")]
    EmptyPrecedence { click_id: String },

    #[error("invalid custom rule `{label}`: {reason}")]
    InvalidRule { label: String, reason: String },

    #[error("failed to parse configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}
