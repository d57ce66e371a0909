//! Error types for the recommendation engine.
//!
//! Per-table problems are [`ValidationError`]s and never abort a run; the
//! aggregator records them next to the successful recommendations. Whole-run
//! problems (unusable policy, unreadable statistics source) surface as
//! [`EngineError`].

use std::path::PathBuf;
use thiserror::Error;

/// A statistics record that is internally inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("table '{table_id}': row_count is negative ({row_count})")]
    NegativeRowCount { table_id: String, row_count: i64 },

    #[error("table '{table_id}': {field} is negative ({value})")]
    NegativeTableField {
        table_id: String,
        field: &'static str,
        value: i64,
    },

    #[error("table '{table_id}': column '{column}' has a negative {field} ({value})")]
    NegativeColumnCount {
        table_id: String,
        column: String,
        field: &'static str,
        value: i64,
    },

    #[error("table '{table_id}': column '{column}' has null_count {null_count} > row_count {row_count}")]
    NullCountExceedsRows {
        table_id: String,
        column: String,
        null_count: i64,
        row_count: i64,
    },

    #[error("table '{table_id}': column '{column}' has distinct_count {distinct_count} > row_count {row_count}")]
    DistinctCountExceedsRows {
        table_id: String,
        column: String,
        distinct_count: i64,
        row_count: i64,
    },

    #[error("table '{table_id}': no columns")]
    NoColumns { table_id: String },

    #[error("table '{table_id}': column '{column}' declared more than once")]
    DuplicateColumn { table_id: String, column: String },

    #[error("table '{table_id}': {row_count} rows but average_row_bytes is 0")]
    MissingRowWidth { table_id: String, row_count: i64 },

    #[error("table '{table_id}': appears more than once in the snapshot")]
    DuplicateTable { table_id: String },

    #[error("table '{table_id}': division by zero while computing {what}")]
    DivisionByZero { table_id: String, what: &'static str },
}

impl ValidationError {
    /// Identifier of the table the error belongs to.
    pub fn table_id(&self) -> &str {
        match self {
            ValidationError::NegativeRowCount { table_id, .. }
            | ValidationError::NegativeTableField { table_id, .. }
            | ValidationError::NegativeColumnCount { table_id, .. }
            | ValidationError::NullCountExceedsRows { table_id, .. }
            | ValidationError::DistinctCountExceedsRows { table_id, .. }
            | ValidationError::NoColumns { table_id }
            | ValidationError::DuplicateColumn { table_id, .. }
            | ValidationError::MissingRowWidth { table_id, .. }
            | ValidationError::DuplicateTable { table_id }
            | ValidationError::DivisionByZero { table_id, .. } => table_id,
        }
    }
}

/// Errors raised while loading or checking a [`crate::ThresholdPolicy`].
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse policy: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize policy: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid policy: {0}")]
    Invalid(String),
}

/// Errors raised by a [`crate::StatsProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Failed to read statistics from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed statistics snapshot from {origin}: {source}")]
    Malformed {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that fail a whole recommendation run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
