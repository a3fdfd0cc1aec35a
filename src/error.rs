use std::path::PathBuf;
use std::time::Duration;

use crate::models::ItemId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("item id is blank")]
pub struct BlankItemId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("score {0} is outside the 0..=3 scale")]
    OutOfRange(i64),

    #[error("score '{0}' is not a whole number")]
    NotANumber(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("catalog has no items")]
    Empty,

    #[error("catalog row {row}: {field} is blank")]
    BlankField { row: usize, field: &'static str },

    #[error("catalog lists item {0} more than once")]
    DuplicateId(ItemId),
}

/// Never fatal; callers degrade to empty benchmarks.
#[derive(Debug, thiserror::Error)]
pub enum BenchmarkUnavailable {
    #[error("benchmark file {0} not found")]
    Missing(PathBuf),

    #[error("benchmark file {path} is unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("benchmark file {path} lacks required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("reasoning service credential is not configured")]
    CredentialMissing,

    #[error("reasoning service request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("reasoning service timed out after {0:?}")]
    Timeout(Duration),

    #[error("reasoning service rejected the credential")]
    AuthFailed,

    #[error("reasoning service rate limited the request")]
    RateLimited,

    #[error("reasoning service returned an invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("reasoning service unavailable after {attempts} attempt(s): {last}")]
    Unavailable { attempts: u32, last: Box<AdvisoryError> },
}

impl AdvisoryError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed { .. } | Self::Timeout(_) | Self::RateLimited
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("document has no content to render")]
    EmptyProfile,

    #[error("failed to write document: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown questionnaire item {0}")]
    UnknownItem(ItemId),

    #[error("no diagnostic has been generated yet")]
    NotGenerated,

    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
