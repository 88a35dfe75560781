use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Failures while turning a source locator into a normalized table.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    /// The provider was unreachable, timed out, or returned content that does
    /// not parse as a table.
    #[error("source unavailable ({locator}): {reason}")]
    SourceUnavailable { locator: String, reason: String },

    /// A normalized column the mapping requires is absent after renaming.
    #[error("schema mismatch ({locator}): missing column '{column}'")]
    SchemaMismatch { locator: String, column: String },
}

impl LoadError {
    pub fn unavailable(locator: &str, reason: impl ToString) -> Self {
        LoadError::SourceUnavailable {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Failures of the filter / ranking stage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("column '{0}' not found in table")]
    ColumnNotFound(String),
}

/// Failures of bivariate quantile classification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BucketError {
    #[error("column '{0}' not found in table")]
    ColumnNotFound(String),

    #[error("column '{column}' has {distinct} distinct values, {buckets} buckets requested")]
    InsufficientVariance {
        column: String,
        distinct: usize,
        buckets: usize,
    },
}

/// Umbrella error used where several stages meet.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Bucket(#[from] BucketError),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
