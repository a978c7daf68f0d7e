use thiserror::Error;

/// Errors raised while turning a corpus into an index.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("corpus is empty, no vocabulary can be fit")]
    EmptyCorpus,

    #[error("record {index} is malformed: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("corpus is not a JSON array of records: {0}")]
    MalformedCorpus(String),
}

impl BuildError {
    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord { index, reason: reason.into() }
    }
}

/// Errors raised by the query path.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("search index not available: {0}")]
    IndexUnavailable(String),

    #[error("query must not be empty")]
    InvalidQuery,
}
