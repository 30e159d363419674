use thiserror::Error;

use crate::Row;

/// A failure reported by a [`crate::RowSource`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SourceError {
    /// The backing store or transport failed. Retried on the next pass.
    #[error("query failed: {0}")]
    Query(String),
    /// The source cannot serve this operation in its current state (e.g. fetching before rows
    /// it has already discarded). The direction is not retried until a reset.
    #[error("operation not supported: {0}")]
    Unsupported(String),
    /// Some rows were produced before the failure. Only `rows` is merged.
    #[error("{source} (after {} rows)", .rows.len())]
    Partial {
        rows: Vec<Row>,
        #[source]
        source: Box<SourceError>,
    },
}

impl SourceError {
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn is_unsupported(&self) -> bool {
        match self {
            Self::Unsupported(_) => true,
            Self::Partial { source, .. } => source.is_unsupported(),
            Self::Query(_) => false,
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
