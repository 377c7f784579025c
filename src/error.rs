use std::path::PathBuf;
use thiserror::Error;

/// Outcome of validating a search geometry that is not a usable polygon.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// No geometry was sent. Callers treat this as "clear results".
    #[error("no geometry provided")]
    Missing,

    #[error("invalid geometry: {0}")]
    Malformed(String),
}

/// The flat source could not be read at all. Individual bad rows never end up here.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset: {0}")]
    Csv(#[from] csv::Error),

    #[error("geo column '{0}' not found in header")]
    MissingGeoColumn(String),

    #[error("dataset loader task failed: {0}")]
    Join(String),
}

/// Failure talking to the indexed spatial store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode query geometry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    MalformedGeometry(GeometryError),

    #[error("unknown filter preset: {0}")]
    UnknownFilter(String),

    #[error("backend query failed: {0}")]
    BackendQueryFailed(#[from] StoreError),

    #[error("dataset load failed: {0}")]
    DatasetLoadFailed(#[from] DatasetError),

    #[error("search task failed: {0}")]
    TaskFailed(String),
}

impl SearchError {
    /// Client-input faults carry a message meant for the caller.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::MalformedGeometry(_) | Self::UnknownFilter(_))
    }
}
