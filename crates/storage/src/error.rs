/// All errors a record source or the pager can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Page size of zero, or above what the backend will return per query.
    #[error("page size must be between 1 and {max}, got {requested}")]
    InvalidPageSize { requested: usize, max: usize },

    /// The dataset file could not be read.
    #[error("cannot read dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The dataset is not `{"entities": [...], "interactions": [...]}`.
    #[error("malformed dataset: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A backend-specific failure (connection, query, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}
