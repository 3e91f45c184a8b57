/// All errors that can be returned by a lock or callout definition store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A callout definition with this id is already stored.
    #[error("callout definition {id} already exists")]
    DuplicateDefinition { id: i64 },

    /// Stored records could not be (de)serialized.
    #[error("invalid stored record")]
    InvalidRecord(#[from] serde_json::Error),

    /// A backend-specific storage error (DB connection, poisoned lock, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
