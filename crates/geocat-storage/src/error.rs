//! Storage error types for the catalog storage abstraction layer.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested row was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity that was not found.
        entity: String,
        /// The ID that was looked up.
        id: i64,
    },

    /// A unique value is already taken by another row.
    #[error("{entity} with value '{value}' already exists")]
    AlreadyExists {
        /// The kind of entity.
        entity: String,
        /// The conflicting unique value.
        value: String,
    },

    /// A row cannot be deleted while other rows reference it.
    #[error("{entity} {id} is referenced by {references} point(s)")]
    InUse {
        /// The kind of entity.
        entity: String,
        /// The ID of the referenced row.
        id: i64,
        /// How many rows reference it.
        references: i64,
    },

    /// The input data is invalid (e.g. a referenced foreign key is missing).
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of why the input is invalid.
        message: String,
    },

    /// Failed to connect to the storage backend.
    #[error("connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(entity: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id,
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(entity: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            value: value.into(),
        }
    }

    /// Creates a new `InUse` error.
    #[must_use]
    pub fn in_use(entity: impl Into<String>, id: i64, references: i64) -> Self {
        Self::InUse {
            entity: entity.into(),
            id,
            references,
        }
    }

    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this error reports a client-side problem
    /// (missing row, conflict, bad input) rather than an infrastructure
    /// failure.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::InUse { .. }
                | Self::InvalidInput { .. }
        )
    }
}
