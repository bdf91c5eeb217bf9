/// Crate-wide result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Typed store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A referenced row does not exist.
    #[error("{what} not found")]
    NotFound { what: &'static str },

    /// A unique constraint was violated (duplicate token, username, or
    /// assignment pair). The caller must resolve by changing input.
    #[error("{what} already exists")]
    Conflict { what: &'static str },

    /// A persisted value could not be decoded back into its typed form.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Underlying database failure.
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    #[must_use]
    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound { what }
    }

    #[must_use]
    pub fn conflict(what: &'static str) -> Self {
        Self::Conflict { what }
    }

    /// Collapse a unique-violation insert error into [`StoreError::Conflict`].
    pub(crate) fn from_insert(err: sqlx::Error, what: &'static str) -> Self {
        let is_unique = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if is_unique {
            Self::Conflict { what }
        } else {
            Self::Sqlx(err)
        }
    }
}
