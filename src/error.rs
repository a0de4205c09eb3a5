use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Failure kinds surfaced by the analytics store, the rollup and the lookups.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A natural-key or otherwise required field was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid encoded date: {0}")]
    InvalidDate(u32),

    #[error("unknown action kind: {0}")]
    UnknownActionKind(u16),

    #[error("unknown action name: {0}")]
    UnknownActionName(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("storage connection lock poisoned")]
    LockPoisoned,
}

impl AnalyticsError {
    /// Uppercase status token used in response envelopes.
    pub fn status_code(&self) -> String {
        match self {
            Self::MissingField(field) => format!("MISSING_{}", field.to_uppercase()),
            Self::InvalidDate(_) => "INVALID_DATE_AS_INTEGER".to_string(),
            Self::UnknownActionKind(_) => "UNKNOWN_ACTION_CONSTANT".to_string(),
            Self::UnknownActionName(_) => "UNKNOWN_ACTION_NAME".to_string(),
            Self::Storage(_) => "STORAGE_ERROR".to_string(),
            Self::Lookup(_) => "LOOKUP_ERROR".to_string(),
            Self::LockPoisoned => "STORAGE_LOCK_POISONED".to_string(),
        }
    }

    /// Status token followed by the error detail, as written into `status`.
    pub fn status(&self) -> String {
        format!("{}: {self}", self.status_code())
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::InvalidDate(_)
                | Self::UnknownActionKind(_)
                | Self::UnknownActionName(_)
        )
    }
}
