//! Error types for the Oryoki core library.

use thiserror::Error;

/// All errors that can occur within the Oryoki core library.
#[derive(Debug, Error)]
pub enum OryokiError {
    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An entry ID was requested that does not exist in the database.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// A user ID or username was requested that does not exist.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// An improvement suggestion was requested that does not exist.
    #[error("Improvement not found: {0}")]
    ImprovementNotFound(String),

    /// An image ID was requested that does not exist.
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// Input was rejected before anything was written.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A payload of one entry type was supplied for an entry of another type.
    #[error("Entry type mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },

    /// The opened file is not a valid Oryoki knowledge base.
    #[error("Invalid knowledge base: {0}")]
    InvalidKnowledgeBase(String),

    /// The user exists but has been deactivated.
    #[error("User is inactive: {0}")]
    InactiveUser(String),

    /// The image object store rejected a read, write or removal.
    #[error("Image store error: {0}")]
    ImageStore(String),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data could not be serialised to or from JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`OryokiError`].
pub type Result<T> = std::result::Result<T, OryokiError>;

impl OryokiError {
    /// Returns a short, human-readable message suitable for a notification toast.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(e) => format!("Database operation failed: {e}"),
            Self::EntryNotFound(_) => "Entry no longer exists".to_string(),
            Self::UserNotFound(_) => "User information not available".to_string(),
            Self::ImprovementNotFound(_) => "Improvement no longer exists".to_string(),
            Self::ImageNotFound(_) => "Image no longer exists".to_string(),
            Self::ValidationFailed(msg) => msg.clone(),
            Self::KindMismatch { .. } => "Entry type cannot be changed".to_string(),
            Self::InvalidKnowledgeBase(_) => "Could not open knowledge base".to_string(),
            Self::InactiveUser(name) => format!("User {name} is deactivated"),
            Self::ImageStore(e) => format!("Image error: {e}"),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }
}
