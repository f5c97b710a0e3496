//! Error types for infusion-reminder.
//!
//! [`Error`] is shared by the store, the configuration loader and the web
//! panel. The tracker and the notifier report failures as data
//! ([`crate::tracker::TrackerError`], [`crate::notify::DeliveryError`]) and
//! never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for infusion-reminder operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Store ===
    /// The variable store could not be opened.
    #[error("failed to open variable store at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A store query failed.
    #[error("variable store query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// The store schema could not be brought up to date.
    #[error("variable store migration failed: {message}")]
    DatabaseMigration {
        /// What went wrong.
        message: String,
    },

    // === Configuration ===
    /// The bootstrap configuration could not be loaded.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// The bootstrap configuration is inconsistent.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A reminder variable was rejected by its validator.
    #[error("invalid value for {name}: {message}")]
    InvalidVariable {
        /// Name of the variable.
        name: String,
        /// Why the value was rejected.
        message: String,
    },

    // === Panel ===
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not carry the panel secret key.
    #[error("missing or invalid secret key")]
    Unauthorized,

    /// A page template failed to render.
    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),

    /// The uploaded verification file could not be read.
    #[error("invalid upload: {0}")]
    Upload(String),

    // === Files ===
    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A data or upload directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An invariant of the store was broken.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for infusion-reminder operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

/// Who is to blame for a failed panel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// No or wrong secret key; send the user to the login page.
    Unauthenticated,
    /// Bad input from the user.
    Client,
    /// Anything else.
    Server,
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an invalid variable error.
    #[must_use]
    pub fn invalid_variable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidVariable {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an upload error.
    #[must_use]
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }

    /// Classify the error for an HTTP response.
    #[must_use]
    pub fn fault(&self) -> Fault {
        match self {
            Self::Unauthorized => Fault::Unauthenticated,
            Self::InvalidVariable { .. } | Self::Upload(_) => Fault::Client,
            _ => Fault::Server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault() {
        assert_eq!(Error::Unauthorized.fault(), Fault::Unauthenticated);
        assert_eq!(
            Error::invalid_variable("SEND_SMS", "bad").fault(),
            Fault::Client
        );
        assert_eq!(Error::upload("no file").fault(), Fault::Client);
        assert_eq!(Error::internal("ids exhausted").fault(), Fault::Server);
        assert_eq!(
            Error::DatabaseMigration {
                message: "x".to_string()
            }
            .fault(),
            Fault::Server
        );
    }

    #[test]
    fn test_invalid_variable_display() {
        let err = Error::invalid_variable("SEND_SMS", "expected true or false");
        assert_eq!(
            err.to_string(),
            "invalid value for SEND_SMS: expected true or false"
        );
    }

    #[test]
    fn test_store_errors_convert() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/reminder.db",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
            assert!(err.to_string().starts_with("variable store query failed"));
        }
    }

    #[test]
    fn test_directory_create_names_path() {
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/srv/reminder/uploads"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/srv/reminder/uploads"));
    }
}
