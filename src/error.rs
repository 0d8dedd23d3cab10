//! Error types for card composition and rendering

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for card operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while composing or rendering cards
#[derive(Error, Debug)]
pub enum Error {
    /// A template or partial file could not be read
    #[error("Failed to read template {}: {source}", .path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem work on the cache, output or scratch paths failed
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to launch the browser session
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load the card page
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// Failed to capture the card image
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The page never reached network idle
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an `io::Error` with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_error_names_the_path() {
        let err = Error::Template {
            path: PathBuf::from("partials/social-card.html"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let msg = err.to_string();
        assert!(msg.contains("partials/social-card.html"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn timeout_reports_millis() {
        assert_eq!(Error::Timeout(250).to_string(), "Operation timed out after 250ms");
    }
}
