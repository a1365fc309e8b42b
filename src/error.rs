use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
///
/// A remote path that does not exist is not an error: store reads return
/// `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum AppError {
    /// The store rejected the bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Network or server failure talking to the store.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A conditional write lost against a newer remote revision.
    #[error("Conflict on {0}")]
    Conflict(String),

    /// Path without a leading slash, or otherwise unusable.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// No node for this path is materialized in the tree.
    #[error("No such node: {0}")]
    NodeNotFound(String),

    /// A directory document that is not a JSON object.
    #[error("Malformed listing for {0}")]
    MalformedListing(String),

    /// I/O errors from the local store or log file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Missing or contradictory configuration.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
        assert!(app_err.to_string().contains("file not found"));
    }

    #[test]
    fn json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let app_err: AppError = json_err.into();
        assert!(matches!(app_err, AppError::Json(_)));
    }

    #[test]
    fn unauthorized_error_display() {
        let err = AppError::Unauthorized("GET /docs/".into());
        assert_eq!(err.to_string(), "Unauthorized: GET /docs/");
    }

    #[test]
    fn invalid_path_error_display() {
        let err = AppError::InvalidPath("docs/".into());
        assert_eq!(err.to_string(), "Invalid path: docs/");
    }

    #[test]
    fn conflict_error_display() {
        let err = AppError::Conflict("/.open-trees".into());
        assert_eq!(err.to_string(), "Conflict on /.open-trees");
    }
}
