use serde::Serialize;
use std::path::PathBuf;

/// Main error type for the library
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An image could not be read or decoded
    #[error("failed to decode image {}: {source}", .path.display())]
    Decode {
        /// Path of the offending image.
        path: PathBuf,
        /// Underlying decoder error.
        #[source]
        source: image::ImageError,
    },

    /// Image encoding errors (writing rendered output)
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Unknown search method or out-of-range setting
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The feature model failed to run
    #[error("Model error: {0}")]
    Model(String),

    /// Tensor shape mismatch
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A label font could not be parsed
    #[error("Font error: {0}")]
    Font(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error report
#[derive(Serialize)]
#[derive(Debug)]
pub struct ErrorResponse {
    /// Short error kind
    pub kind: &'static str,
    /// Error message
    pub message: String,
    /// Offending path, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl AppError {
    /// Short stable name for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Decode { .. } => "decode",
            Self::Image(_) => "image",
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::Model(_) => "model",
            Self::Shape(_) => "shape",
            Self::Json(_) => "json",
            Self::Font(_) => "font",
            Self::Internal(_) => "internal",
        }
    }

    /// Convert the error to a JSON-serializable report
    pub fn to_json(&self) -> ErrorResponse {
        let path = match self {
            Self::Decode { path, .. } => Some(path.display().to_string()),
            _ => None,
        };

        ErrorResponse {
            kind: self.kind(),
            message: self.to_string(),
            path,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(feature = "embeddings")]
impl From<tch::TchError> for AppError {
    fn from(err: tch::TchError) -> Self {
        AppError::Model(format!("PyTorch error: {}", err))
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, AppError>;

/// Extension trait for working with Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add context to an error if the result is an error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| AppError::Internal(format!("{}: {}", context, e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| {
            let context = f();
            AppError::Internal(format!("{}: {}", context, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_report_names_path() {
        let err = AppError::Decode {
            path: PathBuf::from("data/missing.jpg"),
            source: image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            )),
        };

        let report = err.to_json();
        assert_eq!(report.kind, "decode");
        assert_eq!(report.path.as_deref(), Some("data/missing.jpg"));
        assert!(report.message.contains("data/missing.jpg"));
    }

    #[test]
    fn test_with_context_prefixes_message() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = res.with_context(|| "writing rows").unwrap_err();
        assert_eq!(err.to_string(), "Internal error: writing rows: boom");
    }
}
