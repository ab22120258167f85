use serde::Serialize;
use thiserror::Error;

/// Structured error type for the application. Clients match on `code` and
/// render `detail`; every variant also has a short chat-friendly message.
#[derive(Debug, Clone, Error, Serialize)]
#[cfg_attr(feature = "server", derive(ts_rs::TS))]
#[cfg_attr(feature = "server", ts(export))]
#[serde(tag = "code", content = "detail")]
pub enum AppError {
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("{message}")]
    ValidationError { message: String },
    #[error("Invariant violated: {message}")]
    InvariantViolation { message: String },
    #[error("Translation failed: {message}")]
    TranslationError { message: String },
    #[error("Chart error: {message}")]
    ChartError { message: String },
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("I/O error: {message}")]
    IoError { message: String },
    #[error("API error: {message}")]
    ApiError { message: String },
    #[error("Superseded by a newer request")]
    Superseded,
}

/// Coarse classification reported to the chat channel alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Translation,
    Validation,
    /// Missing target. The turn still completes and nothing is mutated.
    Soft,
    Invariant,
    Internal,
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound { what: what.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        AppError::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AppError::TranslationError { .. } | AppError::Superseded => Severity::Translation,
            AppError::ValidationError { .. } => Severity::Validation,
            AppError::NotFound { .. } | AppError::NothingToUndo => Severity::Soft,
            AppError::InvariantViolation { .. } => Severity::Invariant,
            AppError::ChartError { .. } | AppError::IoError { .. } | AppError::ApiError { .. } => {
                Severity::Internal
            }
        }
    }

    pub fn is_soft(&self) -> bool {
        self.severity() == Severity::Soft
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<crate::store::StoreError> for AppError {
    fn from(e: crate::store::StoreError) -> Self {
        match e {
            crate::store::StoreError::Io(io_err) => AppError::IoError {
                message: io_err.to_string(),
            },
            crate::store::StoreError::Json(json_err) => AppError::ValidationError {
                message: json_err.to_string(),
            },
            crate::store::StoreError::Unsupported(msg) => AppError::ValidationError { message: msg },
        }
    }
}

impl From<crate::translator::TranslateError> for AppError {
    fn from(e: crate::translator::TranslateError) -> Self {
        AppError::TranslationError {
            message: e.to_string(),
        }
    }
}

impl From<AppError> for String {
    fn from(e: AppError) -> String {
        e.to_string()
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::ValidationError { message: s }
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::ValidationError {
            message: s.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_code_and_detail() {
        let json = serde_json::to_value(AppError::not_found("Task 7")).unwrap();
        assert_eq!(json["code"], "NotFound");
        assert_eq!(json["detail"]["what"], "Task 7");
    }

    #[test]
    fn not_found_is_soft() {
        assert!(AppError::not_found("Link 3").is_soft());
        assert!(AppError::NothingToUndo.is_soft());
        assert!(!AppError::invalid("bad").is_soft());
        assert_eq!(AppError::invariant("cycle").severity(), Severity::Invariant);
    }

    #[test]
    fn display_is_short() {
        assert_eq!(AppError::not_found("Task 7").to_string(), "Task 7 not found");
        assert_eq!(AppError::invalid("Duration must be positive").to_string(), "Duration must be positive");
    }
}
