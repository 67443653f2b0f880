//! Structured error types for the report engine.
//!
//! Only two things can stop a render: the inspection could not be fetched or
//! parsed, or the output could not be produced. Everything else (missing
//! fields, odd checklist values, broken signature images) degrades to a
//! visibly incomplete report instead of an error.

use thiserror::Error;

/// The unified error type returned by the public rendering API.
#[derive(Debug, Error)]
pub enum ReportError {
    /// JSON input failed to parse as an inspection record or render options.
    #[error("failed to parse input: {source}{}", hint_suffix(.hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },
    /// The upstream inspection store could not deliver the record.
    #[error("inspection unavailable: {0}")]
    Source(#[from] SourceError),
    /// Template rendering or document serialization failed.
    #[error("render error: {0}")]
    Render(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures of the read-only inspection store. Surfaced as-is, never retried.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("inspection '{0}' not found")]
    NotFound(String),
    #[error("session expired")]
    SessionExpired,
    #[error("{0}")]
    Unavailable(String),
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the inspection schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        ReportError::Parse { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_carries_hint() {
        let err: ReportError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.starts_with("failed to parse input"));
        assert!(msg.contains("Hint: Check for trailing commas"));
    }

    #[test]
    fn test_source_error_converts() {
        let err: ReportError = SourceError::SessionExpired.into();
        assert_eq!(err.to_string(), "inspection unavailable: session expired");
    }
}
