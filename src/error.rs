//! Error types for the expression-template compiler

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Malformed notation in record '{record}' at offset {offset}: {message}")]
    MalformedNotation {
        record: String,
        offset: usize,
        message: String,
    },

    #[error("Integral in record '{record}' at offset {offset} has no trailing differential")]
    UnterminatedIntegral { record: String, offset: usize },

    #[error("Recursion limit ({limit}) exceeded in record '{record}' at offset {offset}")]
    RecursionLimitExceeded {
        record: String,
        offset: usize,
        limit: usize,
    },

    #[error("Duplicate identifier after namespacing: '{identifier}'")]
    DuplicateIdentifier { identifier: String },

    #[error("Invalid namespace token '{token}': {message}")]
    InvalidNamespaceToken { token: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;

impl TemplateError {
    pub fn malformed(record: impl Into<String>, offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedNotation {
            record: record.into(),
            offset,
            message: message.into(),
        }
    }

    pub fn unterminated_integral(record: impl Into<String>, offset: usize) -> Self {
        Self::UnterminatedIntegral {
            record: record.into(),
            offset,
        }
    }

    pub fn recursion_limit(record: impl Into<String>, offset: usize, limit: usize) -> Self {
        Self::RecursionLimitExceeded {
            record: record.into(),
            offset,
            limit,
        }
    }

    pub fn duplicate_identifier(identifier: impl Into<String>) -> Self {
        Self::DuplicateIdentifier {
            identifier: identifier.into(),
        }
    }

    pub fn invalid_namespace(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidNamespaceToken {
            token: token.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_record_and_offset() {
        let err = TemplateError::malformed("plot 1", 12, "unbalanced subscript braces");
        let text = err.to_string();
        assert!(text.contains("plot 1"));
        assert!(text.contains("12"));
        assert!(text.contains("unbalanced"));
    }

    #[test]
    fn unterminated_integral_names_the_record() {
        let err = TemplateError::unterminated_integral("area under curve", 3);
        assert!(err.to_string().contains("area under curve"));
    }
}
