use thiserror::Error;

/// Failures while turning free-form model text into a [`crate::RooftopAnalysis`].
///
/// All of these are recoverable: [`crate::normalize`] logs them and substitutes
/// the placeholder record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("no JSON object found in model response")]
    NoJsonFound,

    #[error("malformed JSON in model response: {0}")]
    MalformedJson(String),

    #[error("model response is missing required fields: {}", .0.join(", "))]
    IncompleteRecord(Vec<String>),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

impl NormalizeError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        NormalizeError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported image format for {0} (expected png, jpg or jpeg)")]
    UnsupportedFormat(String),

    #[error("image file is empty: {0}")]
    Empty(String),
}

pub type Result<T> = std::result::Result<T, NormalizeError>;
