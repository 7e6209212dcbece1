use thiserror::Error;

/// Error type returned by caller-supplied transformations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("operation #{index} ({kind}) failed: {source}")]
    Transform {
        index: usize,
        kind: &'static str,
        #[source]
        source: TransformError,
    },
}

impl PatchError {
    /// Index of the failing operation, if the error came from one.
    pub fn operation_index(&self) -> Option<usize> {
        match self {
            PatchError::Transform { index, .. } => Some(*index),
            PatchError::InvalidPattern { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("content is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize JSON: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("serialized JSON is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("{0}")]
    Callback(BoxError),
}
