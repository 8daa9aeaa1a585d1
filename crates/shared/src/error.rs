use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope carries no kind")]
    MissingKind,
    #[error("unknown envelope kind '{0}'")]
    UnknownKind(String),
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: String,
        source: serde_json::Error,
    },
    #[error("failed to encode {kind} envelope: {source}")]
    Encode {
        kind: &'static str,
        source: serde_json::Error,
    },
    #[error("invalid envelope json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row} has {actual} cells but the dataset declares {expected} columns")]
pub struct RaggedRowError {
    pub row: usize,
    pub expected: usize,
    pub actual: usize,
}
