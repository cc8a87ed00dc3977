use thiserror::Error;

#[derive(Debug, Error)]
pub enum SketchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid diagram: {0}")]
    InvalidDiagram(String),

    #[error("Diagram {0} not found")]
    NotFound(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SketchError>;
