use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unparsable numeric token: {0:?}")]
    ParseFailure(String),

    #[error("Invalid tolerance {0}: must be positive and finite")]
    InvalidTolerance(f64),

    #[error("Invalid anchor window size {0}: must be at least 1 character")]
    InvalidWindow(usize),

    #[error("Malformed document input: {0}")]
    MalformedInput(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
