use thiserror::Error;

#[derive(Debug, Error)]
pub enum BadappleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid assay id on line {line}: {value:?}")]
    InvalidAssayId { line: usize, value: String },
}

pub type Result<T> = std::result::Result<T, BadappleError>;
