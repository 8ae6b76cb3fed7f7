use badapple_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Median baselines not found; compute medians before scoring")]
    MissingMedians,

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, ScoreError>;
