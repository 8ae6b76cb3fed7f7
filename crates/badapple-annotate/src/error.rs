use badapple_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Store error: {0}")]
    Store(#[from] DbError),

    #[error("Annotation of {entity} {id} failed: {source}")]
    Entity {
        entity: &'static str,
        id: i64,
        #[source]
        source: DbError,
    },
}

impl AnnotateError {
    pub fn is_fatal(&self) -> bool {
        match self {
            AnnotateError::Store(e) => e.is_fatal(),
            AnnotateError::Entity { source, .. } => source.is_fatal(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
