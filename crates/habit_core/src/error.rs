use thiserror::Error;

/// Failures surfaced by [`HabitStore`](crate::store::HabitStore) mutations.
/// All of them are recoverable; callers decide whether to retry or report.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no habit with id `{0}`")]
    NotFound(String),

    #[error("habit name must not be empty")]
    EmptyName,

    #[error("failed to persist habits: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
