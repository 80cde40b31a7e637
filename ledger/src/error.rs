use thiserror::Error;
use turf_engine::types::UserId;
use turf_engine::EngineError;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed stored JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{0} does not exist")]
    UnknownUser(UserId),

    #[error("username {0:?} is already taken")]
    DuplicateUsername(String),

    #[error("ledger lock poisoned by a panicked submission")]
    Poisoned,
}
