use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error(
        "not enough quantity of item {item_id} at site {site_id}: {available} available, {requested} requested"
    )]
    InsufficientStock {
        site_id: i64,
        item_id: i64,
        available: i64,
        requested: i64,
    },

    #[error("bad request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, Error>;
