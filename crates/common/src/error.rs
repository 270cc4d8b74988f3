use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Price feed error: {0}")]
    Feed(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Holdings store error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
