use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {field}: {reason}")]
    Config {
        field: &'static str,
        reason: String,
    },

    #[error("connect error: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dispatch pipeline closed")]
    Closed,
}

impl Error {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
