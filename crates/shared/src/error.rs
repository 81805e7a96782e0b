use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid route {0:?}: expected <line>.<iti>")]
    InvalidRoute(String),
    #[error("message is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
