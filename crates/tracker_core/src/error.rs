use shared::{
    domain::{LineId, Route},
    error::DecodeError,
};
use thiserror::Error;

use crate::registry::{EntityKey, NotFound};

/// Per-event failures. None of these tear down the stream.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("unknown line {0}")]
    UnknownLine(LineId),
    #[error("no entity tracked under {0}")]
    NotFound(EntityKey),
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] DecodeError),
    #[error("no position known for {0}")]
    MissingPosition(EntityKey),
    #[error("event on route {0} names no stop on either side")]
    NoStops(Route),
}

impl From<NotFound> for TrackerError {
    fn from(value: NotFound) -> Self {
        Self::NotFound(value.0)
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid feed url: {0}")]
    Url(#[from] url::ParseError),
    #[error("feed url must start with http:// or https://: {0}")]
    UnsupportedScheme(String),
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("event channel failed: {0}")]
    Channel(#[from] tokio_tungstenite::tungstenite::Error),
    /// A single frame could not be read as a message. The channel stays up.
    #[error("undecodable frame: {0}")]
    Malformed(#[from] DecodeError),
}
