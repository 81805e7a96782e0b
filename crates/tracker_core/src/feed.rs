use async_trait::async_trait;
use futures::{future, stream::BoxStream, StreamExt};
use reqwest::Client;
use shared::{
    error::DecodeError,
    protocol::{LinesResponse, PresentResponse},
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;

use crate::error::FeedError;

/// Live messages as text, in delivery order. Ends when the producer closes
/// the channel. [`FeedError::Malformed`] items stand for a single unreadable
/// frame; any other error means the channel is gone.
pub type EventStream = BoxStream<'static, Result<String, FeedError>>;

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_lines(&self) -> Result<LinesResponse, FeedError>;
    async fn fetch_present(&self) -> Result<PresentResponse, FeedError>;
    async fn open_events(&self) -> Result<EventStream, FeedError>;
}

/// Endpoint paths, relative to the server url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPaths {
    pub lines: String,
    pub present: String,
    pub socket: String,
}

impl Default for FeedPaths {
    fn default() -> Self {
        Self {
            lines: "lines/".into(),
            present: "present/".into(),
            socket: "socket/".into(),
        }
    }
}

pub struct HttpFeed {
    http: Client,
    base: Url,
    paths: FeedPaths,
}

impl HttpFeed {
    pub fn new(server_url: &str, paths: FeedPaths) -> Result<Self, FeedError> {
        let mut base = Url::parse(server_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(FeedError::UnsupportedScheme(server_url.to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base,
            paths,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FeedError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    pub fn socket_url(&self) -> Result<String, FeedError> {
        let http_url = self.endpoint(&self.paths.socket)?.to_string();
        if http_url.starts_with("https://") {
            Ok(http_url.replacen("https://", "wss://", 1))
        } else if http_url.starts_with("http://") {
            Ok(http_url.replacen("http://", "ws://", 1))
        } else {
            Err(FeedError::UnsupportedScheme(http_url))
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch_lines(&self) -> Result<LinesResponse, FeedError> {
        let res = self
            .http
            .get(self.endpoint(&self.paths.lines)?)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    async fn fetch_present(&self) -> Result<PresentResponse, FeedError> {
        let res = self
            .http
            .get(self.endpoint(&self.paths.present)?)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    async fn open_events(&self) -> Result<EventStream, FeedError> {
        let ws_url = self.socket_url()?;
        let (ws_stream, _) = connect_async(ws_url.as_str()).await?;
        debug!(%ws_url, "stream: channel open");

        let messages = ws_stream
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Binary(bytes)) => Some(
                        String::from_utf8(bytes)
                            .map_err(|err| FeedError::Malformed(DecodeError::from(err))),
                    ),
                    Ok(_) => None,
                    Err(err) => Some(Err(FeedError::from(err))),
                })
            });
        Ok(messages.boxed())
    }
}
