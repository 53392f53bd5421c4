//! Feed client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FeedError;

/// Path the server exposes its push feed on.
pub const FEED_PATH: &str = "/ws";

/// Configuration for one feed connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// WebSocket endpoint, e.g. `"wss://mempool.space/api/v1/ws"`.
    pub url: String,
    /// Fixed delay between a transport failure and the next connect attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Lower bound of the delay before a reload after a build change.
    #[serde(default = "default_reload_min_delay_ms")]
    pub reload_min_delay_ms: u64,
    /// Width of the uniform jitter window added to `reload_min_delay_ms`.
    #[serde(default = "default_reload_jitter_ms")]
    pub reload_jitter_ms: u64,
    /// Capacity of each broadcast output stream.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_retry_delay_ms() -> u64 { 10_000 }
fn default_reload_min_delay_ms() -> u64 { 1_000 }
fn default_reload_jitter_ms() -> u64 { 60_000 }
fn default_channel_capacity() -> usize { 1_024 }

impl FeedConfig {
    /// Config with default timings for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry_delay_ms: default_retry_delay_ms(),
            reload_min_delay_ms: default_reload_min_delay_ms(),
            reload_jitter_ms: default_reload_jitter_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }

    /// Derive the endpoint from the host the client was served from:
    /// `wss://` when `secure`, `ws://` otherwise, always on [`FEED_PATH`].
    pub fn for_host(host: &str, port: Option<u16>, secure: bool) -> Self {
        let scheme = if secure { "wss" } else { "ws" };
        let url = match port {
            Some(port) => format!("{scheme}://{host}:{port}{FEED_PATH}"),
            None => format!("{scheme}://{host}{FEED_PATH}"),
        };
        Self::new(url)
    }

    /// Load a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FeedError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the endpoint is a WebSocket URL.
    pub fn validate(&self) -> Result<(), FeedError> {
        let url = Url::parse(&self.url).map_err(|e| FeedError::InvalidUrl(format!("{}: {e}", self.url)))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(FeedError::InvalidUrl(format!(
                    "{}: unsupported scheme {other:?}",
                    self.url
                )))
            }
        }
        if self
            .reload_min_delay_ms
            .checked_add(self.reload_jitter_ms)
            .is_none()
        {
            return Err(FeedError::Config(
                "reload_min_delay_ms + reload_jitter_ms overflows".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(FeedError::Config("channel_capacity must be non-zero".into()));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_json() {
        let config: FeedConfig = serde_json::from_str(r#"{"url":"ws://localhost:8999/ws"}"#).unwrap();
        assert_eq!(config.retry_delay(), Duration::from_secs(10));
        assert_eq!(config.reload_min_delay_ms, 1_000);
        assert_eq!(config.reload_jitter_ms, 60_000);
        assert_eq!(config.channel_capacity, 1_024);
        config.validate().unwrap();
    }

    #[test]
    fn endpoint_from_host() {
        assert_eq!(
            FeedConfig::for_host("mempool.space", None, true).url,
            "wss://mempool.space/ws"
        );
        assert_eq!(
            FeedConfig::for_host("localhost", Some(4200), false).url,
            "ws://localhost:4200/ws"
        );
    }

    #[test]
    fn rejects_non_websocket_scheme() {
        let err = FeedConfig::new("https://mempool.space/ws").validate().unwrap_err();
        assert!(matches!(err, FeedError::InvalidUrl(_)));
        assert!(FeedConfig::new("not a url").validate().is_err());
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut config = FeedConfig::new("ws://localhost/ws");
        config.channel_capacity = 0;
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));
    }

    #[test]
    fn rejects_overflowing_reload_window() {
        let mut config = FeedConfig::new("ws://localhost/ws");
        config.reload_min_delay_ms = u64::MAX;
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));
    }
}
