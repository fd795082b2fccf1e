//! Client configuration.

use crate::error::{SessionError, SessionResult};
use agentfeed_stream::DEFAULT_MAX_LINE_BYTES;
use std::time::Duration;
use url::Url;

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default path of the streaming chat endpoint.
pub const DEFAULT_STREAM_PATH: &str = "/api/chat/stream";

/// Default delay before a finished timeline collapses.
pub const DEFAULT_COLLAPSE_DELAY: Duration = Duration::from_millis(2000);

const ENV_BASE_URL: &str = "AGENTFEED_BASE_URL";
const ENV_STREAM_PATH: &str = "AGENTFEED_STREAM_PATH";
const ENV_COLLAPSE_DELAY_MS: &str = "AGENTFEED_COLLAPSE_DELAY_MS";
const ENV_MAX_LINE_BYTES: &str = "AGENTFEED_MAX_LINE_BYTES";

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay after finalization before the timeline is marked collapsed.
    pub collapse_delay: Duration,
    /// Maximum length of one unterminated response line.
    pub max_line_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            collapse_delay: DEFAULT_COLLAPSE_DELAY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl SessionConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the collapse delay.
    pub fn with_collapse_delay(mut self, delay: Duration) -> Self {
        self.collapse_delay = delay;
        self
    }

    /// Set the maximum line length.
    pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit;
        self
    }
}

/// Configuration for [`ChatClient`](crate::client::ChatClient) and the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL.
    pub base_url: String,
    /// Path of the streaming chat endpoint.
    pub stream_path: String,
    /// TCP connect timeout. Streams have no read timeout.
    pub connect_timeout: Option<Duration>,
    /// Per-session settings.
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            connect_timeout: None,
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `AGENTFEED_*` environment variables, falling back to defaults.
    pub fn from_env() -> SessionResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SessionResult<Self> {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(path) = lookup(ENV_STREAM_PATH) {
            config.stream_path = path;
        }
        if let Some(ms) = lookup(ENV_COLLAPSE_DELAY_MS) {
            let ms: u64 = parse_var(ENV_COLLAPSE_DELAY_MS, &ms)?;
            config.session.collapse_delay = Duration::from_millis(ms);
        }
        if let Some(limit) = lookup(ENV_MAX_LINE_BYTES) {
            config.session.max_line_bytes = parse_var(ENV_MAX_LINE_BYTES, &limit)?;
        }

        config.stream_url()?;
        Ok(config)
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the streaming endpoint path.
    pub fn with_stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the per-session settings.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Full URL of the streaming endpoint.
    pub fn stream_url(&self) -> SessionResult<Url> {
        let base = self.base_url.trim_end_matches('/');
        let path = self.stream_path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path)).map_err(|e| {
            SessionError::configuration(format!("invalid stream URL {base}/{path}: {e}"))
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> SessionResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| SessionError::configuration(format!("{key}={value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.session.collapse_delay, Duration::from_millis(2000));
        assert_eq!(
            config.stream_url().unwrap().as_str(),
            "http://localhost:8000/api/chat/stream"
        );
    }

    #[test]
    fn test_stream_url_joins_slashes() {
        let config = ClientConfig::new()
            .with_base_url("https://research.example.com/backend/")
            .with_stream_path("chat/stream");
        assert_eq!(
            config.stream_url().unwrap().as_str(),
            "https://research.example.com/backend/chat/stream"
        );
    }

    #[test]
    fn test_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://10.0.0.5:9000"),
            (ENV_STREAM_PATH, "/v2/stream"),
            (ENV_COLLAPSE_DELAY_MS, "500"),
            (ENV_MAX_LINE_BYTES, "4096"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.stream_path, "/v2/stream");
        assert_eq!(config.session.collapse_delay, Duration::from_millis(500));
        assert_eq!(config.session.max_line_bytes, 4096);
    }

    #[test]
    fn test_session_builders() {
        let session = SessionConfig::new()
            .with_collapse_delay(Duration::from_millis(250))
            .with_max_line_bytes(1024);
        assert_eq!(session.collapse_delay, Duration::from_millis(250));
        assert_eq!(session.max_line_bytes, 1024);

        let config = ClientConfig::new().with_session(session.clone());
        assert_eq!(config.session, session);
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_from_lookup_rejects_bad_number() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_COLLAPSE_DELAY_MS, "soon")])).unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
    }

    #[test]
    fn test_from_lookup_rejects_bad_url() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_BASE_URL, "not a url")])).unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
    }
}
