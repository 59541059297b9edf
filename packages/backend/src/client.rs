use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::encoding::request_url;
use crate::error::{BackendError, Result};
use crate::{SynthesisBackend, SynthesizedAudio};

const USER_AGENT: &str = concat!("voiceover/", env!("CARGO_PKG_VERSION"));

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Whole-request timeout, including reading the body.
    pub timeout: Duration,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Synthesis server reached over blocking HTTP GET.
///
/// Each instance owns its own connection pool, so independent pipelines never
/// share a connection.
#[derive(Debug, Clone)]
pub struct HttpSynthesisBackend {
    inner: Client,
    server: String,
}

impl HttpSynthesisBackend {
    pub fn new(server: impl Into<String>) -> Result<Self> {
        Self::new_with_config(server, BackendConfig::default())
    }

    pub fn new_with_config(server: impl Into<String>, config: BackendConfig) -> Result<Self> {
        let server = server.into();
        reqwest::Url::parse(&server).map_err(|e| BackendError::InvalidBaseUrl {
            url: server.clone(),
            reason: e.to_string(),
        })?;

        let inner = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self { inner, server })
    }

    /// Base URL the text is appended to.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Full request URL for `text`.
    pub fn url_for(&self, text: &str) -> Result<reqwest::Url> {
        let url = request_url(&self.server, text);
        reqwest::Url::parse(&url).map_err(|e| BackendError::InvalidBaseUrl {
            url,
            reason: e.to_string(),
        })
    }
}

impl SynthesisBackend for HttpSynthesisBackend {
    fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let url = self.url_for(text)?;
        debug!(%url, "requesting synthesis");

        let response = self.inner.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status,
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes()?.to_vec();
        if bytes.is_empty() {
            return Err(BackendError::EmptyBody {
                url: url.to_string(),
            });
        }

        debug!(bytes = bytes.len(), ?content_type, "synthesis response received");
        Ok(SynthesizedAudio::new(bytes, content_type))
    }
}
