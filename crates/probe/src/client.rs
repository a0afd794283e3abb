use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use stampede_core::HttpConfig;
use tracing::debug;

use crate::error::ProbeError;

/// Shared blocking HTTP client for every probe in a run.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct ProbeClient {
    client: Client,
}

impl ProbeClient {
    /// Build a client from the HTTP config: timeouts, user agent and the
    /// optional cookie header sent with every request.
    ///
    /// Must be called outside of an async runtime.
    pub fn new(config: &HttpConfig) -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.cookie {
            headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(
                config.connect_timeout_ms.saturating_add(config.read_timeout_ms),
            ))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        debug!(
            user_agent = %config.user_agent,
            cookie = config.cookie.is_some(),
            "probe client built"
        );
        Ok(Self { client })
    }

    /// GET `url` and return the status and full body text.
    pub fn fetch(&self, url: &url::Url) -> Result<(u16, String), ProbeError> {
        let response = self.client.get(url.clone()).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok((status, body))
    }
}
