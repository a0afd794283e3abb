use regex::Regex;
use stampede_runner::ProbeTask;
use tracing::debug;
use url::Url;

use crate::client::ProbeClient;
use crate::error::ProbeError;

/// Fetch a URL and require `pattern` to match somewhere in the body.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: Url,
    pattern: Regex,
    client: ProbeClient,
    label: String,
}

impl HttpProbe {
    /// Validate the URL (http or https only) and compile the pattern.
    pub fn new(url: &str, pattern: &str, client: &ProbeClient) -> Result<Self, ProbeError> {
        let parsed = Url::parse(url).map_err(|e| ProbeError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProbeError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let pattern = Regex::new(pattern)?;
        let label = format!("GET {}", parsed);
        Ok(Self {
            url: parsed,
            pattern,
            client: client.clone(),
            label,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Perform the request and check the response.
    pub fn check(&self) -> Result<(), ProbeError> {
        let (status, body) = self.client.fetch(&self.url)?;
        if !(200..300).contains(&status) {
            return Err(ProbeError::Status {
                url: self.url.to_string(),
                status,
            });
        }
        if !self.pattern.is_match(&body) {
            debug!(url = %self.url, bytes = body.len(), "pattern not found");
            return Err(ProbeError::NoMatch {
                url: self.url.to_string(),
                pattern: self.pattern.as_str().to_string(),
            });
        }
        Ok(())
    }
}

impl ProbeTask for HttpProbe {
    fn name(&self) -> &str {
        &self.label
    }

    fn execute(&self) -> anyhow::Result<()> {
        Ok(self.check()?)
    }
}
