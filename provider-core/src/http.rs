//! Blocking HTTP plumbing shared by the adapters.

use crate::error::ProviderError;
use reqwest::blocking::{Client, Response};
use serde_json::Value;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One lazily-built client per provider instance. `dispose` drops it; the
/// next call builds a fresh one.
pub struct HttpClient {
    client: Mutex<Option<Client>>,
    timeout: Duration,
    verify_tls: bool,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, true)
    }
}

impl HttpClient {
    pub fn new(timeout: Duration, verify_tls: bool) -> Self {
        Self {
            client: Mutex::new(None),
            timeout,
            verify_tls,
        }
    }

    pub fn client(&self) -> Result<Client, ProviderError> {
        let mut slot = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(!self.verify_tls)
            .build()?;
        *slot = Some(client.clone());
        Ok(client)
    }

    pub fn dispose(&self) {
        let mut slot = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        slot.take();
    }

    pub fn is_connected(&self) -> bool {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Passes 2xx responses through and turns anything else into
/// [`ProviderError::Http`] carrying the response body.
pub fn check_response(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ProviderError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Checks the status and parses the body as JSON. An empty body is `null`.
pub fn json_response(response: Response) -> Result<Value, ProviderError> {
    let body = check_response(response)?.text()?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::Remote(format!("response is not valid JSON: {e}")))
}

/// Resolves a bare host to a base URL by trying HTTPS first and falling back
/// to plain HTTP. The first successful resolution is cached for the lifetime
/// of the owning provider.
pub struct SchemeProbe {
    host: String,
    resolved: OnceLock<String>,
}

impl SchemeProbe {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim().trim_end_matches('/').to_string(),
            resolved: OnceLock::new(),
        }
    }

    pub fn resolved(&self) -> Option<&str> {
        self.resolved.get().map(String::as_str)
    }

    pub fn base_url(&self, client: &Client) -> Result<&str, ProviderError> {
        if let Some(url) = self.resolved.get() {
            return Ok(url.as_str());
        }
        let url = self.probe(client)?;
        Ok(self.resolved.get_or_init(|| url).as_str())
    }

    fn probe(&self, client: &Client) -> Result<String, ProviderError> {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            return Ok(self.host.clone());
        }

        let https = format!("https://{}", self.host);
        match client.get(&https).timeout(PROBE_TIMEOUT).send() {
            Ok(_) => {
                tracing::debug!(host = %self.host, "resolved host over https");
                return Ok(https);
            }
            Err(err) => {
                tracing::debug!(host = %self.host, error = %err, "https probe failed, trying http");
            }
        }

        let http = format!("http://{}", self.host);
        client.get(&http).timeout(PROBE_TIMEOUT).send()?;
        tracing::info!(host = %self.host, "host only reachable over plain http");
        Ok(http)
    }
}
