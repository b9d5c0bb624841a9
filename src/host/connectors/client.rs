// SPDX-License-Identifier: MIT

//! HTTP client for the connector relay

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

use crate::engine::error::{FlowError, UpstreamError};

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8000";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body the relay sends with non-success statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    base_url: Url,
}

impl RelayClient {
    pub fn new(base_url: Url) -> Result<Self, FlowError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        log::info!("Connector relay: {}", base_url);
        Ok(Self { client, base_url })
    }

    /// Relay from `FLOWLINE_RELAY_URL`, or the local default
    pub fn from_env() -> Result<Self, FlowError> {
        let raw = env::var("FLOWLINE_RELAY_URL").unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string());
        Self::new(parse_relay_url(&raw)?)
    }

    /// POST `body` as JSON to `{relay}/{path}` and decode the JSON answer
    pub(crate) async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, UpstreamError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| UpstreamError::transport(format!("invalid relay path '{}': {}", path, e)))?;

        log::debug!("POST {}", url);
        let resp = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::http(status.as_u16(), error_message(&text)));
        }

        resp.json()
            .await
            .map_err(|e| UpstreamError::transport(format!("invalid relay response: {}", e)))
    }
}

/// Parse and normalise a relay base URL so relative joins keep its path
pub fn parse_relay_url(raw: &str) -> Result<Url, FlowError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| FlowError::config(format!("invalid relay URL '{}': {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FlowError::config(format!(
            "relay URL must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if url.cannot_be_a_base() {
        return Err(FlowError::config(format!("relay URL '{}' cannot be a base", raw)));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Prefer the relay's `detail` field, fall back to the raw body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "empty response".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relay_url_appends_slash() {
        let url = parse_relay_url("http://relay.internal/api").unwrap();
        assert_eq!(url.as_str(), "http://relay.internal/api/");
        assert_eq!(
            url.join("weather").unwrap().as_str(),
            "http://relay.internal/api/weather"
        );

        let url = parse_relay_url(DEFAULT_RELAY_URL).unwrap();
        assert_eq!(url.join("slack").unwrap().as_str(), "http://127.0.0.1:8000/slack");
    }

    #[test]
    fn test_parse_relay_url_rejects_bad_input() {
        assert!(matches!(
            parse_relay_url("not a url"),
            Err(FlowError::Config(_))
        ));
        assert!(matches!(
            parse_relay_url("ftp://relay.internal"),
            Err(FlowError::Config(_))
        ));
    }

    #[test]
    fn test_error_message_prefers_detail() {
        assert_eq!(error_message(r#"{"detail": "channel_not_found"}"#), "channel_not_found");
        assert_eq!(error_message(r#"{"detail": {"code": 7}}"#), r#"{"code":7}"#);
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(""), "empty response");
    }
}
