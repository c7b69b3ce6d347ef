// RabbitMQ management API client
// This file implements the HTTP client that lists stream consumers
// through the management plugin REST API
//
// Numan Thabit 2025 Nov

use crate::consumer::ConsumerRecord;
use crate::errors::FetchError;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const CONSUMERS_PATH: &str = "/stream/consumers";

#[derive(Debug, Clone)]
pub struct ManagementSettings {
    pub base_url: Url,
    pub timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ManagementClient {
    http: Client,
    url: String,
    timeout: Duration,
    auth_header: Option<HeaderValue>,
}

impl ManagementClient {
    pub fn new(settings: ManagementSettings) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| FetchError::Client(format!("build http client: {e}")))?;

        // Plain concatenation keeps any path prefix of the base URL (e.g. `/api`).
        let url = format!(
            "{}{}",
            settings.base_url.as_str().trim_end_matches('/'),
            CONSUMERS_PATH
        );

        let auth_header = match (settings.username.as_deref(), settings.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some(basic_auth_header(user, pass)?)
            }
            _ => None,
        };

        Ok(Self {
            http,
            url,
            timeout: settings.timeout,
            auth_header,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    /// Single attempt; the caller owns any retry policy.
    pub async fn fetch_consumers(&self) -> Result<Vec<ConsumerRecord>, FetchError> {
        let mut request = self
            .http
            .get(&self.url)
            .header(ACCEPT, "application/json");
        if let Some(auth) = &self.auth_header {
            request = request.header(AUTHORIZATION, auth.clone());
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;
        let value: Value = serde_json::from_slice(&body).map_err(FetchError::Decode)?;
        Ok(decode_consumers(value))
    }
}

fn basic_auth_header(user: &str, pass: &str) -> Result<HeaderValue, FetchError> {
    let credentials = B64.encode(format!("{user}:{pass}"));
    let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))
        .map_err(|e| FetchError::Client(format!("invalid basic auth header: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

/// A body that is not a JSON array is read as an empty listing.
fn decode_consumers(value: Value) -> Vec<ConsumerRecord> {
    let Value::Array(items) = value else {
        debug!("consumer listing is not a JSON array; treating as empty");
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(index = index, error = %err, "skipping undecodable consumer record");
                None
            }
        })
        .collect()
}
