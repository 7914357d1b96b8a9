use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlab_core::bootstrap::HealthService;
use sqlab_core::classifier::is_error_envelope;
use sqlab_core::query_controller::{QueryService, TransportError};
use sqlab_core::settings::Settings;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Client for the SQL service's `/sql/health` and `/sql/query` endpoints.
#[derive(Debug, Clone)]
pub struct HttpSqlService {
    client: Client,
    health_url: String,
    query_url: String,
}

impl HttpSqlService {
    pub fn from_settings(settings: &Settings) -> Result<Self, HttpClientError> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(HttpClientError::Build)?;

        Ok(Self {
            client,
            health_url: settings.health_url(),
            query_url: settings.query_url(),
        })
    }

    #[must_use]
    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    #[must_use]
    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    async fn read_envelope(response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        let body = response.bytes().await.map_err(to_transport_error)?;
        decode_envelope(status, &body)
    }
}

#[async_trait]
impl QueryService for HttpSqlService {
    async fn execute(&self, sql: &str) -> Result<Value, TransportError> {
        debug!(url = %self.query_url, "posting query");
        let response = self
            .client
            .post(&self.query_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({ "sql": sql }))
            .send()
            .await
            .map_err(to_transport_error)?;
        Self::read_envelope(response).await
    }
}

#[async_trait]
impl HealthService for HttpSqlService {
    async fn health(&self) -> Result<Value, TransportError> {
        debug!(url = %self.health_url, "fetching health");
        let response = self
            .client
            .get(&self.health_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(to_transport_error)?;
        Self::read_envelope(response).await
    }
}

/// Non-2xx replies are accepted only when they carry an `ERROR` envelope.
fn decode_envelope(status: StatusCode, body: &[u8]) -> Result<Value, TransportError> {
    let parsed = serde_json::from_slice::<Value>(body);

    if !status.is_success() {
        return match parsed {
            Ok(envelope) if is_error_envelope(&envelope) => Ok(envelope),
            _ => Err(TransportError::new(format!("HTTP status {}", status.as_u16()))),
        };
    }

    parsed.map_err(|error| TransportError::new(format!("invalid JSON response: {error}")))
}

/// Connection-level failures carry no message worth showing, so the
/// controller falls back to its generic network text for them.
fn to_transport_error(error: reqwest::Error) -> TransportError {
    debug!(%error, "transport failure");
    if error.is_connect() || error.is_timeout() || error.is_request() {
        TransportError::unreachable()
    } else {
        TransportError::new(error.to_string())
    }
}
