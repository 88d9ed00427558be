//! Connectivity probes for the LI.FI API and chain RPC endpoints.

use std::error::Error as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Typed endpoint health state for doctor output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointHealthState {
    Healthy,
    InvalidUrl,
    DnsFailure,
    ConnectFailure,
    Timeout,
    AuthFailure,
    HttpFailure,
}

impl EndpointHealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::InvalidUrl => "invalid_url",
            Self::DnsFailure => "dns_failure",
            Self::ConnectFailure => "connect_failure",
            Self::Timeout => "timeout",
            Self::AuthFailure => "auth_failure",
            Self::HttpFailure => "http_failure",
        }
    }

    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Probe result for a single endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointHealth {
    pub name: String,
    pub url: String,
    pub state: EndpointHealthState,
    pub detail: String,
    pub http_status: Option<u16>,
}

impl EndpointHealth {
    pub fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }

    fn failed(name: &str, url: &str, state: EndpointHealthState, detail: String) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            state,
            detail,
            http_status: None,
        }
    }
}

/// GET `url` and classify failures by URL/DNS/connect/auth.
pub async fn probe_endpoint(name: &str, url: &str, timeout: Duration) -> EndpointHealth {
    if reqwest::Url::parse(url).is_err() {
        return EndpointHealth::failed(
            name,
            url,
            EndpointHealthState::InvalidUrl,
            "URL parse failed".to_string(),
        );
    }

    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(error) => {
            return EndpointHealth::failed(
                name,
                url,
                EndpointHealthState::ConnectFailure,
                format!("HTTP client init failed: {error}"),
            );
        }
    };

    match client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await
    {
        Ok(response) => {
            let status = response.status();
            let state = if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                EndpointHealthState::AuthFailure
            } else if status.is_server_error() {
                EndpointHealthState::HttpFailure
            } else {
                // JSON-RPC endpoints answer GET with 400/405; reachable is enough.
                EndpointHealthState::Healthy
            };
            EndpointHealth {
                name: name.to_string(),
                url: url.to_string(),
                state,
                detail: format!("HTTP {}", status.as_u16()),
                http_status: Some(status.as_u16()),
            }
        }
        Err(error) => EndpointHealth::failed(
            name,
            url,
            classify_transport_error(&error),
            error.to_string(),
        ),
    }
}

fn classify_transport_error(error: &reqwest::Error) -> EndpointHealthState {
    if error.is_timeout() {
        return EndpointHealthState::Timeout;
    }

    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_error) = err.downcast_ref::<std::io::Error>() {
            return match io_error.kind() {
                std::io::ErrorKind::NotFound => EndpointHealthState::DnsFailure,
                _ => EndpointHealthState::ConnectFailure,
            };
        }
        source = err.source();
    }

    let lowered = error.to_string().to_ascii_lowercase();
    if lowered.contains("dns")
        || lowered.contains("lookup")
        || lowered.contains("name or service not known")
        || lowered.contains("no such host")
    {
        EndpointHealthState::DnsFailure
    } else {
        EndpointHealthState::ConnectFailure
    }
}
