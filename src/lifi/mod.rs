//! LI.FI REST client and the collaborator implementations built on it.

mod directory;
mod executor;
pub mod health;
mod rpc;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, LifiConfig};
use crate::error::{ConfigError, DirectoryError, ExecutionError, QuoteError};
use crate::model::{ChainDescriptor, ChainType, Quote, QuoteRequest, TokenDescriptor};
use crate::services::{BridgeServices, QuoteService, with_cancel};

pub use self::directory::LifiDirectory;
pub use self::executor::{LifiExecutor, TransactionSender};
pub use self::rpc::{EvmRpc, RpcError};
use self::types::{
    ApiErrorBody, ChainsResponse, NO_ROUTE_ERROR_CODE, StatusQuery, TokensResponse, TransferStatus,
};

const API_KEY_HEADER: &str = "x-lifi-api-key";

/// Failure talking to the LI.FI API, before it is mapped into a domain error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LifiError {
    #[error("{path}: {reason}")]
    Transport { path: String, reason: String },

    #[error("{path} returned HTTP {status}: {message}")]
    Api {
        path: String,
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("{path} returned an unreadable body: {reason}")]
    Decode { path: String, reason: String },
}

impl LifiError {
    pub fn into_directory(self, resource: &str) -> DirectoryError {
        match self {
            Self::Transport { reason, .. } => DirectoryError::Request {
                resource: resource.to_string(),
                reason,
            },
            Self::Api {
                status, message, ..
            } => DirectoryError::Rejected {
                resource: resource.to_string(),
                status,
                message,
            },
            Self::Decode { reason, .. } => DirectoryError::InvalidResponse {
                resource: resource.to_string(),
                reason,
            },
        }
    }
}

impl From<LifiError> for QuoteError {
    fn from(err: LifiError) -> Self {
        match err {
            LifiError::Transport { reason, .. } => QuoteError::Request { reason },
            LifiError::Api {
                status,
                code,
                message,
                ..
            } => {
                if code == Some(NO_ROUTE_ERROR_CODE) || status == 404 {
                    QuoteError::NoRoute { message }
                } else {
                    QuoteError::Rejected { status, message }
                }
            }
            LifiError::Decode { reason, .. } => QuoteError::InvalidResponse { reason },
        }
    }
}

impl From<LifiError> for ExecutionError {
    fn from(err: LifiError) -> Self {
        match err {
            LifiError::Transport { reason, .. } => ExecutionError::Transport { reason },
            LifiError::Api {
                status, message, ..
            } => ExecutionError::Rejected { status, message },
            LifiError::Decode { path, reason } => ExecutionError::Transport {
                reason: format!("{path} returned an unreadable body: {reason}"),
            },
        }
    }
}

/// Thin async client for `https://li.quest/v1`.
#[derive(Debug, Clone)]
pub struct LifiClient {
    http: reqwest::Client,
    base_url: String,
    integrator: String,
}

impl LifiClient {
    pub fn new(config: &LifiConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        if let Some(ref key) = config.api_key {
            let mut value = HeaderValue::from_str(key.expose_secret()).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "LIFI_API_KEY".to_string(),
                    message: e.to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "LIFI_API_BASE_URL".to_string(),
                message: format!("HTTP client init failed: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            integrator: config.integrator.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET /chains` restricted to the given chain types.
    pub async fn chains(&self, types: &[ChainType]) -> Result<Vec<ChainDescriptor>, LifiError> {
        let chain_types = types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let response = self
            .http
            .get(self.url("chains"))
            .query(&[("chainTypes", chain_types)])
            .send()
            .await;
        let body: ChainsResponse = decode("/chains", response).await?;
        Ok(body.chains)
    }

    pub async fn tokens(&self, chain_id: u64) -> Result<Vec<TokenDescriptor>, LifiError> {
        let response = self
            .http
            .get(self.url("tokens"))
            .query(&[("chains", chain_id.to_string())])
            .send()
            .await;
        let body: TokensResponse = decode("/tokens", response).await?;
        Ok(body.into_chain(chain_id))
    }

    /// `GET /quote`: the best single-step route for a request.
    pub async fn quote(&self, request: &QuoteRequest) -> Result<Quote, LifiError> {
        let query = [
            ("fromChain", request.from_chain_id.to_string()),
            ("toChain", request.to_chain_id.to_string()),
            ("fromToken", request.from_token_address.clone()),
            ("toToken", request.to_token_address.clone()),
            ("fromAmount", request.from_amount_raw.clone()),
            ("fromAddress", request.from_address.clone()),
            ("toAddress", request.from_address.clone()),
            ("integrator", self.integrator.clone()),
        ];
        tracing::debug!(
            from_chain = request.from_chain_id,
            from_token = %request.from_token_address,
            amount = %request.from_amount_raw,
            "Requesting LI.FI quote"
        );
        let response = self.http.get(self.url("quote")).query(&query).send().await;
        let body: serde_json::Value = decode("/quote", response).await?;
        Quote::from_wire(body).map_err(|e| LifiError::Decode {
            path: "/quote".to_string(),
            reason: e.to_string(),
        })
    }

    /// `POST /advanced/stepTransaction`: refresh a step with a fresh
    /// transaction request and estimate.
    pub async fn step_transaction(&self, step: &Quote) -> Result<Quote, LifiError> {
        const PATH: &str = "/advanced/stepTransaction";
        let body = step.wire_body().map_err(|e| LifiError::Decode {
            path: PATH.to_string(),
            reason: e.to_string(),
        })?;
        let response = self
            .http
            .post(self.url(PATH))
            .json(&body)
            .send()
            .await;
        let body: serde_json::Value = decode(PATH, response).await?;
        Quote::from_wire(body).map_err(|e| LifiError::Decode {
            path: PATH.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn status(&self, query: &StatusQuery) -> Result<TransferStatus, LifiError> {
        let response = self.http.get(self.url("status")).query(query).send().await;
        decode("/status", response).await
    }
}

async fn decode<T: DeserializeOwned>(
    path: &str,
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<T, LifiError> {
    let response = response.map_err(|e| LifiError::Transport {
        path: path.to_string(),
        reason: if e.is_timeout() {
            "request timed out".to_string()
        } else {
            e.to_string()
        },
    })?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| LifiError::Transport {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    if !status.is_success() {
        let body: ApiErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
        let message = body
            .message
            .unwrap_or_else(|| String::from_utf8_lossy(&bytes).trim().to_string());
        tracing::debug!(path, status = status.as_u16(), code = ?body.code, "LI.FI request rejected");
        return Err(LifiError::Api {
            path: path.to_string(),
            status: status.as_u16(),
            code: body.code,
            message,
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| LifiError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl QuoteService for LifiClient {
    async fn get_quote(
        &self,
        request: &QuoteRequest,
        cancel: &CancellationToken,
    ) -> Result<Quote, QuoteError> {
        match with_cancel(cancel, self.quote(request)).await {
            Some(result) => Ok(result?),
            None => Err(QuoteError::Cancelled),
        }
    }
}

/// Wire the LI.FI-backed collaborators from configuration.
pub fn bridge_services(
    config: &Config,
    sender: Arc<dyn TransactionSender>,
) -> Result<BridgeServices, ConfigError> {
    let client = Arc::new(LifiClient::new(&config.lifi)?);
    let rpc = EvmRpc::new(config.lifi.timeout)?;
    let directory = Arc::new(LifiDirectory::new(
        Arc::clone(&client),
        rpc.clone(),
        config.execution.rpc_urls.clone(),
    ));
    let executor = Arc::new(LifiExecutor::new(
        Arc::clone(&client),
        Arc::clone(&directory),
        rpc,
        sender,
        config.execution.status_poll_interval,
        config.execution.status_timeout,
    ));
    Ok(BridgeServices {
        chains: directory.clone(),
        tokens: directory,
        quotes: client,
        execution: executor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_quote_errors() {
        let no_route = QuoteError::from(LifiError::Api {
            path: "/quote".into(),
            status: 400,
            code: Some(NO_ROUTE_ERROR_CODE),
            message: "No available quotes for the requested transfer".into(),
        });
        assert!(matches!(no_route, QuoteError::NoRoute { .. }));

        let not_found = QuoteError::from(LifiError::Api {
            path: "/quote".into(),
            status: 404,
            code: None,
            message: "Not found".into(),
        });
        assert!(matches!(not_found, QuoteError::NoRoute { .. }));

        let rejected = QuoteError::from(LifiError::Api {
            path: "/quote".into(),
            status: 400,
            code: Some(1011),
            message: "Invalid fromAmount".into(),
        });
        assert!(matches!(rejected, QuoteError::Rejected { status: 400, .. }));

        let transport = QuoteError::from(LifiError::Transport {
            path: "/quote".into(),
            reason: "request timed out".into(),
        });
        assert!(transport.is_retryable());
    }

    #[test]
    fn api_errors_map_to_directory_errors() {
        let err = LifiError::Decode {
            path: "/chains".into(),
            reason: "missing field `id`".into(),
        }
        .into_directory("chains");
        match err {
            DirectoryError::InvalidResponse { resource, .. } => assert_eq!(resource, "chains"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn client_rejects_unprintable_api_key() {
        let config = LifiConfig {
            api_base_url: "https://li.quest/v1/".into(),
            integrator: "slyck".into(),
            api_key: Some(secrecy::SecretString::from("bad\nkey")),
            timeout: std::time::Duration::from_secs(1),
        };
        assert!(LifiClient::new(&config).is_err());

        let ok = LifiClient::new(&LifiConfig {
            api_key: None,
            ..config
        })
        .unwrap();
        assert_eq!(ok.base_url(), "https://li.quest/v1");
        assert_eq!(ok.url("/quote"), "https://li.quest/v1/quote");
    }
}
