use crate::config::GatewayConfig;
use crate::ethereum::error::{GatewayError, GatewayResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const JSONRPC_VERSION: &str = "2.0";
const REQUEST_ID: u64 = 1;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// A single JSON-RPC node endpoint.
#[derive(Debug, Clone)]
pub struct NodeProvider {
    client: Client,
    url: String,
}

impl NodeProvider {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Posts one JSON-RPC request and returns the `result` member.
    ///
    /// A missing or null `result` is reported as [`GatewayError::EmptyResult`];
    /// an `error` member or any transport failure as [`GatewayError::Rpc`].
    pub async fn request(&self, method: &str, params: Value) -> GatewayResult<Value> {
        let body = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: REQUEST_ID,
            method,
            params: &params,
        };

        tracing::debug!(node = %self.url, method, "JSON-RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::rpc(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::rpc(e.to_string()))?;

        if !status.is_success() {
            let payload = serde_json::from_str::<Value>(&text).ok();
            return Err(GatewayError::Rpc {
                message: format!("HTTP {} from {}", status, self.url),
                payload: payload.or_else(|| (!text.is_empty()).then(|| Value::String(text))),
            });
        }

        let response: JsonRpcResponse = serde_json::from_str(&text).map_err(|e| {
            GatewayError::rpc(format!("Malformed JSON-RPC response from {}: {}", self.url, e))
        })?;

        if let Some(error) = response.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(GatewayError::Rpc {
                message,
                payload: Some(error),
            });
        }

        response.result.ok_or_else(|| GatewayError::empty(method))
    }
}

/// The primary node and the optional preventive node a gateway talks to.
#[derive(Debug, Clone)]
pub struct ProviderManager {
    primary: NodeProvider,
    fallback: Option<NodeProvider>,
}

impl ProviderManager {
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::rpc(format!("Failed to build HTTP client: {}", e)))?;

        let fallback = config
            .fallback_node
            .as_ref()
            .map(|url| NodeProvider::new(client.clone(), url.clone()));

        Ok(Self {
            primary: NodeProvider::new(client, config.node.clone()),
            fallback,
        })
    }

    pub fn primary(&self) -> &NodeProvider {
        &self.primary
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Nodes to try, in order. Starting on the fallback means it is the only attempt.
    fn attempt_order(&self, use_fallback: bool) -> GatewayResult<Vec<&NodeProvider>> {
        match (use_fallback, &self.fallback) {
            (true, Some(fallback)) => Ok(vec![fallback]),
            (true, None) => Err(GatewayError::rpc("No preventive node configured")),
            (false, Some(fallback)) => Ok(vec![&self.primary, fallback]),
            (false, None) => Ok(vec![&self.primary]),
        }
    }

    /// Runs `method` on the primary node, then once on the fallback node if the
    /// first answer failed or `parse` could not make use of it.
    ///
    /// Any error from `parse` marks the answer as unusable, so the preventive
    /// node gets its attempt.
    pub async fn request_with_fallback<T, F>(
        &self,
        method: &str,
        params: Value,
        use_fallback: bool,
        parse: F,
    ) -> GatewayResult<T>
    where
        F: Fn(Value) -> GatewayResult<T>,
    {
        let order = self.attempt_order(use_fallback)?;
        let last = order.len() - 1;

        for (i, provider) in order.into_iter().enumerate() {
            let outcome = match provider.request(method, params.clone()).await {
                Ok(value) => match parse(value) {
                    Ok(parsed) => return Ok(parsed),
                    Err(e) => e,
                },
                Err(e) if e.is_retryable_on_fallback() => e,
                Err(e) => return Err(e),
            };

            if i == last {
                return Err(outcome);
            }

            tracing::warn!(
                node = %provider.url(),
                method,
                error = %outcome,
                "Unusable result, trying preventive node"
            );
        }

        Err(GatewayError::rpc("No node endpoint configured"))
    }

    /// Returns whether the primary node answers `eth_blockNumber`.
    pub async fn check_connection(&self) -> bool {
        match self.primary.request("eth_blockNumber", Value::Array(vec![])).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Connection check failed for {}: {}", self.primary.url(), e);
                false
            }
        }
    }
}
