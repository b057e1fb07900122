//! JSON-RPC node client over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use lattice_types::{
    AccountInfo, Address, Amount, BlockHash, Height, Receivable, SignedBlock, Timestamp,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::{ClientError, FrontierUpdate, NodeClient, SubmitOutcome};

/// HTTP client for a node's JSON-RPC endpoint.
///
/// Every request is a POST of `{"action": ..., ...params}`; the node answers
/// with `{"result": ...}` or `{"error": "..."}`.
#[derive(Clone)]
pub struct HttpNodeClient {
    http: reqwest::Client,
    node_url: String,
}

#[derive(Deserialize)]
struct NowResult {
    timestamp: u64,
}

impl HttpNodeClient {
    /// Create a client targeting `node_url` (e.g. `http://127.0.0.1:7076`).
    pub fn new(node_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            node_url: node_url.into(),
        })
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<T, ClientError> {
        let mut body = params;
        body.as_object_mut()
            .ok_or_else(|| ClientError::Protocol("params must be a JSON object".into()))?
            .insert("action".to_string(), serde_json::json!(action));

        debug!(action, url = %self.node_url, "node rpc");
        let response = self
            .http
            .post(&self.node_url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest)?;

        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "node returned HTTP {}",
                response.status()
            )));
        }

        let mut json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("invalid JSON response: {e}")))?;

        if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
            return Err(ClientError::Protocol(format!("node error: {err}")));
        }

        let result = json
            .get_mut("result")
            .map(serde_json::Value::take)
            .unwrap_or(json);
        serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("invalid {action} response: {e}")))
    }
}

fn map_reqwest(error: reqwest::Error) -> ClientError {
    if error.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transport(format!("request failed: {error}"))
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn account(&self, address: &Address) -> Result<Option<AccountInfo>, ClientError> {
        self.rpc_call("account_info", serde_json::json!({ "account": address }))
            .await
    }

    async fn submit(&self, block: &SignedBlock) -> Result<SubmitOutcome, ClientError> {
        self.rpc_call("process", serde_json::json!({ "block": block }))
            .await
    }

    async fn frontiers(&self, addresses: &[Address]) -> Result<Vec<FrontierUpdate>, ClientError> {
        self.rpc_call("frontiers", serde_json::json!({ "accounts": addresses }))
            .await
    }

    async fn block(&self, hash: &BlockHash) -> Result<Option<SignedBlock>, ClientError> {
        self.rpc_call("block_info", serde_json::json!({ "hash": hash.to_string() }))
            .await
    }

    async fn block_at(
        &self,
        address: &Address,
        height: Height,
    ) -> Result<Option<SignedBlock>, ClientError> {
        self.rpc_call(
            "block_at_height",
            serde_json::json!({ "account": address, "height": height }),
        )
        .await
    }

    async fn receivables(
        &self,
        address: &Address,
        min_amount: Amount,
    ) -> Result<Vec<Receivable>, ClientError> {
        self.rpc_call(
            "receivable",
            serde_json::json!({ "account": address, "threshold": min_amount }),
        )
        .await
    }

    async fn now(&self) -> Result<Timestamp, ClientError> {
        let now: NowResult = self.rpc_call("now", serde_json::json!({})).await?;
        Ok(Timestamp::from_millis(now.timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_keeps_url() {
        let client = HttpNodeClient::new("http://127.0.0.1:7076", Duration::from_secs(5)).unwrap();
        assert_eq!(client.node_url(), "http://127.0.0.1:7076");
    }

    #[tokio::test]
    async fn unreachable_node_is_a_transport_error() {
        let client = HttpNodeClient::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = client
            .account(&Address::new("lat_nobody"))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
    }
}
