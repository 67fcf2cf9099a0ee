use alloy::primitives::{Address, Bytes, B256, U128, U256, U64};
use alloy::rpc::types::Log;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::{CallOutput, ContractCall, LogQuery};
use crate::config::GatewayConfig;
use crate::ethereum::error::{GatewayError, GatewayResult};
use crate::ethereum::provider::ProviderManager;
use crate::ethereum::utils;

/// Client-side convenience layer over a node's JSON-RPC interface.
///
/// Cheap to clone; holds no state besides its configuration and HTTP client.
#[derive(Debug, Clone)]
pub struct RpcGateway {
    config: GatewayConfig,
    providers: ProviderManager,
}

/// Turns an `eth_call` answer into the caller's output.
///
/// An empty string is unusable. With `decode` set, so is any answer the ABI
/// cannot decode, such as `"0x"` from a node that is not synced.
fn parse_call_output(call: &ContractCall, decode: bool, value: Value) -> GatewayResult<CallOutput> {
    let raw = match value.as_str() {
        Some("") => return Err(GatewayError::empty("eth_call")),
        Some(raw) => raw,
        None => return Err(GatewayError::decoding("eth_call result", "expected a hex string")),
    };

    if !decode {
        return Ok(CallOutput::Raw(raw.to_string()));
    }

    let bytes = hex::decode(utils::strip_hex_prefix(raw))
        .map_err(|e| GatewayError::decoding("eth_call result", e))?;
    let decoded = call.abi.decode_output(&call.method, &bytes)?;

    Ok(CallOutput::Decoded(decoded))
}

fn parse_logs(value: Value) -> GatewayResult<Vec<Log>> {
    if value.as_array().is_some_and(|items| !items.is_empty()) {
        decode_result("eth_getLogs", value)
    } else {
        Err(GatewayError::empty("eth_getLogs"))
    }
}

pub(crate) fn decode_result<T: DeserializeOwned>(method: &str, value: Value) -> GatewayResult<T> {
    serde_json::from_value(value).map_err(|e| GatewayError::decoding(format!("{} result", method), e))
}

impl RpcGateway {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let providers = ProviderManager::new(&config)?;

        tracing::debug!(
            node = %config.node,
            fallback = ?config.fallback_node,
            chain = %config.chain,
            "RPC gateway created"
        );

        Ok(Self { config, providers })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn providers(&self) -> &ProviderManager {
        &self.providers
    }

    /// One request to the primary node, result decoded into `T`.
    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> GatewayResult<T> {
        let value = self.providers.primary().request(method, params).await?;
        decode_result(method, value)
    }

    pub async fn get_current_block(&self) -> GatewayResult<u64> {
        let block: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(block.to::<u64>())
    }

    pub async fn get_balance(&self, address: Address) -> GatewayResult<U256> {
        self.request("eth_getBalance", json!([address, "latest"]))
            .await
    }

    /// Raw block object as returned by the node.
    pub async fn get_block_by_number(
        &self,
        block_number: u64,
        full_transactions: bool,
    ) -> GatewayResult<Value> {
        self.request(
            "eth_getBlockByNumber",
            json!([format!("0x{:x}", block_number), full_transactions]),
        )
        .await
    }

    pub async fn get_transaction(&self, hash: B256) -> GatewayResult<Value> {
        self.request("eth_getTransactionByHash", json!([hash]))
            .await
    }

    pub async fn get_transaction_receipt(&self, hash: B256) -> GatewayResult<Value> {
        self.request("eth_getTransactionReceipt", json!([hash]))
            .await
    }

    /// Logs of a mined transaction; empty when the receipt carries none.
    pub async fn get_transaction_logs(&self, hash: B256) -> GatewayResult<Vec<Log>> {
        let mut receipt = self.get_transaction_receipt(hash).await?;
        match receipt.get_mut("logs").map(Value::take) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(logs) => decode_result("eth_getTransactionReceipt", logs),
        }
    }

    pub async fn get_code(&self, address: Address) -> GatewayResult<Bytes> {
        self.request("eth_getCode", json!([address, "latest"]))
            .await
    }

    /// Transaction count at the latest block, used as the next nonce.
    pub async fn get_transaction_count(&self, address: Address) -> GatewayResult<u64> {
        let count: U64 = self
            .request("eth_getTransactionCount", json!([address, "latest"]))
            .await?;
        Ok(count.to::<u64>())
    }

    pub async fn get_gas_price(&self) -> GatewayResult<u128> {
        let price: U128 = self.request("eth_gasPrice", json!([])).await?;
        Ok(price.to::<u128>())
    }

    /// Runs `eth_call`, retrying once on the preventive node when the
    /// primary fails, returns nothing, or returns data that does not decode.
    ///
    /// With `decode` unset the node's hex string is returned untouched.
    pub async fn call_smart_contract(
        &self,
        call: &ContractCall,
        decode: bool,
        use_fallback: bool,
    ) -> GatewayResult<CallOutput> {
        let data = call.encode()?;
        let params = json!([{ "to": call.address, "data": data }, "latest"]);

        tracing::debug!(
            contract = %call.address,
            method = %call.method,
            "Calling smart contract"
        );

        self.providers
            .request_with_fallback("eth_call", params, use_fallback, |value| {
                parse_call_output(call, decode, value)
            })
            .await
    }

    /// All logs in `[from_block, to_block]`.
    ///
    /// An empty array counts as an unusable answer: it is retried on the
    /// preventive node and, once attempts are exhausted, reported as
    /// [`GatewayError::EmptyResult`]. A range that genuinely holds no logs
    /// therefore fails too.
    pub async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        use_fallback: bool,
    ) -> GatewayResult<Vec<Log>> {
        let params = LogQuery::new(from_block, to_block).to_params();
        self.providers
            .request_with_fallback("eth_getLogs", params, use_fallback, parse_logs)
            .await
    }

    /// Logs emitted by `address` in `[from_block, to_block]`, primary node only.
    ///
    /// Unlike [`get_logs`](Self::get_logs) an empty range is a valid answer.
    pub async fn get_logs_by_address(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
    ) -> GatewayResult<Vec<Log>> {
        let params = LogQuery::new(from_block, to_block)
            .with_address(address)
            .to_params();
        self.request("eth_getLogs", params).await
    }
}
