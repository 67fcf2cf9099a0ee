use anyhow::Result;
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use alloy::primitives::{
    utils::{format_ether, parse_ether},
    B256, U256,
};

use crate::{
    config::Config,
    ethereum::{
        abi::ContractAbi,
        error::{GatewayError, GatewayResult},
        gateway::RpcGateway,
        utils, wallet, ContractCall,
    },
};

#[derive(Debug, Clone)]
pub struct GatewayMcpServer {
    gateway: Arc<RpcGateway>,
    config: Arc<Config>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct AddressRequest {
    address: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct BlockRequest {
    block_number: u64,
    full_transactions: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct TransactionHashRequest {
    hash: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct TransactionEventsRequest {
    hash: String,
    /// ABI declaring the events to decode
    abi: Value,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct LogsRequest {
    from_block: u64,
    to_block: u64,
    /// Only logs emitted by this contract. Disables the preventive node.
    address: Option<String>,
    use_fallback: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct ContractCallRequest {
    contract_address: String,
    abi: Value,
    method: String,
    params: Vec<Value>,
    decode: Option<bool>,
    use_fallback: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct EstimateRequest {
    private_key: String,
    contract_address: String,
    abi: Value,
    method: String,
    params: Vec<Value>,
    /// Ether sent with the call, as a decimal string
    value: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct SendCoinRequest {
    private_key: String,
    to: String,
    /// Amount in ether as a decimal string, or wei as a 0x-prefixed hex string
    value: String,
    nonce: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct SendSmartContractRequest {
    private_key: String,
    contract_address: String,
    abi: Value,
    method: String,
    params: Vec<Value>,
    value: Option<String>,
    nonce: Option<u64>,
}

fn parse_hash(hash: &str) -> GatewayResult<B256> {
    B256::from_str(hash.trim())
        .map_err(|e| GatewayError::InvalidInput(format!("Invalid transaction hash '{}': {}", hash, e)))
}

fn parse_ether_value(value: Option<&str>) -> GatewayResult<U256> {
    match value {
        None => Ok(U256::ZERO),
        Some(value) if value.trim().starts_with("0x") => utils::validate_hex_value(value.trim()),
        Some(value) => parse_ether(value.trim())
            .map_err(|e| GatewayError::InvalidInput(format!("Invalid ether amount '{}': {}", value, e))),
    }
}

/// Accepts an ABI as a JSON array or as a string holding ABI JSON.
fn parse_abi(abi: Value) -> GatewayResult<ContractAbi> {
    match abi {
        Value::String(json) => ContractAbi::from_json(&json),
        other => ContractAbi::from_value(other),
    }
}

fn build_call(
    contract_address: &str,
    abi: Value,
    method: String,
    params: Vec<Value>,
) -> GatewayResult<ContractCall> {
    let address = utils::validate_address(contract_address)?;
    let abi = parse_abi(abi)?;
    Ok(ContractCall::new(address, abi, method, params))
}

fn render<T: Serialize>(what: &str, result: GatewayResult<T>) -> String {
    match result {
        Ok(value) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| format!("Failed to serialize {}", what)),
        Err(e) => {
            error!("Failed to {}: {}", what, e);
            match &e {
                GatewayError::Rpc {
                    message,
                    payload: Some(payload),
                } => format!(
                    "Error: {} ({})",
                    utils::interpret_rpc_error(message),
                    payload
                ),
                GatewayError::Rpc { message, .. } => {
                    format!("Error: {}", utils::interpret_rpc_error(message))
                }
                other => format!("Error: {}", other),
            }
        }
    }
}

impl GatewayMcpServer {
    pub fn new(config: Config) -> Result<Self> {
        let gateway = Arc::new(RpcGateway::new(config.gateway.clone())?);
        let config = Arc::new(config);

        Ok(Self { gateway, config })
    }

    pub async fn run(&self) -> Result<()> {
        info!("Starting RPC Gateway MCP Server");

        if !self.gateway.providers().check_connection().await {
            warn!(
                "Primary node {} did not answer eth_blockNumber",
                self.config.gateway.node
            );
        }

        if !self.gateway.providers().has_fallback() {
            info!("No preventive node configured, reads use the primary node only");
        }

        let service = self.clone().serve(stdio()).await?;

        info!("RPC Gateway MCP Server started successfully");
        let _ = service.waiting().await;
        Ok(())
    }

    fn writes_disabled(&self) -> Option<String> {
        (!self.config.security.allow_write_operations).then(|| {
            "Error: Write operations are disabled. Use --allow-writes flag to enable transaction sending.".to_string()
        })
    }
}

#[tool(tool_box)]
impl GatewayMcpServer {
    #[tool(description = "Get the latest block number of the primary node")]
    async fn get_current_block(&self) -> String {
        render("get current block", self.gateway.get_current_block().await)
    }

    #[tool(description = "Get the balance of an address, in wei and ether")]
    async fn get_balance(&self, #[tool(aggr)] request: AddressRequest) -> String {
        let result = async {
            let address = utils::validate_address(&request.address)?;
            let balance = self.gateway.get_balance(address).await?;
            Ok::<_, GatewayError>(json!({
                "wei": balance.to_string(),
                "ether": format_ether(balance),
            }))
        }
        .await;
        render("get balance", result)
    }

    #[tool(description = "Get a block by number")]
    async fn get_block(&self, #[tool(aggr)] request: BlockRequest) -> String {
        render(
            "get block",
            self.gateway
                .get_block_by_number(
                    request.block_number,
                    request.full_transactions.unwrap_or(true),
                )
                .await,
        )
    }

    #[tool(description = "Get a transaction by hash")]
    async fn get_transaction(&self, #[tool(aggr)] request: TransactionHashRequest) -> String {
        let result = async {
            let hash = parse_hash(&request.hash)?;
            self.gateway.get_transaction(hash).await
        }
        .await;
        render("get transaction", result)
    }

    #[tool(description = "Get the receipt of a mined transaction")]
    async fn get_transaction_receipt(
        &self,
        #[tool(aggr)] request: TransactionHashRequest,
    ) -> String {
        let result = async {
            let hash = parse_hash(&request.hash)?;
            self.gateway.get_transaction_receipt(hash).await
        }
        .await;
        render("get transaction receipt", result)
    }

    #[tool(description = "Decode the events emitted by a mined transaction")]
    async fn get_transaction_events(
        &self,
        #[tool(aggr)] request: TransactionEventsRequest,
    ) -> String {
        let result = async {
            let hash = parse_hash(&request.hash)?;
            let abi = parse_abi(request.abi)?;
            let logs = self.gateway.get_transaction_logs(hash).await?;

            let mut events = Vec::with_capacity(logs.len());
            for log in &logs {
                match abi.parse_log(log) {
                    Ok(parsed) => events.push(parsed),
                    Err(GatewayError::EventNotFound(_)) => {
                        debug!("Skipping log {:?} with no matching event", log.log_index)
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(events)
        }
        .await;
        render("get transaction events", result)
    }

    #[tool(description = "Get the deployed bytecode at an address")]
    async fn get_code(&self, #[tool(aggr)] request: AddressRequest) -> String {
        let result = async {
            let address = utils::validate_address(&request.address)?;
            self.gateway.get_code(address).await
        }
        .await;
        render("get code", result)
    }

    #[tool(description = "Get logs in an inclusive block range, optionally for one contract")]
    async fn get_logs(&self, #[tool(aggr)] request: LogsRequest) -> String {
        let result = async {
            match &request.address {
                Some(address) => {
                    let address = utils::validate_address(address)?;
                    self.gateway
                        .get_logs_by_address(request.from_block, request.to_block, address)
                        .await
                }
                None => {
                    self.gateway
                        .get_logs(
                            request.from_block,
                            request.to_block,
                            request.use_fallback.unwrap_or(false),
                        )
                        .await
                }
            }
        }
        .await;
        render("get logs", result)
    }

    #[tool(description = "Call a read-only contract method, decoding outputs by name")]
    async fn call_smart_contract(&self, #[tool(aggr)] request: ContractCallRequest) -> String {
        let result = async {
            let call = build_call(
                &request.contract_address,
                request.abi,
                request.method,
                request.params,
            )?;
            self.gateway
                .call_smart_contract(
                    &call,
                    request.decode.unwrap_or(true),
                    request.use_fallback.unwrap_or(false),
                )
                .await
        }
        .await;
        render("call smart contract", result)
    }

    #[tool(description = "Estimate the fee in wei of a contract transaction")]
    async fn estimate(&self, #[tool(aggr)] request: EstimateRequest) -> String {
        let result = async {
            let call = build_call(
                &request.contract_address,
                request.abi,
                request.method,
                request.params,
            )?;
            let value = parse_ether_value(request.value.as_deref())?;
            let cost = self.gateway.estimate(&request.private_key, &call, value).await?;
            Ok::<_, GatewayError>(json!({
                "wei": cost.to_string(),
                "ether": format_ether(cost),
            }))
        }
        .await;
        render("estimate", result)
    }

    #[tool(description = "Generate a new random wallet")]
    async fn create_wallet(&self) -> String {
        render("create wallet", Ok(wallet::create_wallet()))
    }

    #[tool(description = "Send ether to an address")]
    async fn send_coin(&self, #[tool(aggr)] request: SendCoinRequest) -> String {
        if let Some(refusal) = self.writes_disabled() {
            return refusal;
        }

        let result = async {
            let to = utils::validate_address(&request.to)?;
            let value = parse_ether_value(Some(&request.value))?;
            self.gateway
                .send_coin(&request.private_key, to, value, request.nonce)
                .await
        }
        .await;
        render("send coin", result)
    }

    #[tool(description = "Send a transaction invoking a contract method")]
    async fn send_smart_contract(
        &self,
        #[tool(aggr)] request: SendSmartContractRequest,
    ) -> String {
        if let Some(refusal) = self.writes_disabled() {
            return refusal;
        }

        let result = async {
            let call = build_call(
                &request.contract_address,
                request.abi,
                request.method,
                request.params,
            )?;
            let value = parse_ether_value(request.value.as_deref())?;
            self.gateway
                .send_smart_contract(&request.private_key, &call, request.nonce, value)
                .await
        }
        .await;
        render("send smart contract", result)
    }
}

#[tool(tool_box)]
impl ServerHandler for GatewayMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("MCP server wrapping a blockchain node's JSON-RPC interface. Supports block, balance and transaction lookups, log queries with a preventive node fallback, contract calls, fee estimation, and signed transfers and contract transactions.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ether_value() {
        assert_eq!(parse_ether_value(None).unwrap(), U256::ZERO);
        assert_eq!(
            parse_ether_value(Some("1.5")).unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(
            parse_ether_value(Some("0x3e8")).unwrap(),
            U256::from(1000u64)
        );
        assert!(parse_ether_value(Some("lots")).is_err());
    }

    #[test]
    fn test_build_call_validates_inputs() {
        let abi = json!([{
            "type": "function",
            "name": "totalSupply",
            "stateMutability": "view",
            "inputs": [],
            "outputs": [{"name": "", "type": "uint256"}]
        }]);

        assert!(build_call("0x123", abi.clone(), "totalSupply".into(), vec![]).is_err());
        assert!(build_call("0xdac17f958d2ee523a2206206994597c13d831ec7", json!({}), "totalSupply".into(), vec![]).is_err());

        let call = build_call(
            "0xdac17f958d2ee523a2206206994597c13d831ec7",
            abi,
            "totalSupply".into(),
            vec![],
        )
        .unwrap();
        assert_eq!(call.encode().unwrap().len(), 4);
    }

    #[test]
    fn test_parse_abi_accepts_array_or_string() {
        let abi = json!([{
            "type": "function",
            "name": "decimals",
            "stateMutability": "view",
            "inputs": [],
            "outputs": [{"name": "", "type": "uint8"}]
        }]);

        assert!(parse_abi(abi.clone()).unwrap().function("decimals").is_ok());
        assert!(parse_abi(Value::String(abi.to_string()))
            .unwrap()
            .function("decimals")
            .is_ok());
        assert!(parse_abi(Value::String("not json".to_string())).is_err());
    }

    #[test]
    fn test_render_uses_friendly_rpc_errors() {
        let rendered = render::<()>(
            "send coin",
            Err(GatewayError::Rpc {
                message: "nonce too low".to_string(),
                payload: None,
            }),
        );
        assert!(rendered.starts_with("Error: Transaction failed: Nonce too low"));

        let rendered = render("get block", Ok(json!({"number": "0x1"})));
        assert!(rendered.contains("\"number\""));
    }

    #[tokio::test]
    async fn test_writes_refused_by_default() {
        let server = GatewayMcpServer::new(Config::default()).unwrap();
        let response = server
            .send_coin(SendCoinRequest {
                private_key: "0x01".to_string(),
                to: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
                value: "1".to_string(),
                nonce: None,
            })
            .await;

        assert!(response.contains("Write operations are disabled"));
    }
}
