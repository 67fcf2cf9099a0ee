pub mod abi;
pub mod error;
pub mod gateway;
pub mod provider;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod transaction;
pub mod utils;
pub mod wallet;

use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use abi::ContractAbi;
use error::GatewayResult;

/// A read or write call against one contract method.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub address: Address,
    pub abi: ContractAbi,
    pub method: String,
    pub params: Vec<Value>,
}

impl ContractCall {
    pub fn new(
        address: Address,
        abi: ContractAbi,
        method: impl Into<String>,
        params: Vec<Value>,
    ) -> Self {
        Self {
            address,
            abi,
            method: method.into(),
            params,
        }
    }

    pub fn encode(&self) -> GatewayResult<Bytes> {
        self.abi.encode_call(&self.method, &self.params)
    }
}

/// Result of `eth_call`: the node's hex string, or outputs keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallOutput {
    Raw(String),
    Decoded(Map<String, Value>),
}

/// Inclusive block range for `eth_getLogs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub from_block: u64,
    pub to_block: u64,
    pub address: Option<Address>,
}

impl LogQuery {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            address: None,
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub(crate) fn to_params(self) -> Value {
        let mut filter = json!({
            "fromBlock": format!("0x{:x}", self.from_block),
            "toBlock": format!("0x{:x}", self.to_block),
        });
        if let Some(address) = self.address {
            filter["address"] = Value::String(format!("0x{:x}", address));
        }
        json!([filter])
    }
}

/// A log entry decoded against a contract ABI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedLog {
    pub address: String,
    pub event: String,
    pub signature: String,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<u64>,
    pub args: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_query_params() {
        let params = LogQuery::new(100, 255).to_params();
        assert_eq!(params, json!([{"fromBlock": "0x64", "toBlock": "0xff"}]));

        let address: Address = "0xdac17f958d2ee523a2206206994597c13d831ec7".parse().unwrap();
        let params = LogQuery::new(1, 1).with_address(address).to_params();
        assert_eq!(
            params[0]["address"],
            json!("0xdac17f958d2ee523a2206206994597c13d831ec7")
        );
    }

    #[test]
    fn test_call_output_serializes_untagged() {
        let raw = CallOutput::Raw("0x01".to_string());
        assert_eq!(serde_json::to_value(&raw).unwrap(), json!("0x01"));

        let mut map = Map::new();
        map.insert("balance".to_string(), json!("10"));
        let decoded = CallOutput::Decoded(map);
        assert_eq!(
            serde_json::to_value(&decoded).unwrap(),
            json!({"balance": "10"})
        );
    }
}
