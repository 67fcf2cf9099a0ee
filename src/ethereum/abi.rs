use alloy::dyn_abi::{DynSolType, DynSolValue, EventExt, FunctionExt, JsonAbiExt, Specifier};
use alloy::json_abi::{Event, Function, JsonAbi};
use alloy::primitives::{Bytes, B256};
use alloy::rpc::types::Log;
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::ParsedLog;
use crate::ethereum::error::{GatewayError, GatewayResult};

/// A contract ABI with its lookups built once.
///
/// Functions are looked up by name only: the first declaration wins and
/// overloads are never resolved by signature. Events are indexed by selector
/// for log parsing.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    abi: JsonAbi,
    events: HashMap<B256, Event>,
}

impl ContractAbi {
    pub fn new(abi: JsonAbi) -> Self {
        let events = abi
            .events()
            .filter(|event| !event.anonymous)
            .map(|event| (event.selector(), event.clone()))
            .collect();

        Self { abi, events }
    }

    pub fn from_json(json: &str) -> GatewayResult<Self> {
        let abi: JsonAbi = serde_json::from_str(json)
            .map_err(|e| GatewayError::InvalidInput(format!("Failed to parse ABI JSON: {}", e)))?;
        Ok(Self::new(abi))
    }

    pub fn from_value(value: Value) -> GatewayResult<Self> {
        let abi: JsonAbi = serde_json::from_value(value)
            .map_err(|e| GatewayError::InvalidInput(format!("Failed to parse ABI JSON: {}", e)))?;
        Ok(Self::new(abi))
    }

    pub fn json_abi(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn function(&self, method: &str) -> GatewayResult<&Function> {
        self.abi
            .function(method)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| GatewayError::AbiMethodNotFound(method.to_string()))
    }

    /// Builds call data (selector followed by the encoded arguments).
    pub fn encode_call(&self, method: &str, params: &[Value]) -> GatewayResult<Bytes> {
        let function = self.function(method)?;

        if params.len() != function.inputs.len() {
            let expected: Vec<String> = function
                .inputs
                .iter()
                .map(|input| format!("{} {}", input.ty, input.name))
                .collect();
            return Err(GatewayError::Encoding(format!(
                "{} expects {} parameters [{}], got {}",
                function.name,
                function.inputs.len(),
                expected.join(", "),
                params.len()
            )));
        }

        let mut values = Vec::with_capacity(params.len());
        for (i, (input, param)) in function.inputs.iter().zip(params).enumerate() {
            let ty = input.resolve().map_err(|e| {
                GatewayError::Encoding(format!("Unsupported type '{}': {}", input.ty, e))
            })?;
            let value = json_to_dyn_sol_value(param, &ty).map_err(|e| {
                let reason = match e {
                    GatewayError::Encoding(reason) => reason,
                    other => other.to_string(),
                };
                GatewayError::Encoding(format!(
                    "Invalid parameter #{} ('{}' of type '{}'): {}",
                    i + 1,
                    input.name,
                    input.ty,
                    reason
                ))
            })?;
            values.push(value);
        }

        let encoded = function
            .abi_encode_input(&values)
            .map_err(|e| GatewayError::Encoding(e.to_string()))?;

        Ok(encoded.into())
    }

    /// Decodes return data into a map keyed by the declared output names.
    ///
    /// Unnamed outputs are keyed by their position.
    pub fn decode_output(&self, method: &str, data: &[u8]) -> GatewayResult<Map<String, Value>> {
        let function = self.function(method)?;

        let decoded = function
            .abi_decode_output(data, false)
            .map_err(|e| GatewayError::decoding(format!("output of {}", method), e))?;

        let mut result = Map::new();
        for (i, (output, value)) in function.outputs.iter().zip(&decoded).enumerate() {
            let key = if output.name.is_empty() {
                i.to_string()
            } else {
                output.name.clone()
            };
            result.insert(key, dyn_sol_value_to_json(value)?);
        }

        Ok(result)
    }

    pub fn event(&self, selector: &B256) -> Option<&Event> {
        self.events.get(selector)
    }

    /// Decodes a raw log entry against the events of this ABI.
    pub fn parse_log(&self, log: &Log) -> GatewayResult<ParsedLog> {
        let selector = log
            .topics()
            .first()
            .ok_or_else(|| GatewayError::EventNotFound("<none>".to_string()))?;
        let event = self
            .event(selector)
            .ok_or_else(|| GatewayError::EventNotFound(format!("{:?}", selector)))?;

        let decoded = event
            .decode_log(log.data(), false)
            .map_err(|e| GatewayError::decoding(format!("event {}", event.name), e))?;

        let mut indexed = decoded.indexed.iter();
        let mut body = decoded.body.iter();
        let mut args = Map::new();
        for (i, input) in event.inputs.iter().enumerate() {
            let value = if input.indexed {
                indexed.next()
            } else {
                body.next()
            };
            let Some(value) = value else {
                return Err(GatewayError::decoding(
                    format!("event {}", event.name),
                    format!("missing argument '{}'", input.name),
                ));
            };
            let key = if input.name.is_empty() {
                i.to_string()
            } else {
                input.name.clone()
            };
            args.insert(key, dyn_sol_value_to_json(value)?);
        }

        Ok(ParsedLog {
            address: format!("0x{:x}", log.address()),
            event: event.name.clone(),
            signature: event.signature(),
            block_number: log.block_number,
            transaction_hash: log.transaction_hash.map(|hash| format!("{:?}", hash)),
            log_index: log.log_index,
            args,
        })
    }
}

/// Convert JSON value to DynSolValue based on expected Solidity type
fn json_to_dyn_sol_value(value: &Value, ty: &DynSolType) -> GatewayResult<DynSolValue> {
    match (ty, value) {
        (DynSolType::Bool, Value::Bool(b)) => Ok(DynSolValue::Bool(*b)),
        (DynSolType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|item| json_to_dyn_sol_value(item, inner))
            .collect::<GatewayResult<Vec<_>>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(GatewayError::Encoding(format!(
                    "expected {} elements, got {}",
                    len,
                    items.len()
                )));
            }
            items
                .iter()
                .map(|item| json_to_dyn_sol_value(item, inner))
                .collect::<GatewayResult<Vec<_>>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Value::Array(items)) => {
            if items.len() != types.len() {
                return Err(GatewayError::Encoding(format!(
                    "expected a tuple of {} elements, got {}",
                    types.len(),
                    items.len()
                )));
            }
            types
                .iter()
                .zip(items)
                .map(|(ty, item)| json_to_dyn_sol_value(item, ty))
                .collect::<GatewayResult<Vec<_>>>()
                .map(DynSolValue::Tuple)
        }
        (_, Value::String(s)) => ty
            .coerce_str(s)
            .map_err(|e| GatewayError::Encoding(e.to_string())),
        (_, Value::Number(n)) => ty
            .coerce_str(&n.to_string())
            .map_err(|e| GatewayError::Encoding(e.to_string())),
        _ => Err(GatewayError::Encoding(format!(
            "cannot use {} as {}",
            value, ty
        ))),
    }
}

/// Convert single DynSolValue to JSON
fn dyn_sol_value_to_json(value: &DynSolValue) -> GatewayResult<Value> {
    match value {
        DynSolValue::Address(addr) => Ok(Value::String(format!("0x{:x}", addr))),
        DynSolValue::Uint(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Int(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Bool(b) => Ok(Value::Bool(*b)),
        DynSolValue::String(s) => Ok(Value::String(s.clone())),
        DynSolValue::Bytes(bytes) => Ok(Value::String(format!("0x{}", hex::encode(bytes)))),
        DynSolValue::FixedBytes(word, size) => Ok(Value::String(format!(
            "0x{}",
            hex::encode(&word[..*size])
        ))),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            items
                .iter()
                .map(dyn_sol_value_to_json)
                .collect::<GatewayResult<Vec<_>>>()
                .map(Value::Array)
        }
        other => Err(GatewayError::decoding(
            "value",
            format!("unsupported type {:?}", other),
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy::primitives::U256;
    use serde_json::json;

    pub(crate) fn erc20_abi() -> ContractAbi {
        ContractAbi::from_value(json!([
            {
                "type": "function",
                "name": "balanceOf",
                "stateMutability": "view",
                "inputs": [{"name": "owner", "type": "address"}],
                "outputs": [{"name": "balance", "type": "uint256"}]
            },
            {
                "type": "function",
                "name": "getReserves",
                "stateMutability": "view",
                "inputs": [],
                "outputs": [
                    {"name": "_reserve0", "type": "uint112"},
                    {"name": "_reserve1", "type": "uint112"},
                    {"name": "_blockTimestampLast", "type": "uint32"}
                ]
            },
            {
                "type": "function",
                "name": "approve",
                "stateMutability": "nonpayable",
                "inputs": [
                    {"name": "spender", "type": "address"},
                    {"name": "amount", "type": "uint256"}
                ],
                "outputs": [{"name": "", "type": "bool"}]
            },
            {
                "type": "event",
                "name": "Transfer",
                "anonymous": false,
                "inputs": [
                    {"name": "from", "type": "address", "indexed": true},
                    {"name": "to", "type": "address", "indexed": true},
                    {"name": "value", "type": "uint256", "indexed": false}
                ]
            }
        ]))
        .unwrap()
    }

    pub(crate) fn word(value: u64) -> [u8; 32] {
        U256::from(value).to_be_bytes::<32>()
    }

    #[test]
    fn test_encode_balance_of() {
        let abi = erc20_abi();
        let data = abi
            .encode_call(
                "balanceOf",
                &[json!("0x742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e")],
            )
            .unwrap();

        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(
            hex::encode(&data[16..]),
            "742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e"
        );
    }

    #[test]
    fn test_unknown_method() {
        let abi = erc20_abi();
        let err = abi.encode_call("transfer", &[]).unwrap_err();

        assert!(matches!(err, GatewayError::AbiMethodNotFound(ref m) if m == "transfer"));
        assert_eq!(err.to_string(), "Can't find transfer in abi");
    }

    #[test]
    fn test_events_are_not_methods() {
        let abi = erc20_abi();
        assert!(matches!(
            abi.function("Transfer"),
            Err(GatewayError::AbiMethodNotFound(_))
        ));
    }

    #[test]
    fn test_parameter_mismatch() {
        let abi = erc20_abi();

        let err = abi.encode_call("approve", &[json!("0x742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e")]);
        assert!(matches!(err, Err(GatewayError::Encoding(_))));

        let err = abi.encode_call("approve", &[json!(true), json!(1)]);
        assert!(matches!(err, Err(GatewayError::Encoding(_))));
    }

    #[test]
    fn test_numbers_and_decimal_strings_encode_alike() {
        let abi = erc20_abi();
        let spender = json!("0x742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e");

        let from_number = abi.encode_call("approve", &[spender.clone(), json!(1000)]).unwrap();
        let from_string = abi.encode_call("approve", &[spender, json!("1000")]).unwrap();

        assert_eq!(from_number, from_string);
        assert_eq!(&from_number[36..], &word(1000));
    }

    #[test]
    fn test_decode_output_keys_match_abi() {
        let abi = erc20_abi();
        let data = [word(1000), word(2000), word(1_700_000_000)].concat();

        let decoded = abi.decode_output("getReserves", &data).unwrap();

        let keys: Vec<&String> = decoded.keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(decoded["_reserve0"], json!("1000"));
        assert_eq!(decoded["_reserve1"], json!("2000"));
        assert_eq!(decoded["_blockTimestampLast"], json!("1700000000"));
    }

    #[test]
    fn test_unnamed_output_keyed_by_position() {
        let abi = erc20_abi();
        let decoded = abi.decode_output("approve", &word(1)).unwrap();

        assert_eq!(decoded["0"], json!(true));
    }

    #[test]
    fn test_decode_short_data_fails() {
        let abi = erc20_abi();
        let err = abi.decode_output("getReserves", &[0u8; 4]).unwrap_err();

        assert!(matches!(err, GatewayError::Decoding { .. }));
    }

    #[test]
    fn test_parse_transfer_log() {
        let abi = erc20_abi();
        let selector = abi
            .json_abi()
            .event("Transfer")
            .and_then(|events| events.first())
            .unwrap()
            .selector();

        let log: Log = serde_json::from_value(json!({
            "address": "0xdac17f958d2ee523a2206206994597c13d831ec7",
            "topics": [
                format!("{:?}", selector),
                "0x000000000000000000000000742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e",
                "0x000000000000000000000000f39fd6e51aad88f6f4ce6ab8827279cfffb92266"
            ],
            "data": format!("0x{}", hex::encode(word(5000))),
            "blockHash": null,
            "blockNumber": "0x64",
            "transactionHash": "0x3f2cf1a5c5f1e6b6d2d6f0e3f1a8b2c4d5e6f708192a3b4c5d6e7f8091a2b3c4",
            "transactionIndex": "0x0",
            "logIndex": "0x2",
            "removed": false
        }))
        .unwrap();

        let parsed = abi.parse_log(&log).unwrap();

        assert_eq!(parsed.event, "Transfer");
        assert_eq!(parsed.signature, "Transfer(address,address,uint256)");
        assert_eq!(parsed.block_number, Some(100));
        assert_eq!(parsed.log_index, Some(2));
        assert_eq!(
            parsed.args["from"],
            json!("0x742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e")
        );
        assert_eq!(
            parsed.args["to"],
            json!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
        assert_eq!(parsed.args["value"], json!("5000"));
    }

    #[test]
    fn test_parse_unknown_log() {
        let abi = erc20_abi();
        let log: Log = serde_json::from_value(json!({
            "address": "0xdac17f958d2ee523a2206206994597c13d831ec7",
            "topics": ["0x0000000000000000000000000000000000000000000000000000000000000001"],
            "data": "0x",
            "blockHash": null,
            "blockNumber": null,
            "transactionHash": null,
            "transactionIndex": null,
            "logIndex": null,
            "removed": false
        }))
        .unwrap();

        assert!(matches!(
            abi.parse_log(&log),
            Err(GatewayError::EventNotFound(_))
        ));
    }
}
