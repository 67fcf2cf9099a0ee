use alloy::primitives::{Address, U256};
use std::str::FromStr;

use crate::ethereum::error::{GatewayError, GatewayResult};

/// Validates and normalizes an Ethereum address
pub fn validate_address(address: &str) -> GatewayResult<Address> {
    let address = address.trim();

    if address.is_empty() {
        return Err(GatewayError::InvalidInput(
            "Address cannot be empty".to_string(),
        ));
    }

    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(GatewayError::InvalidInput(format!(
            "Invalid address format: '{}'. Ethereum addresses must start with '0x'",
            address
        )));
    }

    if address.len() != 42 {
        return Err(GatewayError::InvalidInput(format!(
            "Invalid address length: '{}'. Ethereum addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        )));
    }

    if !address[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GatewayError::InvalidInput(format!(
            "Invalid address format: '{}'. Contains non-hexadecimal characters",
            address
        )));
    }

    Address::from_str(address).map_err(|e| {
        GatewayError::InvalidInput(format!("Invalid Ethereum address: '{}'. Error: {}", address, e))
    })
}

/// Parses a transaction value given as decimal or `0x` prefixed hex.
pub fn validate_hex_value(value_str: &str) -> GatewayResult<U256> {
    if value_str.is_empty() {
        return Err(GatewayError::InvalidInput(
            "Value cannot be empty".to_string(),
        ));
    }

    if value_str.starts_with("0x") || value_str.starts_with("0X") {
        U256::from_str_radix(&value_str[2..], 16).map_err(|_| {
            GatewayError::InvalidInput(format!("Invalid hexadecimal value: '{}'", value_str))
        })
    } else {
        U256::from_str(value_str).map_err(|_| {
            GatewayError::InvalidInput(format!(
                "Invalid numeric value: '{}'. Use decimal format or '0x' prefixed hex",
                value_str
            ))
        })
    }
}

pub fn strip_hex_prefix(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

/// Strips the prefix and rejects anything but ASCII hex digits.
fn hex_digits<'a>(what: &str, value: &'a str) -> GatewayResult<&'a str> {
    let hex = strip_hex_prefix(value);
    if hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(hex)
    } else {
        Err(GatewayError::InvalidInput(format!(
            "Invalid {}: '{}'. Contains non-hexadecimal characters",
            what, value
        )))
    }
}

/// Splits log data into 32-byte words (64 hex characters each).
///
/// The last word is shorter when the data is not word aligned.
pub fn split_words(data: &str) -> GatewayResult<Vec<&str>> {
    let hex = hex_digits("log data", data)?;
    let mut words = Vec::with_capacity(hex.len().div_ceil(64));
    let mut rest = hex;
    while !rest.is_empty() {
        let (word, tail) = rest.split_at(rest.len().min(64));
        words.push(word);
        rest = tail;
    }
    Ok(words)
}

/// Reads the address stored in the low 20 bytes of a 32-byte word.
pub fn decode_address_word(word: &str) -> GatewayResult<String> {
    let hex = hex_digits("address word", word)?;
    let start = hex.len().saturating_sub(40);
    Ok(format!("0x{}", &hex[start..]))
}

/// Creates user-friendly error messages for common RPC errors
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("execution reverted") {
        "Transaction failed: The contract function reverted execution. This usually means the function's requirements were not met or an assertion failed.".to_string()
    } else if error.contains("insufficient funds") {
        "Transaction failed: Insufficient funds to cover value and gas costs.".to_string()
    } else if error.contains("gas required exceeds allowance") {
        "Transaction failed: Gas limit too low. Try increasing the gas limit for this transaction."
            .to_string()
    } else if error.contains("nonce too low") {
        "Transaction failed: Nonce too low. Another transaction from this account was already mined with this nonce.".to_string()
    } else if error.contains("replacement transaction underpriced") {
        "Transaction failed: Gas price too low to replace pending transaction. Increase the gas price.".to_string()
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Network error: Cannot connect to RPC endpoint. Check the node URL configuration.".to_string()
    } else if error.contains("timeout") || error.contains("timed out") {
        "Network error: Request timed out. The RPC endpoint may be overloaded or unreachable."
            .to_string()
    } else if error.contains("rate limit") {
        "Rate limit error: Too many requests to the RPC endpoint. Configure a preventive node or try again later.".to_string()
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e").is_ok());
        assert!(validate_address("0x0000000000000000000000000000000000000000").is_ok());

        assert!(validate_address("").is_err());
        assert!(validate_address("not_an_address").is_err());
        assert!(validate_address("0x123").is_err());
        assert!(validate_address("742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e").is_err());
        assert!(validate_address("0xgg2d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e").is_err());
    }

    #[test]
    fn test_validate_hex_value() {
        assert_eq!(validate_hex_value("0x10").unwrap(), U256::from(16));
        assert_eq!(validate_hex_value("1000").unwrap(), U256::from(1000));
        assert!(validate_hex_value("").is_err());
        assert!(validate_hex_value("0xzz").is_err());
        assert!(validate_hex_value("ten").is_err());
    }

    #[test]
    fn test_strip_hex_prefix() {
        assert_eq!(strip_hex_prefix("0xabc"), "abc");
        assert_eq!(strip_hex_prefix("abc"), "abc");
        assert_eq!(strip_hex_prefix("0x"), "");
    }

    #[test]
    fn test_split_words() {
        let a = "0".repeat(63) + "1";
        let b = "f".repeat(64);
        let data = format!("0x{}{}ab", a, b);

        assert_eq!(split_words(&data).unwrap(), vec![a.as_str(), b.as_str(), "ab"]);
        assert!(split_words("0x").unwrap().is_empty());
    }

    #[test]
    fn test_split_words_rejects_non_hex() {
        let straddling = format!("0x{}é", "a".repeat(63));
        assert!(matches!(
            split_words(&straddling),
            Err(GatewayError::InvalidInput(_))
        ));
        assert!(split_words("0xzz").is_err());
    }

    #[test]
    fn test_decode_address_word() {
        let word = "000000000000000000000000f39fd6e51aad88f6f4ce6ab8827279cfffb92266";
        assert_eq!(
            decode_address_word(word).unwrap(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(decode_address_word("0x1234").unwrap(), "0x1234");

        let straddling = format!("é{}", "b".repeat(39));
        assert!(decode_address_word(&straddling).is_err());
    }

    #[test]
    fn test_interpret_rpc_error() {
        assert!(interpret_rpc_error("nonce too low: next nonce 5").contains("Nonce too low"));
        assert!(interpret_rpc_error("execution reverted: paused").contains("reverted"));
        assert_eq!(interpret_rpc_error("odd failure"), "odd failure");
    }
}
