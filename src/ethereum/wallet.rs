//! Key handling and local transaction signing.
//!
//! Private keys are only parsed, never logged or stored.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::primitives::{Bytes, B256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use serde::Serialize;

use crate::ethereum::error::{GatewayError, GatewayResult};

/// Parses a hex private key, with or without `0x` prefix.
pub fn signer_from_private_key(private_key: &str) -> GatewayResult<PrivateKeySigner> {
    let key_hex = private_key.trim();
    let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

    key_hex
        .parse()
        .map_err(|e| GatewayError::InvalidKey(format!("{}", e)))
}

/// Lower-cased `0x` address controlled by `private_key`.
pub fn private_key_to_address(private_key: &str) -> GatewayResult<String> {
    let signer = signer_from_private_key(private_key)?;
    Ok(format!("0x{:x}", signer.address()))
}

#[derive(Debug, Clone, Serialize)]
pub struct NewWallet {
    pub address: String,
    pub private_key: String,
}

/// Generates a fresh random key.
pub fn create_wallet() -> NewWallet {
    let signer = PrivateKeySigner::random();
    NewWallet {
        address: format!("0x{:x}", signer.address()),
        private_key: format!("0x{}", hex::encode(signer.to_bytes())),
    }
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
}

/// Signs a fully populated request locally. No network access.
pub async fn sign_transaction(
    request: TransactionRequest,
    signer: PrivateKeySigner,
) -> GatewayResult<SignedTransaction> {
    let wallet = EthereumWallet::from(signer);
    let envelope = TransactionBuilder::<Ethereum>::build(request, &wallet)
        .await
        .map_err(|e| GatewayError::Signing(e.to_string()))?;

    Ok(SignedTransaction {
        raw: envelope.encoded_2718().into(),
        hash: *envelope.tx_hash(),
    })
}
