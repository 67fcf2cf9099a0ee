//! Transaction assembly: fill gas price, gas limit, nonce and chain id,
//! sign locally, broadcast.
//!
//! Nonces are read from the node per call and never reserved, so concurrent
//! sends from one key can collide. Callers that send in parallel must assign
//! nonces themselves.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, U256, U64};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use serde_json::json;

use super::ContractCall;
use crate::ethereum::error::{GatewayError, GatewayResult};
use crate::ethereum::gateway::RpcGateway;
use crate::ethereum::wallet::{sign_transaction, signer_from_private_key};

/// Gas units added to the estimate when pricing a call.
pub const GAS_LIMIT_OVERHEAD: u64 = 200;

/// `gas_price * (gas_limit + GAS_LIMIT_OVERHEAD)`, in wei.
pub fn estimated_cost(gas_price: u128, gas_limit: u64) -> U256 {
    U256::from(gas_price) * (U256::from(gas_limit) + U256::from(GAS_LIMIT_OVERHEAD))
}

fn call_input(data: alloy::primitives::Bytes) -> TransactionInput {
    TransactionInput {
        input: Some(data.clone()),
        data: Some(data),
    }
}

impl RpcGateway {
    /// Numeric id of the configured chain.
    pub fn chain_id(&self) -> GatewayResult<u64> {
        self.config()
            .chain_id()
            .ok_or_else(|| GatewayError::UnsupportedChain(self.config().chain.clone()))
    }

    /// Gas the node expects `request` to consume.
    pub async fn estimate_gas(&self, request: &TransactionRequest) -> GatewayResult<u64> {
        let gas: U64 = self.request("eth_estimateGas", json!([request])).await?;
        Ok(gas.to::<u64>())
    }

    /// Populates whichever of gas price, gas limit, nonce and chain id are
    /// absent, in that order. Values already set are kept as they are.
    ///
    /// A failed gas estimation aborts the assembly.
    pub async fn fill_transaction(
        &self,
        mut request: TransactionRequest,
        from: Address,
    ) -> GatewayResult<TransactionRequest> {
        let chain_id = self.chain_id()?;

        if request.from.is_none() {
            request.set_from(from);
        }
        if request.gas_price.is_none() {
            request.set_gas_price(self.get_gas_price().await?);
        }
        if request.gas.is_none() {
            let gas_limit = self.estimate_gas(&request).await.inspect_err(|e| {
                tracing::warn!(from = %from, error = %e, "Gas estimation failed");
            })?;
            request.set_gas_limit(gas_limit);
        }
        if request.nonce.is_none() {
            request.set_nonce(self.get_transaction_count(from).await?);
        }
        if request.chain_id.is_none() {
            request.set_chain_id(chain_id);
        }

        Ok(request)
    }

    /// Fills, signs and broadcasts `request`, returning the transaction hash.
    pub async fn send_transaction(
        &self,
        request: TransactionRequest,
        private_key: &str,
    ) -> GatewayResult<B256> {
        self.chain_id()?;

        let signer = signer_from_private_key(private_key)?;
        let from = signer.address();
        let request = self.fill_transaction(request, from).await?;

        tracing::debug!(
            from = %from,
            nonce = ?request.nonce,
            gas = ?request.gas,
            gas_price = ?request.gas_price,
            "Transaction assembled"
        );

        let signed = sign_transaction(request, signer).await?;
        tracing::debug!(from = %from, hash = %signed.hash, "Transaction signed");

        let hash: B256 = self
            .request("eth_sendRawTransaction", json!([signed.raw]))
            .await
            .inspect_err(|e| {
                tracing::error!(from = %from, hash = %signed.hash, error = %e, "Broadcast rejected")
            })?;

        if hash != signed.hash {
            tracing::warn!(
                local = %signed.hash,
                node = %hash,
                "Node reported a different transaction hash"
            );
        }

        tracing::info!(from = %from, hash = %hash, "Transaction broadcast");
        Ok(hash)
    }

    /// Transfers `value` wei to `to`.
    pub async fn send_coin(
        &self,
        private_key: &str,
        to: Address,
        value: U256,
        nonce: Option<u64>,
    ) -> GatewayResult<B256> {
        let signer = signer_from_private_key(private_key)?;
        let mut request = TransactionRequest::default()
            .from(signer.address())
            .to(to)
            .value(value);
        if let Some(nonce) = nonce {
            request.set_nonce(nonce);
        }

        self.send_transaction(request, private_key).await
    }

    /// Invokes a contract method in a transaction.
    ///
    /// Fails before touching the network when the call cannot be encoded.
    pub async fn send_smart_contract(
        &self,
        private_key: &str,
        call: &ContractCall,
        nonce: Option<u64>,
        value: U256,
    ) -> GatewayResult<B256> {
        let data = call.encode()?;
        let signer = signer_from_private_key(private_key)?;

        let mut request = TransactionRequest::default()
            .from(signer.address())
            .to(call.address)
            .value(value)
            .input(call_input(data));
        if let Some(nonce) = nonce {
            request.set_nonce(nonce);
        }

        self.send_transaction(request, private_key).await
    }

    /// Expected fee in wei for invoking `call`, without signing or sending.
    pub async fn estimate(
        &self,
        private_key: &str,
        call: &ContractCall,
        value: U256,
    ) -> GatewayResult<U256> {
        let data = call.encode()?;
        let signer = signer_from_private_key(private_key)?;

        let request = TransactionRequest::default()
            .from(signer.address())
            .to(call.address)
            .value(value)
            .input(call_input(data));

        let gas_price = self.get_gas_price().await?;
        let gas_limit = self.estimate_gas(&request).await?;

        Ok(estimated_cost(gas_price, gas_limit))
    }
}
