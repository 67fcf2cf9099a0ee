//! JSON-RPC gateway for EVM nodes: reads with an optional preventive node,
//! ABI-aware contract calls, and locally signed transactions.

pub mod config;
pub mod ethereum;
pub mod retry;
pub mod server;

pub use config::{Config, GatewayConfig};
pub use ethereum::{
    abi::ContractAbi,
    error::{GatewayError, GatewayResult},
    gateway::RpcGateway,
    wallet::{create_wallet, private_key_to_address, NewWallet},
    CallOutput, ContractCall, LogQuery, ParsedLog,
};
pub use retry::retry;
pub use server::GatewayMcpServer;
