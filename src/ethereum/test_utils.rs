use httpmock::{Method::POST, Mock, MockServer};
use serde_json::{json, Value};

use crate::config::GatewayConfig;
use crate::ethereum::gateway::RpcGateway;

pub(crate) fn rpc_result(result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "result": result})
}

fn method_needle(method: &str) -> String {
    format!(r#""method":"{}""#, method)
}

/// Answers every `method` request on `server` with `result`.
pub(crate) async fn mock_rpc<'a>(server: &'a MockServer, method: &str, result: Value) -> Mock<'a> {
    let needle = method_needle(method);
    server
        .mock_async(|when, then| {
            when.method(POST).path("/").body_contains(needle);
            then.status(200).json_body(rpc_result(result));
        })
        .await
}

/// Answers every `method` request on `server` with a JSON-RPC error object.
pub(crate) async fn mock_rpc_error<'a>(
    server: &'a MockServer,
    method: &str,
    message: &str,
) -> Mock<'a> {
    let needle = method_needle(method);
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {"code": -32000, "message": message}
    });
    server
        .mock_async(|when, then| {
            when.method(POST).path("/").body_contains(needle);
            then.status(200).json_body(body);
        })
        .await
}

pub(crate) fn gateway_for(node: &MockServer, fallback: Option<&MockServer>) -> RpcGateway {
    let mut config = GatewayConfig::new(node.base_url(), "bsc_mainnet");
    if let Some(fallback) = fallback {
        config = config.with_fallback_node(fallback.base_url());
    }
    RpcGateway::new(config).unwrap()
}

pub(crate) async fn setup_server_and_gateway() -> (MockServer, RpcGateway) {
    let server = MockServer::start_async().await;
    let gateway = gateway_for(&server, None);
    (server, gateway)
}
