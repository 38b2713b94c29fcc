//! JSON-RPC 2.0 / MCP protocol compliance of the tool servers

use caregap_mcp::config::ServerKind;
use caregap_mcp::transport::{
    JSONRPC_INVALID_PARAMS, JSONRPC_INVALID_REQUEST, JSONRPC_METHOD_NOT_FOUND, JSONRPC_PARSE_ERROR,
    JsonRpcMessage, McpMessage, MessageHandler, process_line, process_value,
};
use rstest::rstest;
use serde_json::{Value, json};

mod common;

use common::{assertions, test_utils};

async fn roundtrip(kind: ServerKind, request: Value) -> Value {
    let server = test_utils::demo_server(kind);
    let reply = process_value(&server, request).await.expect("request gets a reply");
    serde_json::to_value(reply).unwrap()
}

#[tokio::test]
async fn test_initialize_names_each_server() {
    for (kind, name) in [
        (ServerKind::Messaging, "action-server"),
        (ServerKind::Transform, "cql-converter"),
        (ServerKind::Data, "data-platform"),
    ] {
        let response = roundtrip(kind, test_utils::initialize_request(1)).await;
        assertions::assert_success_response(&response);
        assert_eq!(response["result"]["serverInfo"]["name"], name);
        assert_eq!(response["result"]["serverInfo"]["version"], caregap_mcp::VERSION);
    }
}

#[tokio::test]
async fn test_initialize_without_params() {
    let response = roundtrip(
        ServerKind::Transform,
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
    )
    .await;
    assertions::assert_success_response(&response);
}

#[tokio::test]
async fn test_ping() {
    let response = roundtrip(
        ServerKind::Data,
        json!({"jsonrpc": "2.0", "id": "ping-1", "method": "ping"}),
    )
    .await;
    assertions::assert_success_response(&response);
    assert_eq!(response["id"], "ping-1");
    assert_eq!(response["result"], json!({}));
}

#[rstest]
#[case("resources/list")]
#[case("prompts/list")]
#[case("tools/delete")]
#[tokio::test]
async fn test_unknown_method(#[case] method: &str) {
    let response = roundtrip(
        ServerKind::Transform,
        json!({"jsonrpc": "2.0", "id": 5, "method": method}),
    )
    .await;
    assertions::assert_error_response(&response, JSONRPC_METHOD_NOT_FOUND as i64);
    assert_eq!(response["id"], 5);
}

#[rstest]
#[case(json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call"}))]
#[case(json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {"arguments": {}}}))]
#[case(json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {"name": ""}}))]
#[tokio::test]
async fn test_malformed_tool_call_params(#[case] request: Value) {
    let response = roundtrip(ServerKind::Transform, request).await;
    assertions::assert_error_response(&response, JSONRPC_INVALID_PARAMS as i64);
    assert_eq!(response["id"], 6);
}

#[tokio::test]
async fn test_notifications_get_no_reply() {
    let server = test_utils::demo_server(ServerKind::Messaging);
    for method in ["notifications/initialized", "notifications/cancelled", "anything/else"] {
        let reply = process_value(&server, json!({"jsonrpc": "2.0", "method": method})).await;
        assert!(reply.is_none(), "notification {method} was answered");
    }
}

#[tokio::test]
async fn test_parse_and_request_errors() {
    let server = test_utils::demo_server(ServerKind::Messaging);

    let reply = process_line(&server, "{\"jsonrpc\": \"2.0\", ").await.unwrap();
    assertions::assert_jsonrpc_error(&reply, JSONRPC_PARSE_ERROR);

    let reply = process_line(&server, "[1, 2, 3]").await.unwrap();
    assertions::assert_jsonrpc_error(&reply, JSONRPC_INVALID_REQUEST);
}

#[tokio::test]
async fn test_tool_failures_are_results_not_errors() {
    let server = test_utils::demo_server(ServerKind::Data);

    let unknown = roundtrip(
        ServerKind::Data,
        test_utils::tool_call_request(1, "no_such_tool", json!({})),
    )
    .await;
    assertions::assert_tool_error(&unknown);

    let not_found = process_value(
        &server,
        test_utils::tool_call_request(2, "lookup_patient_details", json!({"patient_id": "nobody"})),
    )
    .await
    .unwrap();
    let not_found = serde_json::to_value(not_found).unwrap();
    assertions::assert_tool_ok(&not_found);
    assert!(test_utils::content_text(&not_found).starts_with("## Patient Not Found"));
}

#[tokio::test]
async fn test_arguments_may_be_omitted() {
    let response = roundtrip(
        ServerKind::Messaging,
        json!({"jsonrpc": "2.0", "id": 9, "method": "tools/call", "params": {"name": "get_sent_messages"}}),
    )
    .await;
    assertions::assert_tool_ok(&response);
}

#[tokio::test]
async fn test_non_object_arguments_rejected() {
    let response = roundtrip(
        ServerKind::Transform,
        test_utils::tool_call_request(3, "validate_cql", json!(["define X: true"])),
    )
    .await;
    assertions::assert_tool_error(&response);
    assertions::assert_error_kind(test_utils::content_text(&response), "ValidationError");
}

#[tokio::test]
async fn test_responses_are_ignored() {
    let server = test_utils::demo_server(ServerKind::Transform);
    let reply = server
        .handle_message(McpMessage::Response {
            id: json!(1),
            result: Some(json!({})),
            error: None,
        })
        .await
        .unwrap();
    assert!(reply.is_none());
}

#[test]
fn test_response_serialization_omits_empty_fields() {
    let message = McpMessage::result(json!(4), json!({"tools": []})).to_jsonrpc();
    let text = serde_json::to_string(&message).unwrap();
    assert_eq!(text, r#"{"jsonrpc":"2.0","id":4,"result":{"tools":[]}}"#);
    assert!(matches!(message, JsonRpcMessage::Response { .. }));
}
