//! End-to-end coverage of the client facade against a fake endpoint.

use std::net::TcpListener;
use std::time::Duration;

use rstest::{fixture, rstest};
use serde_json::{Map, Value, json};

use crate::test_support::{Behaviour, FakeEndpoint, StatusDirectory};
use crate::{AliasResolver, BridgeClient, Endpoint, EndpointDiscovery, FailureReason, Response};

const TIMEOUT: Duration = Duration::from_secs(2);
const WAIT: Duration = Duration::from_secs(2);
const SETTLE: Duration = Duration::from_millis(50);
const FRESH: Duration = Duration::from_secs(1);

struct Harness {
    status: StatusDirectory,
    client: BridgeClient,
}

impl Harness {
    fn new() -> Self {
        let status = StatusDirectory::new().expect("status directory");
        let client = BridgeClient::new(
            AliasResolver::new(),
            EndpointDiscovery::new([status.path()]),
        );
        Self { status, client }
    }

    fn serve(&self, behaviour: Behaviour) -> FakeEndpoint {
        let endpoint = FakeEndpoint::spawn(behaviour).expect("spawn fake endpoint");
        self.status
            .publish_port("bridge-editor.json", endpoint.port(), FRESH)
            .expect("publish status record");
        endpoint
    }

    fn send(&mut self, name: &str, params: Value) -> Response {
        self.client.send_command(name, object(params), TIMEOUT)
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn reason(response: &Response) -> Option<FailureReason> {
    response.failure().map(|failure| failure.reason)
}

#[rstest]
fn missing_status_files_fail_without_connecting(mut harness: Harness) {
    let response = harness.send("ping", json!({}));
    assert_eq!(reason(&response), Some(FailureReason::NoStatusFiles));
    assert!(harness.client.pool().is_empty());
}

#[rstest]
fn invalid_status_records_fail_discovery(mut harness: Harness) {
    harness
        .status
        .write_record("bridge-broken.json", "{\"port\": 0}", FRESH)
        .expect("write record");
    let response = harness.send("ping", json!({}));
    assert_eq!(reason(&response), Some(FailureReason::NoValidPort));
}

#[rstest]
fn consecutive_commands_share_one_connection(mut harness: Harness) {
    let endpoint = harness.serve(Behaviour::Echo);

    let first = harness.send("ping", json!({}));
    let second = harness.send("scene", json!({}));

    assert!(first.is_success(), "{first:?}");
    assert!(second.is_success(), "{second:?}");
    assert!(endpoint.wait_for_connections(1, WAIT));
    std::thread::sleep(SETTLE);
    assert_eq!(endpoint.connections(), 1);
    assert_eq!(harness.client.pool().len(), 1);
}

#[rstest]
fn success_payload_is_the_result_field(mut harness: Harness) {
    let _endpoint = harness.serve(Behaviour::Echo);
    let response = harness.send("create", json!({"name": "Cube", "primitive": "cube"}));
    assert_eq!(
        response.result(),
        Some(&json!({
            "type": "create_gameobject",
            "params": {"name": "Cube", "primitive": "cube"}
        }))
    );
}

#[rstest]
fn aliases_are_sent_canonical(mut harness: Harness) {
    let endpoint = harness.serve(Behaviour::Echo);
    harness.send("rotate", json!({"speed": 90}));
    harness.send("unknown_xyz", json!({}));

    let requests = endpoint.requests().expect("requests");
    assert_eq!(
        requests,
        vec![
            json!({"type": "start_rotation", "params": {"speed": 90}}),
            json!({"type": "unknown_xyz", "params": {}}),
        ]
    );
}

#[rstest]
fn nested_params_round_trip_unchanged(mut harness: Harness) {
    let endpoint = harness.serve(Behaviour::Echo);
    let params = json!({
        "position": {"x": 1.5, "y": -2.0, "z": 0},
        "tags": ["a", "b\nc", "\u{1f680}"],
        "enabled": false,
        "parent": null
    });
    let response = harness.send("transform", params.clone());
    assert!(response.is_success());
    assert_eq!(
        endpoint.requests().expect("requests"),
        vec![json!({"type": "set_transform", "params": params})]
    );
}

#[rstest]
fn peer_close_leads_to_a_fresh_connection(mut harness: Harness) {
    let endpoint = harness.serve(Behaviour::EchoThenClose);

    assert!(harness.send("ping", json!({})).is_success());
    assert!(endpoint.wait_for_disconnects(1, WAIT));
    std::thread::sleep(SETTLE);
    assert!(harness.send("ping", json!({})).is_success());

    assert!(endpoint.wait_for_connections(2, WAIT));
    assert_eq!(endpoint.connections(), 2);
}

#[rstest]
fn timeout_evicts_the_connection(mut harness: Harness) {
    let endpoint = harness.serve(Behaviour::Unterminated);

    let response = harness
        .client
        .send_command("ping", Map::new(), Duration::from_millis(200));

    assert_eq!(reason(&response), Some(FailureReason::Timeout));
    assert!(harness.client.pool().is_empty());

    let retry = harness
        .client
        .send_command("ping", Map::new(), Duration::from_millis(200));
    assert_eq!(reason(&retry), Some(FailureReason::Timeout));
    assert!(endpoint.wait_for_connections(2, WAIT));
}

#[rstest]
fn oversized_timeouts_are_capped_not_fatal(mut harness: Harness) {
    let _endpoint = harness.serve(Behaviour::Echo);

    let response = harness
        .client
        .send_command("ping", Map::new(), Duration::from_secs(u64::MAX));

    assert!(response.is_success(), "{response:?}");
    assert_eq!(harness.client.pool().len(), 1);
}

#[rstest]
fn application_errors_keep_the_remote_message(mut harness: Harness) {
    let _endpoint = harness.serve(Behaviour::ApplicationError(String::from(
        "Unknown command: fly",
    )));

    let response = harness.send("fly", json!({}));
    let failure = response.failure().expect("application failure");
    assert_eq!(failure.reason, FailureReason::Application);
    assert_eq!(failure.message, "Unknown command: fly");
    assert_eq!(
        failure.detail,
        Some(json!({"status": "error", "error": "Unknown command: fly"}))
    );
    // The exchange itself succeeded, so the connection stays pooled.
    assert_eq!(harness.client.pool().len(), 1);
}

#[rstest]
fn malformed_replies_evict_the_connection(mut harness: Harness) {
    let _endpoint = harness.serve(Behaviour::Raw(String::from("not json")));

    let response = harness.send("ping", json!({}));
    assert_eq!(reason(&response), Some(FailureReason::MalformedResponse));
    assert!(harness.client.pool().is_empty());
}

#[rstest]
fn refused_connections_are_reported(mut harness: Harness) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("address").port();
    drop(listener);
    harness
        .status
        .publish_port("bridge-editor.json", port, FRESH)
        .expect("publish status record");

    let response = harness.send("ping", json!({}));
    assert_eq!(reason(&response), Some(FailureReason::ConnectFailed));
    assert!(harness.client.pool().is_empty());
}

#[rstest]
fn follows_the_endpoint_when_it_moves(mut harness: Harness) {
    let old = harness.serve(Behaviour::Echo);
    assert!(harness.send("ping", json!({})).is_success());

    let moved = FakeEndpoint::spawn(Behaviour::Echo).expect("spawn moved endpoint");
    harness
        .status
        .publish_port("bridge-editor.json", moved.port(), Duration::ZERO)
        .expect("republish status record");
    assert!(harness.send("ping", json!({})).is_success());

    assert_eq!(old.requests().expect("old requests").len(), 1);
    assert_eq!(moved.requests().expect("moved requests").len(), 1);
    assert!(harness.client.pool().contains(Endpoint::loopback(moved.port())));
    assert!(!harness.client.pool().contains(Endpoint::loopback(old.port())));
    assert_eq!(harness.client.pool().len(), 1);
    assert!(old.wait_for_disconnects(1, WAIT));
}

#[rstest]
fn close_drops_every_pooled_connection(mut harness: Harness) {
    let endpoint = harness.serve(Behaviour::Echo);
    assert!(harness.send("ping", json!({})).is_success());

    harness.client.close();

    assert!(harness.client.pool().is_empty());
    assert!(endpoint.wait_for_disconnects(1, WAIT));
    assert!(harness.send("ping", json!({})).is_success());
    assert!(endpoint.wait_for_connections(2, WAIT));
}
