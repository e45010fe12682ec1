// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for node registration using wiremock.

use traffic_accident::Error;
use traffic_accident::protocol::{ChannelType, NodeRegistration, NodeRegistry};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry_for(server: &MockServer) -> NodeRegistry {
    NodeRegistry::new(server.uri().replace("http://", "")).unwrap()
}

#[tokio::test]
async fn register_returns_server_address() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/nodes"))
        .and(body_json(serde_json::json!({
            "name": "TrafficAccident",
            "channel_types": [14]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "node_id": 42,
            "server_address": "127.0.0.1:10000"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registration = registry_for(&mock_server)
        .register("TrafficAccident", &[ChannelType::JsonData])
        .await
        .unwrap();

    assert_eq!(
        registration,
        NodeRegistration {
            node_id: 42,
            server_address: "127.0.0.1:10000".to_string(),
        }
    );
}

#[tokio::test]
async fn register_accepts_full_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/nodes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "node_id": 1,
            "server_address": "bus.local:1883"
        })))
        .mount(&mock_server)
        .await;

    let registry = NodeRegistry::new(mock_server.uri()).unwrap();
    let registration = registry
        .register("TrafficAccident", &[ChannelType::JsonData])
        .await
        .unwrap();

    assert_eq!(registration.server_address, "bus.local:1883");
}

#[tokio::test]
async fn register_refused() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/nodes"))
        .respond_with(ResponseTemplate::new(503).set_body_string("no server available"))
        .mount(&mock_server)
        .await;

    let result = registry_for(&mock_server)
        .register("TrafficAccident", &[ChannelType::JsonData])
        .await;

    match result {
        Err(Error::Registration(message)) => {
            assert!(message.contains("503"));
            assert!(message.contains("no server available"));
        }
        other => panic!("expected registration error, got {other:?}"),
    }
}

#[tokio::test]
async fn register_with_unreadable_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let result = registry_for(&mock_server)
        .register("TrafficAccident", &[ChannelType::JsonData])
        .await;

    assert!(matches!(result, Err(Error::Protocol(_))));
}

#[tokio::test]
async fn register_with_empty_server_address() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "node_id": 3,
            "server_address": ""
        })))
        .mount(&mock_server)
        .await;

    let result = registry_for(&mock_server)
        .register("TrafficAccident", &[ChannelType::JsonData])
        .await;

    assert!(matches!(result, Err(Error::Registration(_))));
}

#[tokio::test]
async fn register_unreachable_service() {
    // Nothing listens on port 1.
    let registry = NodeRegistry::new("127.0.0.1:1").unwrap();
    let result = registry
        .register("TrafficAccident", &[ChannelType::JsonData])
        .await;

    assert!(matches!(result, Err(Error::Protocol(_))));
}

#[tokio::test]
async fn unregister_deletes_node() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v0/nodes/42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registration = NodeRegistration {
        node_id: 42,
        server_address: "127.0.0.1:10000".to_string(),
    };

    registry_for(&mock_server)
        .unregister(&registration)
        .await
        .unwrap();
}

#[tokio::test]
async fn unregister_unknown_node_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v0/nodes/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let registration = NodeRegistration {
        node_id: 7,
        server_address: "127.0.0.1:10000".to_string(),
    };

    let result = registry_for(&mock_server).unregister(&registration).await;
    assert!(result.is_err());
}
