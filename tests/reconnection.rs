// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconnection behaviour seen through the publish path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use traffic_accident::protocol::{BusConnector, BusHandle, BusNotifier, ChannelType, Notifier};
use traffic_accident::{
    ConnectionManager, IncidentDetails, Payload, ProtocolError, ReconnectionPolicy, StatusUpdate,
    TriggerState, UpdateProcessor,
};

/// In-memory bus server that can be taken down and brought back.
#[derive(Default)]
struct FakeServer {
    down: AtomicBool,
    connections: AtomicUsize,
    published: Mutex<Vec<(usize, String)>>,
}

struct FakeHandle {
    id: usize,
    server: Arc<FakeServer>,
    alive: watch::Sender<bool>,
}

impl BusHandle for FakeHandle {
    fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    async fn closed(&self) {
        let mut rx = self.alive.subscribe();
        let _ = rx.wait_for(|alive| !*alive).await;
    }

    fn close(&self) {
        self.alive.send_replace(false);
    }

    async fn publish(&self, _topic: &str, json: &str) -> Result<(), ProtocolError> {
        if !self.is_alive() {
            return Err(ProtocolError::ConnectionFailed("closed".to_string()));
        }
        self.server.published.lock().push((self.id, json.to_string()));
        Ok(())
    }
}

#[derive(Clone)]
struct FakeConnector(Arc<FakeServer>);

impl BusConnector for FakeConnector {
    type Handle = FakeHandle;

    async fn connect(&self, _address: &str) -> Result<FakeHandle, ProtocolError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.0.down.load(Ordering::SeqCst) {
            return Err(ProtocolError::ConnectionFailed("server down".to_string()));
        }
        let id = self.0.connections.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle {
            id,
            server: Arc::clone(&self.0),
            alive: watch::Sender::new(true),
        })
    }
}

struct Node {
    server: Arc<FakeServer>,
    connections: Arc<ConnectionManager<FakeConnector>>,
    processor: UpdateProcessor<BusNotifier<FakeConnector>>,
}

async fn start_node() -> Node {
    let server = Arc::new(FakeServer::default());
    let connections = Arc::new(ConnectionManager::new(
        FakeConnector(Arc::clone(&server)),
        "127.0.0.1:10000",
        ReconnectionPolicy::default(),
    ));
    connections.connect().await.unwrap();

    let notifier = BusNotifier::new(
        Arc::clone(&connections),
        ChannelType::JsonData,
        "TrafficAccident",
    );
    let processor = UpdateProcessor::new(
        Arc::new(TriggerState::default()),
        notifier,
        IncidentDetails::default(),
    );

    Node {
        server,
        connections,
        processor,
    }
}

#[tokio::test(start_paused = true)]
async fn updates_are_answered_while_disconnected() {
    let node = start_node().await;
    node.server.down.store(true, Ordering::SeqCst);

    let reconnect = tokio::spawn({
        let connections = Arc::clone(&node.connections);
        async move { connections.report_failure().await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(!node.processor.notifier().is_ready());
    let status = node.processor.process(&StatusUpdate::new("2", "37")).await;
    assert!(status.acc_flg);
    assert!(node.server.published.lock().is_empty());

    reconnect.await.unwrap();
    assert!(node.connections.current_handle().is_none());
}

#[tokio::test(start_paused = true)]
async fn publishing_resumes_after_reconnection() {
    let node = start_node().await;

    node.processor.process(&StatusUpdate::new("9", "1")).await;

    node.connections.report_failure().await;
    node.processor.process(&StatusUpdate::new("2", "37")).await;

    let published = node.server.published.lock();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0], (0, r#"{"TrafficAccident":null}"#.to_string()));
    assert_eq!(published[1].0, 1);
    assert!(published[1].1.contains("人身事故"));
}

#[tokio::test(start_paused = true)]
async fn many_concurrent_reporters_share_one_new_handle() {
    let node = start_node().await;

    let reporters: Vec<_> = (0..50)
        .map(|_| {
            let connections = Arc::clone(&node.connections);
            tokio::spawn(async move { connections.report_failure().await })
        })
        .collect();
    for reporter in reporters {
        reporter.await.unwrap();
    }

    assert_eq!(node.server.connections.load(Ordering::SeqCst), 2);
    let handle = node.connections.current_handle().unwrap();
    assert_eq!(handle.id, 1);
    assert!(handle.is_alive());
}

#[tokio::test(start_paused = true)]
async fn supervisor_recovers_after_outage() {
    let node = start_node().await;
    let supervisor = tokio::spawn({
        let connections = Arc::clone(&node.connections);
        async move { connections.supervise().await }
    });

    // Kill the session while the server refuses new connections.
    node.server.down.store(true, Ordering::SeqCst);
    node.connections
        .current_handle()
        .unwrap()
        .alive
        .send_replace(false);

    // Several fixed-delay attempts fail.
    tokio::time::sleep(Duration::from_secs(16)).await;
    assert!(node.connections.current_handle().is_none());

    node.server.down.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(node.connections.is_connected());

    let result = node.processor.notifier().notify(&Payload::Empty).await;
    assert!(result.is_ok());

    supervisor.abort();
}
