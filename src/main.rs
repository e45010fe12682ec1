// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use traffic_accident::protocol::{
    BusNotifier, ChannelType, MqttBusConfig, MqttBusConnector, NodeRegistration, NodeRegistry,
};
use traffic_accident::{Config, ConnectionManager, TriggerState, UpdateProcessor, server};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::parse();
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> traffic_accident::Result<()> {
    config.validate()?;
    tracing::info!(role = %config.role, version = env!("CARGO_PKG_VERSION"), "Starting node");

    let channels = [ChannelType::JsonData];
    let registry = NodeRegistry::new(&config.nodesrv)?;
    let registration = registry.register(&config.role, &channels).await?;

    let server_address = config.server_address(&registration.server_address);
    tracing::info!(address = %server_address, "Connecting bus server");

    let connector = MqttBusConnector::new(
        MqttBusConfig::default()
            .with_client_prefix(config.role.to_lowercase())
            .with_connection_timeout(config.connect_timeout()),
    );
    let connections = Arc::new(ConnectionManager::new(
        connector,
        server_address,
        config.reconnection_policy(),
    ));
    if let Err(e) = connections.connect().await {
        unregister(&registry, &registration).await;
        return Err(e.into());
    }

    let supervisor = tokio::spawn({
        let connections = Arc::clone(&connections);
        async move { connections.supervise().await }
    });

    let notifier = BusNotifier::new(Arc::clone(&connections), channels[0], &config.role);
    let processor = Arc::new(UpdateProcessor::new(
        Arc::new(TriggerState::new(config.initial_trigger())),
        notifier,
        config.incident(),
    ));

    let result = server::serve(config.listen_addr(), processor, shutdown_signal()).await;

    supervisor.abort();
    unregister(&registry, &registration).await;
    result
}

async fn unregister(registry: &NodeRegistry, registration: &NodeRegistration) {
    if let Err(e) = registry.unregister(registration).await {
        tracing::warn!(error = %e, "Failed to unregister node");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
