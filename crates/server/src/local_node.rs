//! Registers the host process as an encoder node and keeps it fresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use encodefleet_core::{
    EncoderNode, LocalNodeConfig, NodeHealth, NodeRegistration,
    NodeRegistry, RegistryError,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub fn registration(config: &LocalNodeConfig) -> NodeRegistration {
    let mut registration = NodeRegistration::new(&config.id, config.max_concurrent_jobs)
        .with_encoders(config.encoders.iter().cloned());
    registration.name = config.name.clone();
    registration.version = env!("CARGO_PKG_VERSION").to_string();
    registration
}

pub async fn register(
    registry: &NodeRegistry,
    config: &LocalNodeConfig,
) -> Result<EncoderNode, RegistryError> {
    let node = registry.register(registration(config)).await?;
    info!(
        node_id = %node.id,
        max_concurrent_jobs = node.max_concurrent_jobs,
        encoders = ?node.encoders,
        "Registered local encoder node"
    );
    Ok(node)
}

/// Sends a heartbeat every `interval` until shutdown. Registers again
/// whenever the registry reports the node unknown or inactive.
pub async fn run_heartbeat(
    registry: Arc<NodeRegistry>,
    config: LocalNodeConfig,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!(node_id = %config.id, "Local heartbeat stopped");
                return;
            }
            _ = ticker.tick() => {
                let mut health = NodeHealth::at(Utc::now());
                if let Some(node) = registry.get(&config.id).await {
                    health.active_jobs = node.current_jobs;
                }

                let needs_registration = match registry.heartbeat(&config.id, Some(health)).await {
                    Ok(node) => !node.active,
                    Err(RegistryError::UnknownNode { .. }) => true,
                    Err(e) => {
                        warn!(node_id = %config.id, error = %e, "Local heartbeat failed");
                        false
                    }
                };
                if needs_registration {
                    if let Err(e) = register(&registry, &config).await {
                        warn!(node_id = %config.id, error = %e, "Failed to re-register local node");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encodefleet_core::RegistryConfig;

    fn local_config() -> LocalNodeConfig {
        LocalNodeConfig {
            enabled: true,
            id: "host".to_string(),
            name: "Host encoder".to_string(),
            max_concurrent_jobs: 3,
            encoders: vec!["h264".to_string()],
        }
    }

    #[test]
    fn test_registration_from_config() {
        let reg = registration(&local_config());
        assert_eq!(reg.id, "host");
        assert_eq!(reg.name, "Host encoder");
        assert_eq!(reg.max_concurrent_jobs, 3);
        assert_eq!(reg.encoders, vec!["h264".to_string()]);
        assert!(!reg.version.is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_reregisters_inactive_node() {
        let registry = Arc::new(NodeRegistry::new(&RegistryConfig::default()));
        register(&registry, &local_config()).await.unwrap();
        registry.deregister("host").await.unwrap();

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_heartbeat(
            Arc::clone(&registry),
            local_config(),
            Duration::from_millis(20),
            rx,
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        let node = registry.get("host").await.unwrap();
        assert!(node.active);
        assert!(node.health.is_some());
    }
}
