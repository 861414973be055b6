//! Authoritative node and liveness state.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::config::RegistryConfig;
use super::error::RegistryError;
use super::types::{EncoderNode, NodeHealth, NodeRegistration};
use crate::metrics;

struct NodeEntry {
    registration: NodeRegistration,
    active: bool,
    registered_at: DateTime<Utc>,
    last_heartbeat: DateTime<Utc>,
    health: Option<NodeHealth>,
    /// Live task count. Shared with outstanding leases, so it survives
    /// re-registration; after removal the registry keeps a weak handle and
    /// hands the same counter back if the id registers again.
    running: Arc<AtomicU32>,
}

impl NodeEntry {
    fn snapshot(&self) -> EncoderNode {
        let r = &self.registration;
        EncoderNode {
            id: r.id.clone(),
            name: r.name.clone(),
            version: r.version.clone(),
            address: r.address.clone(),
            port: r.port,
            tls: r.tls,
            max_concurrent_jobs: r.max_concurrent_jobs,
            encoders: r.encoders.clone(),
            current_jobs: self.running.load(Ordering::Acquire),
            active: self.active,
            registered_at: self.registered_at,
            last_heartbeat: self.last_heartbeat,
            health: self.health.clone(),
        }
    }

    /// Increments the counter if the node still has room.
    fn try_acquire(&self) -> bool {
        let max = self.registration.max_concurrent_jobs;
        self.running
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .is_ok()
    }
}

/// One unit of a node's capacity, held while a task attempt runs.
///
/// Dropping the lease releases the slot, whichever way the attempt ended.
#[derive(Debug)]
pub struct CapacityLease {
    node: EncoderNode,
    running: Arc<AtomicU32>,
    changes: Arc<watch::Sender<u64>>,
}

impl CapacityLease {
    /// The node as it was when the slot was reserved.
    pub fn node(&self) -> &EncoderNode {
        &self.node
    }

    pub fn node_id(&self) -> &str {
        &self.node.id
    }
}

impl Drop for CapacityLease {
    fn drop(&mut self) {
        let _ = self
            .running
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        self.changes.send_modify(|v| *v = v.wrapping_add(1));
    }
}

/// Tracks encoder nodes: registration, heartbeat, capacity and liveness.
pub struct NodeRegistry {
    nodes: RwLock<HashMap<String, NodeEntry>>,
    /// Counters of removed nodes that still have leases outstanding.
    removed: Mutex<HashMap<String, Weak<AtomicU32>>>,
    clock: Arc<dyn Clock>,
    stale_threshold: chrono::Duration,
    changes: Arc<watch::Sender<u64>>,
}

impl NodeRegistry {
    pub fn new(config: &RegistryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = watch::channel(0);
        let stale_threshold = chrono::Duration::from_std(config.stale_threshold())
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
        Self {
            nodes: RwLock::new(HashMap::new()),
            removed: Mutex::new(HashMap::new()),
            clock,
            stale_threshold,
            changes: Arc::new(changes),
        }
    }

    /// Receiver that changes whenever capacity may have become available:
    /// a node registered or a lease was released.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        self.changes.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Creates or refreshes a node and marks it active.
    pub async fn register(&self, registration: NodeRegistration) -> Result<EncoderNode, RegistryError> {
        if registration.id.trim().is_empty() {
            return Err(RegistryError::invalid("node id must not be empty"));
        }
        if registration.max_concurrent_jobs == 0 {
            return Err(RegistryError::invalid("max_concurrent_jobs must be at least 1"));
        }

        let now = self.clock.now();
        let snapshot = {
            let mut nodes = self.nodes.write().await;
            let id = registration.id.clone();
            match nodes.get_mut(&id) {
                Some(entry) => {
                    if !entry.active {
                        info!(node_id = %id, "Node reactivated");
                    } else {
                        debug!(node_id = %id, "Node re-registered");
                    }
                    entry.registration = registration;
                    entry.active = true;
                    entry.registered_at = now;
                    entry.last_heartbeat = now;
                    entry.snapshot()
                }
                None => {
                    info!(
                        node_id = %id,
                        name = %registration.name,
                        max_concurrent_jobs = registration.max_concurrent_jobs,
                        "Node registered"
                    );
                    let running = self
                        .removed
                        .lock()
                        .await
                        .remove(&id)
                        .and_then(|weak| weak.upgrade())
                        .unwrap_or_else(|| Arc::new(AtomicU32::new(0)));
                    let entry = NodeEntry {
                        registration,
                        active: true,
                        registered_at: now,
                        last_heartbeat: now,
                        health: None,
                        running,
                    };
                    let snapshot = entry.snapshot();
                    nodes.insert(id, entry);
                    snapshot
                }
            }
        };

        metrics::NODE_REGISTRATIONS.inc();
        self.update_active_gauge().await;
        self.notify();
        Ok(snapshot)
    }

    /// Records a heartbeat. Does not reactivate an inactive node; the node
    /// sees `active: false` in the reply and registers again.
    pub async fn heartbeat(&self, id: &str, health: Option<NodeHealth>) -> Result<EncoderNode, RegistryError> {
        let now = self.clock.now();
        let mut nodes = self.nodes.write().await;
        let entry = nodes.get_mut(id).ok_or_else(|| RegistryError::unknown_node(id))?;

        entry.last_heartbeat = entry.last_heartbeat.max(now);
        if let Some(report) = health {
            let newer = entry
                .health
                .as_ref()
                .is_none_or(|current| report.timestamp >= current.timestamp);
            if newer {
                entry.health = Some(report);
            } else {
                debug!(node_id = %id, "Ignoring out-of-order health report");
            }
        }
        Ok(entry.snapshot())
    }

    /// Marks a node inactive. Running tasks keep their leases.
    pub async fn deregister(&self, id: &str) -> Result<EncoderNode, RegistryError> {
        let snapshot = {
            let mut nodes = self.nodes.write().await;
            let entry = nodes.get_mut(id).ok_or_else(|| RegistryError::unknown_node(id))?;
            entry.active = false;
            entry.snapshot()
        };
        info!(node_id = %id, "Node deregistered");
        self.update_active_gauge().await;
        Ok(snapshot)
    }

    /// Forgets a node. Tasks still running on it keep counting against
    /// its capacity if the same id registers again.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut nodes = self.nodes.write().await;
            match nodes.remove(id) {
                Some(entry) => {
                    let mut detached = self.removed.lock().await;
                    detached.retain(|_, weak| weak.strong_count() > 0);
                    if Arc::strong_count(&entry.running) > 1 {
                        detached.insert(id.to_string(), Arc::downgrade(&entry.running));
                    }
                    true
                }
                None => false,
            }
        };
        if removed {
            info!(node_id = %id, "Node removed");
            self.update_active_gauge().await;
        }
        removed
    }

    pub async fn get(&self, id: &str) -> Option<EncoderNode> {
        self.nodes.read().await.get(id).map(NodeEntry::snapshot)
    }

    /// All known nodes, by id.
    pub async fn list(&self) -> Vec<EncoderNode> {
        let mut nodes: Vec<EncoderNode> = self.nodes.read().await.values().map(NodeEntry::snapshot).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// `max(0, max_concurrent_jobs - current_jobs)`.
    pub async fn available_capacity(&self, id: &str) -> Result<u32, RegistryError> {
        self.nodes
            .read()
            .await
            .get(id)
            .map(|e| e.snapshot().available_capacity())
            .ok_or_else(|| RegistryError::unknown_node(id))
    }

    /// Best active node that accepts `encoder` and has spare capacity:
    /// most spare capacity first, then most recent heartbeat.
    pub async fn select_node(&self, encoder: &str) -> Option<EncoderNode> {
        let nodes = self.nodes.read().await;
        candidates(&nodes, encoder).into_iter().next().map(NodeEntry::snapshot)
    }

    /// Atomically selects a node for `encoder` and takes one of its slots.
    ///
    /// Concurrent callers never oversubscribe a node: if the preferred node
    /// fills up between selection and increment, the next candidate is tried.
    pub async fn try_reserve(&self, encoder: &str) -> Option<CapacityLease> {
        let nodes = self.nodes.read().await;
        for entry in candidates(&nodes, encoder) {
            if entry.try_acquire() {
                let node = entry.snapshot();
                debug!(node_id = %node.id, encoder, current_jobs = node.current_jobs, "Capacity reserved");
                return Some(CapacityLease {
                    node,
                    running: Arc::clone(&entry.running),
                    changes: Arc::clone(&self.changes),
                });
            }
        }
        None
    }

    /// Marks active nodes whose last heartbeat is older than the stale
    /// threshold as inactive. Returns their ids.
    pub async fn sweep_stale(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut stale = Vec::new();
        {
            let mut nodes = self.nodes.write().await;
            for (id, entry) in nodes.iter_mut() {
                if entry.active && now - entry.last_heartbeat > self.stale_threshold {
                    entry.active = false;
                    warn!(
                        node_id = %id,
                        last_heartbeat = %entry.last_heartbeat,
                        "Node missed heartbeats, marking inactive"
                    );
                    stale.push(id.clone());
                }
            }
        }
        if !stale.is_empty() {
            metrics::NODES_MARKED_STALE.inc_by(stale.len() as u64);
            self.update_active_gauge().await;
        }
        stale.sort();
        stale
    }

    /// Runs [`sweep_stale`](Self::sweep_stale) every `interval` until
    /// `shutdown` fires.
    pub async fn run_sweeper(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!("Stale sweep stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep_stale().await;
                }
            }
        }
    }

    /// `(active, inactive)` node counts.
    pub async fn counts(&self) -> (usize, usize) {
        let nodes = self.nodes.read().await;
        let active = nodes.values().filter(|e| e.active).count();
        (active, nodes.len() - active)
    }

    async fn update_active_gauge(&self) {
        let (active, _) = self.counts().await;
        metrics::NODES_ACTIVE.set(active as i64);
    }
}

fn candidates<'a>(nodes: &'a HashMap<String, NodeEntry>, encoder: &str) -> Vec<&'a NodeEntry> {
    let mut eligible: Vec<(&NodeEntry, u32)> = nodes
        .values()
        .filter(|e| e.active)
        .filter_map(|e| {
            let snapshot = e.snapshot();
            let spare = snapshot.available_capacity();
            (spare > 0 && snapshot.accepts(encoder)).then_some((e, spare))
        })
        .collect();
    eligible.sort_by(|(a, spare_a), (b, spare_b)| {
        spare_b
            .cmp(spare_a)
            .then(b.last_heartbeat.cmp(&a.last_heartbeat))
            .then(a.registration.id.cmp(&b.registration.id))
    });
    eligible.into_iter().map(|(e, _)| e).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ManualClock;

    fn registry() -> (NodeRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = RegistryConfig {
            heartbeat_interval_secs: 10,
            stale_threshold_secs: Some(30),
            sweep_interval_secs: None,
        };
        (NodeRegistry::with_clock(&config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_register_and_capacity() {
        let (registry, _) = registry();
        let node = registry.register(NodeRegistration::new("n1", 2)).await.unwrap();
        assert!(node.active);
        assert_eq!(node.current_jobs, 0);
        assert_eq!(registry.available_capacity("n1").await.unwrap(), 2);

        let a = registry.try_reserve("libx264").await.unwrap();
        let b = registry.try_reserve("libx264").await.unwrap();
        assert_eq!(a.node_id(), "n1");
        assert_eq!(registry.available_capacity("n1").await.unwrap(), 0);
        assert!(registry.try_reserve("libx264").await.is_none());
        assert!(registry.select_node("libx264").await.is_none());

        drop(a);
        assert_eq!(registry.available_capacity("n1").await.unwrap(), 1);
        drop(b);
        assert_eq!(registry.get("n1").await.unwrap().current_jobs, 0);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let (registry, _) = registry();
        assert!(registry.register(NodeRegistration::new("", 1)).await.is_err());
        assert!(registry.register(NodeRegistration::new("n", 0)).await.is_err());
    }

    #[tokio::test]
    async fn test_heartbeat_unknown_node() {
        let (registry, _) = registry();
        let err = registry.heartbeat("ghost", None).await.unwrap_err();
        assert_eq!(err, RegistryError::unknown_node("ghost"));
    }

    #[tokio::test]
    async fn test_select_prefers_spare_then_recent() {
        let (registry, clock) = registry();
        registry.register(NodeRegistration::new("small", 1)).await.unwrap();
        registry.register(NodeRegistration::new("big", 4)).await.unwrap();
        assert_eq!(registry.select_node("libx264").await.unwrap().id, "big");

        registry.register(NodeRegistration::new("big2", 4)).await.unwrap();
        clock.advance(chrono::Duration::seconds(5));
        registry.heartbeat("big", None).await.unwrap();
        assert_eq!(registry.select_node("libx264").await.unwrap().id, "big");
    }

    #[tokio::test]
    async fn test_select_respects_encoders() {
        let (registry, _) = registry();
        registry
            .register(NodeRegistration::new("gpu", 1).with_encoders(["h264_nvenc"]))
            .await
            .unwrap();
        registry
            .register(NodeRegistration::new("cpu", 1).with_encoders(["libx264", "aac"]))
            .await
            .unwrap();
        assert_eq!(registry.select_node("h264_nvenc").await.unwrap().id, "gpu");
        assert_eq!(registry.select_node("aac").await.unwrap().id, "cpu");
        assert!(registry.select_node("libsvtav1").await.is_none());
    }

    #[tokio::test]
    async fn test_stale_sweep_and_reactivation() {
        let (registry, clock) = registry();
        registry.register(NodeRegistration::new("n1", 2)).await.unwrap();

        clock.advance(chrono::Duration::seconds(30));
        assert!(registry.sweep_stale().await.is_empty());

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(registry.sweep_stale().await, vec!["n1".to_string()]);
        let node = registry.get("n1").await.unwrap();
        assert!(!node.active);
        assert!(registry.select_node("libx264").await.is_none());

        // Heartbeat alone keeps it inactive
        let node = registry.heartbeat("n1", None).await.unwrap();
        assert!(!node.active);

        let node = registry.register(NodeRegistration::new("n1", 2)).await.unwrap();
        assert!(node.active);
        assert_eq!(registry.counts().await, (1, 0));
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_latest() {
        let (registry, clock) = registry();
        registry.register(NodeRegistration::new("n1", 1)).await.unwrap();
        let t0 = clock.now();

        clock.advance(chrono::Duration::seconds(10));
        let mut newer = NodeHealth::at(t0 + chrono::Duration::seconds(10));
        newer.cpu_percent = 80.0;
        registry.heartbeat("n1", Some(newer)).await.unwrap();

        // A delayed report from earlier must not overwrite newer state.
        let mut older = NodeHealth::at(t0 + chrono::Duration::seconds(5));
        older.cpu_percent = 10.0;
        clock.set(t0 + chrono::Duration::seconds(6));
        let node = registry.heartbeat("n1", Some(older)).await.unwrap();

        assert_eq!(node.health.unwrap().cpu_percent, 80.0);
        assert_eq!(node.last_heartbeat, t0 + chrono::Duration::seconds(10));
    }

    #[tokio::test]
    async fn test_reregister_keeps_live_counter() {
        let (registry, _) = registry();
        registry.register(NodeRegistration::new("n1", 2)).await.unwrap();
        let lease = registry.try_reserve("libx264").await.unwrap();

        let node = registry.register(NodeRegistration::new("n1", 2)).await.unwrap();
        assert_eq!(node.current_jobs, 1);
        drop(lease);
        assert_eq!(registry.available_capacity("n1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_deregister_and_remove() {
        let (registry, _) = registry();
        registry.register(NodeRegistration::new("n1", 1)).await.unwrap();
        let node = registry.deregister("n1").await.unwrap();
        assert!(!node.active);
        assert_eq!(registry.counts().await, (0, 1));
        assert!(registry.remove("n1").await);
        assert!(!registry.remove("n1").await);
        assert!(registry.get("n1").await.is_none());
    }

    #[tokio::test]
    async fn test_remove_with_lease_outstanding_keeps_counter() {
        let (registry, _) = registry();
        registry.register(NodeRegistration::new("n1", 1)).await.unwrap();
        let lease = registry.try_reserve("libx264").await.unwrap();

        assert!(registry.remove("n1").await);
        let node = registry.register(NodeRegistration::new("n1", 1)).await.unwrap();
        assert_eq!(node.current_jobs, 1);
        assert!(registry.try_reserve("libx264").await.is_none());

        drop(lease);
        assert!(registry.try_reserve("libx264").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_without_leases_starts_fresh() {
        let (registry, _) = registry();
        registry.register(NodeRegistration::new("n1", 1)).await.unwrap();
        drop(registry.try_reserve("libx264").await.unwrap());

        assert!(registry.remove("n1").await);
        assert!(registry.removed.lock().await.is_empty());
        let node = registry.register(NodeRegistration::new("n1", 1)).await.unwrap();
        assert_eq!(node.current_jobs, 0);
    }

    #[tokio::test]
    async fn test_reregister_with_lower_capacity_while_busy() {
        let (registry, _) = registry();
        registry.register(NodeRegistration::new("n1", 3)).await.unwrap();
        let a = registry.try_reserve("libx264").await.unwrap();
        let b = registry.try_reserve("libx264").await.unwrap();
        let c = registry.try_reserve("libx264").await.unwrap();

        let node = registry.register(NodeRegistration::new("n1", 1)).await.unwrap();
        assert_eq!(node.current_jobs, 3);
        assert_eq!(node.available_capacity(), 0);
        assert_eq!(registry.available_capacity("n1").await.unwrap(), 0);
        assert!(registry.select_node("libx264").await.is_none());
        assert!(registry.try_reserve("libx264").await.is_none());

        drop(a);
        drop(b);
        // Still at the new limit of one.
        assert_eq!(registry.available_capacity("n1").await.unwrap(), 0);
        assert!(registry.try_reserve("libx264").await.is_none());

        drop(c);
        assert_eq!(registry.available_capacity("n1").await.unwrap(), 1);
        let d = registry.try_reserve("libx264").await.unwrap();
        assert!(registry.try_reserve("libx264").await.is_none());
        drop(d);
    }

    #[tokio::test]
    async fn test_concurrent_reserve_never_oversubscribes() {
        let (registry, _) = registry();
        registry.register(NodeRegistration::new("n1", 3)).await.unwrap();
        let registry = Arc::new(registry);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.try_reserve("libx264").await }));
        }
        let mut leases = Vec::new();
        for handle in handles {
            if let Some(lease) = handle.await.unwrap() {
                leases.push(lease);
            }
        }
        assert_eq!(leases.len(), 3);
        assert_eq!(registry.available_capacity("n1").await.unwrap(), 0);
        leases.clear();
        assert_eq!(registry.available_capacity("n1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_changes_signal_on_release() {
        let (registry, _) = registry();
        registry.register(NodeRegistration::new("n1", 1)).await.unwrap();
        let mut changes = registry.subscribe_changes();
        changes.borrow_and_update();

        let lease = registry.try_reserve("libx264").await.unwrap();
        assert!(!changes.has_changed().unwrap());
        drop(lease);
        assert!(changes.has_changed().unwrap());
    }
}
