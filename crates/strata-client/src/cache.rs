//! Node list cache
//!
//! Keeps one node list per role for a fixed TTL so that file operations do
//! not hit the registry every time. Concurrent refreshes of the same role are
//! not deduplicated; the last writer wins.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_common::RegistryNode;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::registry::{Registry, RegistryError};
use crate::selector::NodeSelector;

/// Failures resolving a role into a node URL
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("there are no {role} nodes alive")]
    NoNodesAvailable { role: String },

    #[error("registry query failed: {0}")]
    Registry(#[from] RegistryError),
}

struct CacheEntry {
    nodes: Arc<[RegistryNode]>,
    expires_at: Instant,
}

/// Registry-backed, time-bounded node list cache
pub struct NodeCache {
    registry: Arc<dyn Registry>,
    selector: Arc<dyn NodeSelector>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl NodeCache {
    /// Default time a node list is served before the registry is asked again
    pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

    pub fn new(registry: Arc<dyn Registry>, selector: Arc<dyn NodeSelector>) -> Self {
        Self {
            registry,
            selector,
            ttl: Self::DEFAULT_TTL,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Pick a node for `role` and return its data endpoint (`<url>/data`)
    pub async fn resolve(&self, role: &str) -> Result<String, ResolveError> {
        let nodes = self.nodes(role).await?;
        let chosen = self
            .selector
            .select(&nodes)
            .ok_or_else(|| ResolveError::NoNodesAvailable {
                role: role.to_string(),
            })?;
        debug!(role, node_url = %chosen.url, "data node chosen");
        Ok(format!("{}/data", chosen.url))
    }

    /// Node list for `role`, from cache while fresh, else from the registry
    pub async fn nodes(&self, role: &str) -> Result<Arc<[RegistryNode]>, ResolveError> {
        if let Some(nodes) = self.cached(role) {
            debug!(role, count = nodes.len(), "nodes obtained from cache");
            return Ok(nodes);
        }

        let nodes = self.registry.nodes_for_role(role).await?;
        if nodes.is_empty() {
            return Err(ResolveError::NoNodesAvailable {
                role: role.to_string(),
            });
        }
        info!(role, count = nodes.len(), "nodes obtained from registry");

        let nodes: Arc<[RegistryNode]> = nodes.into();
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            role.to_string(),
            CacheEntry {
                nodes: Arc::clone(&nodes),
                expires_at: now + self.ttl,
            },
        );
        Ok(nodes)
    }

    fn cached(&self, role: &str) -> Option<Arc<[RegistryNode]>> {
        let entries = self.entries.read();
        entries
            .get(role)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| Arc::clone(&entry.nodes))
    }

    /// Drop expired entries, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of entries currently held, expired or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;
    use crate::selector::{RandomSelector, RoundRobinSelector};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Registry counting how often it is queried
    struct CountingRegistry {
        inner: StaticRegistry,
        queries: AtomicUsize,
    }

    impl CountingRegistry {
        fn new(urls: &[&str]) -> Self {
            Self {
                inner: StaticRegistry::from_urls("data-node", urls.iter().copied()),
                queries: AtomicUsize::new(0),
            }
        }

        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Registry for CountingRegistry {
        async fn register(&self, node: RegistryNode) -> Result<(), RegistryError> {
            self.inner.register(node).await
        }

        async fn nodes_for_role(&self, role: &str) -> Result<Vec<RegistryNode>, RegistryError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.nodes_for_role(role).await
        }
    }

    struct FailingRegistry;

    #[async_trait]
    impl Registry for FailingRegistry {
        async fn register(&self, _node: RegistryNode) -> Result<(), RegistryError> {
            Err(RegistryError::Unavailable("connection refused".into()))
        }

        async fn nodes_for_role(&self, _role: &str) -> Result<Vec<RegistryNode>, RegistryError> {
            Err(RegistryError::Unavailable("connection refused".into()))
        }
    }

    fn cache_over(registry: Arc<dyn Registry>) -> NodeCache {
        NodeCache::new(registry, Arc::new(RandomSelector::seeded(3)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_hits_within_ttl_do_not_query() {
        let registry = Arc::new(CountingRegistry::new(&["http://a:9002", "http://b:9002"]));
        let cache = cache_over(registry.clone());

        for _ in 0..5 {
            let url = cache.resolve("data-node").await.unwrap();
            assert!(url == "http://a:9002/data" || url == "http://b:9002/data");
        }
        tokio::time::advance(Duration::from_secs(9)).await;
        cache.resolve("data-node").await.unwrap();
        assert_eq!(registry.queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_triggers_exactly_one_query() {
        let registry = Arc::new(CountingRegistry::new(&["http://a:9002"]));
        let cache = cache_over(registry.clone());

        cache.resolve("data-node").await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        cache.resolve("data-node").await.unwrap();
        cache.resolve("data-node").await.unwrap();
        assert_eq!(registry.queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_does_not_extend_expiry() {
        let registry = Arc::new(CountingRegistry::new(&["http://a:9002"]));
        let cache = cache_over(registry.clone());

        cache.resolve("data-node").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.resolve("data-node").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.resolve("data-node").await.unwrap();
        assert_eq!(registry.queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_expired_entries() {
        let registry = Arc::new(CountingRegistry::new(&["http://a:9002"]));
        registry
            .register(RegistryNode::new("meta-node", "http://m:9001"))
            .await
            .unwrap();
        let cache = cache_over(registry).with_ttl(Duration::from_secs(2));

        cache.resolve("data-node").await.unwrap();
        cache.resolve("meta-node").await.unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.sweep(), 0);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(cache.sweep(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_no_nodes_is_distinct_from_registry_failure() {
        let cache = cache_over(Arc::new(StaticRegistry::default()));
        let err = cache.resolve("data-node").await.unwrap_err();
        assert!(matches!(err, ResolveError::NoNodesAvailable { ref role } if role == "data-node"));
        assert!(cache.is_empty());

        let cache = cache_over(Arc::new(FailingRegistry));
        let err = cache.resolve("data-node").await.unwrap_err();
        assert!(matches!(err, ResolveError::Registry(RegistryError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_empty_answer_is_not_cached() {
        let registry = Arc::new(CountingRegistry::new(&[]));
        let cache = cache_over(registry.clone());
        assert!(cache.resolve("data-node").await.is_err());

        registry
            .register(RegistryNode::new("data-node", "http://late:9002"))
            .await
            .unwrap();
        assert_eq!(
            cache.resolve("data-node").await.unwrap(),
            "http://late:9002/data"
        );
        assert_eq!(registry.queries(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolves() {
        let registry = Arc::new(CountingRegistry::new(&["http://a:9002", "http://b:9002"]));
        let cache = Arc::new(NodeCache::new(
            registry.clone(),
            Arc::new(RoundRobinSelector::new()),
        ));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.resolve("data-node").await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        // simultaneous misses may each query; afterwards the list is cached
        let after_burst = registry.queries();
        assert!(after_burst >= 1);
        cache.resolve("data-node").await.unwrap();
        assert_eq!(registry.queries(), after_burst);
        assert_eq!(cache.len(), 1);
    }
}
