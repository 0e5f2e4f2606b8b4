//! Service registry contract
//!
//! The registry is a black box answering "which nodes currently serve this
//! role". Membership and health checking happen on its side.

use async_trait::async_trait;
use parking_lot::RwLock;
use strata_common::RegistryNode;
use thiserror::Error;

/// Registry query failures
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("registry error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Announce a node
    async fn register(&self, node: RegistryNode) -> Result<(), RegistryError>;

    /// Nodes currently eligible for `role`; an empty list is not an error
    async fn nodes_for_role(&self, role: &str) -> Result<Vec<RegistryNode>, RegistryError>;
}

/// In-memory registry seeded from configuration.
///
/// An empty `StaticRegistry` answers every query with no nodes.
#[derive(Default)]
pub struct StaticRegistry {
    nodes: RwLock<Vec<RegistryNode>>,
}

impl StaticRegistry {
    #[must_use]
    pub fn new(nodes: Vec<RegistryNode>) -> Self {
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Registry holding one node per URL, all tagged with `role`
    pub fn from_urls<I, S>(role: &str, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            urls.into_iter()
                .map(|url| RegistryNode::new(role, url))
                .collect(),
        )
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn register(&self, node: RegistryNode) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.write();
        if !nodes.contains(&node) {
            nodes.push(node);
        }
        Ok(())
    }

    async fn nodes_for_role(&self, role: &str) -> Result<Vec<RegistryNode>, RegistryError> {
        Ok(self
            .nodes
            .read()
            .iter()
            .filter(|n| n.role == role)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = StaticRegistry::default();
        assert!(registry.nodes_for_role("data-node").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filter_by_role_and_register() {
        let registry = StaticRegistry::from_urls("data-node", ["http://a:1", "http://b:1/"]);
        registry
            .register(RegistryNode::new("meta-node", "http://m:1"))
            .await
            .unwrap();
        registry
            .register(RegistryNode::new("data-node", "http://a:1"))
            .await
            .unwrap();

        let nodes = registry.nodes_for_role("data-node").await.unwrap();
        let urls: Vec<_> = nodes.iter().map(|n| n.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a:1", "http://b:1"]);
        assert_eq!(registry.nodes_for_role("meta-node").await.unwrap().len(), 1);
    }
}
