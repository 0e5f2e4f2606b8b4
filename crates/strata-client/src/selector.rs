//! Node selection strategies
//!
//! A selector picks one node out of a cached list. The random strategy has no
//! health or latency signal and relies on the registry listing only eligible
//! nodes.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use strata_common::RegistryNode;

pub trait NodeSelector: Send + Sync {
    /// Pick one of `nodes`; `None` only when the slice is empty
    fn select<'a>(&self, nodes: &'a [RegistryNode]) -> Option<&'a RegistryNode>;
}

/// Uniformly random pick, from a generator owned by the selector
pub struct RandomSelector {
    rng: Mutex<StdRng>,
}

impl RandomSelector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence, for tests and reproducible runs
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeSelector for RandomSelector {
    fn select<'a>(&self, nodes: &'a [RegistryNode]) -> Option<&'a RegistryNode> {
        if nodes.is_empty() {
            return None;
        }
        let index = self.rng.lock().gen_range(0..nodes.len());
        nodes.get(index)
    }
}

/// Cycles through the list in order
#[derive(Default)]
pub struct RoundRobinSelector {
    next: AtomicUsize,
}

impl RoundRobinSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeSelector for RoundRobinSelector {
    fn select<'a>(&self, nodes: &'a [RegistryNode]) -> Option<&'a RegistryNode> {
        if nodes.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % nodes.len();
        nodes.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn nodes(n: usize) -> Vec<RegistryNode> {
        (0..n)
            .map(|i| RegistryNode::new("data-node", format!("http://node-{i}:9002")))
            .collect()
    }

    #[test]
    fn test_empty_list() {
        assert!(RandomSelector::seeded(1).select(&[]).is_none());
        assert!(RoundRobinSelector::new().select(&[]).is_none());
    }

    #[test]
    fn test_random_covers_all_nodes() {
        let nodes = nodes(4);
        let selector = RandomSelector::seeded(7);
        let seen: HashSet<_> = (0..200)
            .map(|_| selector.select(&nodes).unwrap().url.clone())
            .collect();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let nodes = nodes(10);
        let a = RandomSelector::seeded(42);
        let b = RandomSelector::seeded(42);
        for _ in 0..20 {
            assert_eq!(a.select(&nodes), b.select(&nodes));
        }
    }

    #[test]
    fn test_round_robin_order() {
        let nodes = nodes(3);
        let selector = RoundRobinSelector::new();
        let picked: Vec<_> = (0..4)
            .map(|_| selector.select(&nodes).unwrap().url.clone())
            .collect();
        assert_eq!(
            picked,
            vec![
                "http://node-0:9002",
                "http://node-1:9002",
                "http://node-2:9002",
                "http://node-0:9002"
            ]
        );
    }
}
