//! Strata Client - routing to data nodes
//!
//! This crate provides:
//! - The registry contract used to discover data nodes
//! - A short-TTL node list cache with pluggable node selection
//! - [`DataClient`], which streams uploads and downloads to a chosen node

pub mod cache;
pub mod data;
pub mod registry;
pub mod selector;

// Re-exports
pub use cache::{NodeCache, ResolveError};
pub use data::{CallContext, ClientError, DataClient};
pub use registry::{Registry, RegistryError, StaticRegistry};
pub use selector::{NodeSelector, RandomSelector, RoundRobinSelector};
