//! Concrete provider adapters and the registry that names them.

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod kapacitor;
pub mod keep;
pub mod prometheus;
pub mod registry;
pub mod servicenow;
pub mod slack;

pub use registry::{build_provider, catalog, find, ProviderInfo, ProviderKind, PROVIDERS};
