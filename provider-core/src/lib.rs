//! The provider contract shared by every adapter.
//!
//! Leaves first: auth-config schemas ([`config`]), HTTP helpers ([`http`]),
//! the static formatter ([`formatter`]) and the [`Provider`] trait that ties
//! pull, notify and query together. Queue-backed adapters add the blocking
//! [`consumer`] loop.

pub mod config;
pub mod consumer;
pub mod context;
pub mod error;
pub mod formatter;
pub mod http;
pub mod methods;
pub mod params;
pub mod provider;
pub mod scopes;

pub use alert_registry::{AlertDto, AlertSeverity, AlertStatus};
pub use config::{AuthConfig, AuthField, ConfigValue, FieldKind, ProviderConfig, RawConfig};
pub use context::ProviderContext;
pub use error::{ConfigError, ProviderError};
pub use formatter::{AlertFormatter, FormatFn, FormattedAlerts};
pub use methods::{Effect, MethodEntry, ProviderMethod};
pub use params::ActionParams;
pub use provider::Provider;
pub use scopes::{ProviderScope, ScopeResults, ScopeStatus};

#[cfg(feature = "derive")]
pub use provider_config_derive::AuthConfig;
