use crate::context::ProviderContext;
use crate::error::{ConfigError, ProviderError};
use crate::methods::ProviderMethod;
use crate::params::ActionParams;
use crate::scopes::{ProviderScope, ScopeResults};
use alert_registry::AlertDto;
use serde_json::Value;

/// The contract every adapter implements towards the workflow engine and the
/// alert pipeline.
///
/// All calls block. Defaults cover adapters that only receive webhooks: they
/// declare no scopes and reject pull, notify and query with
/// [`ProviderError::Unsupported`].
pub trait Provider: Send + Sync {
    fn provider_type(&self) -> &'static str;

    fn context(&self) -> &ProviderContext;

    fn scopes(&self) -> &'static [ProviderScope] {
        &[]
    }

    fn methods(&self) -> &'static [ProviderMethod] {
        &[]
    }

    /// Semantic checks that go beyond field presence and types.
    fn validate_config(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Probes every declared scope. Never fails; denials are values.
    fn validate_scopes(&self) -> ScopeResults {
        ScopeResults::new()
    }

    fn get_alerts(&self) -> Result<Vec<AlertDto>, ProviderError> {
        Err(ProviderError::unsupported(self.provider_type(), "get_alerts"))
    }

    fn notify(&self, _params: &ActionParams) -> Result<Value, ProviderError> {
        Err(ProviderError::unsupported(self.provider_type(), "notify"))
    }

    fn query(&self, _params: &ActionParams) -> Result<Value, ProviderError> {
        Err(ProviderError::unsupported(self.provider_type(), "query"))
    }

    /// Releases any held client or socket.
    fn dispose(&self) {}
}
