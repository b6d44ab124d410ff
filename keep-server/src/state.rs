use alert_registry::AlertDto;
use provider_core::{ConfigError, Provider, ProviderConfig};
use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Configured provider instances, keyed by provider id.
#[derive(Clone, Default)]
pub struct Instances {
    by_id: BTreeMap<String, Arc<dyn Provider>>,
}

impl Instances {
    /// Builds every configured instance. The first invalid configuration
    /// aborts loading and is returned with its provider id.
    pub fn load(
        tenant_id: &str,
        configs: &[ProviderConfig],
    ) -> Result<Self, (String, ConfigError)> {
        let mut instances = Self::default();
        for config in configs {
            let provider = providers::build_provider(tenant_id, config)
                .map_err(|err| (config.id.clone(), err))?;
            instances.insert(provider);
        }
        Ok(instances)
    }

    pub fn insert(&mut self, provider: Box<dyn Provider>) {
        let id = provider.context().provider_id.clone();
        self.by_id.insert(id, Arc::from(provider));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Releases every instance's clients. Call from a blocking context.
    pub fn dispose_all(&self) {
        for provider in self.by_id.values() {
            provider.dispose();
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub tenant_id: String,
    pub instances: Arc<Instances>,
    /// Formatted webhook alerts are handed to this collector.
    pub collector: Sender<AlertDto>,
}

impl AppState {
    pub fn new(
        tenant_id: impl Into<String>,
        instances: Arc<Instances>,
        collector: Sender<AlertDto>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            instances,
            collector,
        }
    }
}
