use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity a provider instance carries through every call: which tenant it
/// belongs to and which configured instance it is. Formatters receive it
/// explicitly and stamp it onto the alerts they build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderContext {
    pub tenant_id: String,
    pub provider_id: String,
    pub provider_type: String,
    /// Labels added to every alert this instance formats.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ProviderContext {
    pub fn new(
        tenant_id: impl Into<String>,
        provider_id: impl Into<String>,
        provider_type: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            provider_id: provider_id.into(),
            provider_type: provider_type.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "provider",
            tenant_id = %self.tenant_id,
            provider_id = %self.provider_id,
            provider_type = %self.provider_type,
        )
    }

    pub fn apply(&self, alert: &mut alert_registry::AlertDto) {
        alert.provider_id = Some(self.provider_id.clone());
        alert.provider_type = Some(self.provider_type.clone());
        for (k, v) in &self.labels {
            alert.labels.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}
