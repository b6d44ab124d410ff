//! Static catalog of provider types.
//!
//! Each [`ProviderKind`] carries everything the platform needs without an
//! instance: the auth schema for a settings form, declared scopes and
//! methods, the webhook formatter, and a constructor.

use crate::keep::{KeepAuth, KeepProvider};
use crate::kapacitor::{KapacitorAuth, KapacitorProvider};
use crate::prometheus::{PrometheusAuth, PrometheusProvider};
use crate::servicenow::{ServiceNowAuth, ServiceNowProvider};
use crate::slack::{SlackAuth, SlackProvider};
use crate::{kapacitor, keep, prometheus, servicenow, slack};
use provider_core::config::{AuthField, ProviderConfig, RawConfig};
use provider_core::{
    AlertFormatter, AuthConfig, ConfigError, FormatFn, Provider, ProviderContext, ProviderMethod,
    ProviderScope,
};
use serde::Serialize;

pub type BuildFn = fn(ProviderContext, &RawConfig) -> Result<Box<dyn Provider>, ConfigError>;

pub struct ProviderKind {
    pub provider_type: &'static str,
    pub display_name: &'static str,
    pub auth_fields: fn() -> Vec<AuthField>,
    pub scopes: &'static [ProviderScope],
    pub methods: &'static [ProviderMethod],
    pub format_alert: FormatFn,
    pub build: BuildFn,
}

/// Serializable view of a [`ProviderKind`].
#[derive(Clone, Debug, Serialize)]
pub struct ProviderInfo {
    #[serde(rename = "type")]
    pub provider_type: &'static str,
    pub display_name: &'static str,
    pub auth_fields: Vec<AuthField>,
    pub scopes: &'static [ProviderScope],
    pub methods: &'static [ProviderMethod],
}

impl ProviderKind {
    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            provider_type: self.provider_type,
            display_name: self.display_name,
            auth_fields: (self.auth_fields)(),
            scopes: self.scopes,
            methods: self.methods,
        }
    }
}

trait FromRaw: Provider + Sized + 'static {
    fn from_raw(context: ProviderContext, raw: &RawConfig) -> Result<Self, ConfigError>;
}

macro_rules! from_raw {
    ($($provider:ty),* $(,)?) => {
        $(impl FromRaw for $provider {
            fn from_raw(context: ProviderContext, raw: &RawConfig) -> Result<Self, ConfigError> {
                <$provider>::from_raw(context, raw)
            }
        })*
    };
}

from_raw!(
    KapacitorProvider,
    PrometheusProvider,
    ServiceNowProvider,
    SlackProvider,
    KeepProvider,
);
#[cfg(feature = "kafka")]
from_raw!(crate::kafka::KafkaProvider);

fn build<P: FromRaw>(context: ProviderContext, raw: &RawConfig) -> Result<Box<dyn Provider>, ConfigError> {
    Ok(Box::new(<P as FromRaw>::from_raw(context, raw)?))
}

pub static PROVIDERS: &[ProviderKind] = &[
    ProviderKind {
        provider_type: kapacitor::PROVIDER_TYPE,
        display_name: "Kapacitor",
        auth_fields: KapacitorAuth::fields,
        scopes: kapacitor::SCOPES,
        methods: &[],
        format_alert: KapacitorProvider::format_alert,
        build: build::<KapacitorProvider>,
    },
    ProviderKind {
        provider_type: prometheus::PROVIDER_TYPE,
        display_name: "Prometheus",
        auth_fields: PrometheusAuth::fields,
        scopes: prometheus::SCOPES,
        methods: prometheus::METHODS,
        format_alert: PrometheusProvider::format_alert,
        build: build::<PrometheusProvider>,
    },
    ProviderKind {
        provider_type: servicenow::PROVIDER_TYPE,
        display_name: "ServiceNow",
        auth_fields: ServiceNowAuth::fields,
        scopes: servicenow::SCOPES,
        methods: servicenow::METHODS,
        format_alert: unsupported_webhook,
        build: build::<ServiceNowProvider>,
    },
    ProviderKind {
        provider_type: slack::PROVIDER_TYPE,
        display_name: "Slack",
        auth_fields: SlackAuth::fields,
        scopes: slack::SCOPES,
        methods: slack::METHODS,
        format_alert: unsupported_webhook,
        build: build::<SlackProvider>,
    },
    ProviderKind {
        provider_type: keep::PROVIDER_TYPE,
        display_name: "Keep (generic webhook)",
        auth_fields: KeepAuth::fields,
        scopes: &[],
        methods: &[],
        format_alert: KeepProvider::format_alert,
        build: build::<KeepProvider>,
    },
    #[cfg(feature = "kafka")]
    ProviderKind {
        provider_type: crate::kafka::PROVIDER_TYPE,
        display_name: "Kafka",
        auth_fields: crate::kafka::KafkaAuth::fields,
        scopes: crate::kafka::SCOPES,
        methods: &[],
        format_alert: crate::kafka::KafkaProvider::format_alert,
        build: build::<crate::kafka::KafkaProvider>,
    },
];

fn unsupported_webhook(
    _event: &serde_json::Value,
    _context: Option<&ProviderContext>,
) -> Result<provider_core::FormattedAlerts, provider_core::ProviderError> {
    Err(provider_core::ProviderError::format(
        "provider does not receive webhooks",
    ))
}

pub fn find(provider_type: &str) -> Option<&'static ProviderKind> {
    PROVIDERS.iter().find(|k| k.provider_type == provider_type)
}

pub fn catalog() -> Vec<ProviderInfo> {
    PROVIDERS.iter().map(ProviderKind::info).collect()
}

/// Builds and validates an instance from stored configuration.
///
/// Field presence and types are checked while parsing; `validate_config`
/// adds the provider's semantic checks. Either failure is final.
pub fn build_provider(
    tenant_id: &str,
    config: &ProviderConfig,
) -> Result<Box<dyn Provider>, ConfigError> {
    let kind = find(&config.provider_type)
        .ok_or_else(|| ConfigError::UnknownProviderType(config.provider_type.clone()))?;
    let mut context = ProviderContext::new(tenant_id, &config.id, kind.provider_type);
    if let Some(name) = &config.name {
        context = context.with_label("provider_name", name);
    }

    let provider = (kind.build)(context, &config.authentication)?;
    provider.validate_config()?;
    tracing::info!(
        provider_id = %config.id,
        provider_type = kind.provider_type,
        "provider configured"
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> ProviderConfig {
        serde_json::from_value(value).expect("provider config")
    }

    #[test]
    fn provider_types_are_unique() {
        let mut types: Vec<_> = PROVIDERS.iter().map(|k| k.provider_type).collect();
        types.sort_unstable();
        types.dedup();
        assert_eq!(types.len(), PROVIDERS.len());
    }

    #[test]
    fn builds_configured_instances() {
        let provider = build_provider(
            "tenant-a",
            &config(json!({
                "id": "kap-1",
                "type": "kapacitor",
                "name": "prod kapacitor",
                "authentication": {"host": "kapacitor:9092"}
            })),
        )
        .expect("build");

        assert_eq!(provider.provider_type(), "kapacitor");
        assert_eq!(provider.context().tenant_id, "tenant-a");
        assert_eq!(
            provider.context().labels.get("provider_name").map(String::as_str),
            Some("prod kapacitor")
        );
    }

    #[test]
    fn unknown_type_and_bad_config_are_config_errors() {
        let err = build_provider("t", &config(json!({"id": "x", "type": "pagerduty"})))
            .err()
            .expect("unknown type");
        assert_eq!(err, ConfigError::UnknownProviderType("pagerduty".into()));

        let err = build_provider("t", &config(json!({"id": "x", "type": "servicenow"})))
            .err()
            .expect("missing fields");
        assert!(matches!(err, ConfigError::MissingField { .. }));

        let err = build_provider("t", &config(json!({"id": "x", "type": "slack"})))
            .err()
            .expect("no credentials");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn catalog_exposes_schema_and_marks_secrets() {
        let catalog = serde_json::to_value(catalog()).expect("json");
        let servicenow = catalog
            .as_array()
            .and_then(|kinds| kinds.iter().find(|k| k["type"] == "servicenow"))
            .expect("servicenow entry");

        let password = servicenow["auth_fields"]
            .as_array()
            .and_then(|fields| fields.iter().find(|f| f["name"] == "password"))
            .expect("password field");
        assert_eq!(password["sensitive"], json!(true));
        assert_eq!(password["required"], json!(true));
    }

    #[test]
    fn webhook_formatting_goes_through_the_kind() {
        let kind = find("kapacitor").expect("kapacitor");
        let alerts = (kind.format_alert)(&json!({"id": "a1", "level": "OK"}), None)
            .expect("format")
            .into_vec();
        assert_eq!(alerts[0].status, provider_core::AlertStatus::Resolved);

        let slack = find("slack").expect("slack");
        assert!((slack.format_alert)(&json!({}), None).is_err());
    }
}
