//! Generic webhook: accepts alerts already shaped like [`AlertDto`], loosely.
//!
//! Status and severity accept the canonical names only; anything else is
//! `firing` / `info`. Keys the record does not know are kept in `extra`.

use alert_registry::{normalize_timestamp, AlertDto, AlertSeverity, AlertStatus};
use provider_core::config::RawConfig;
use provider_core::formatter::{event_object, finish_alert, str_field};
use provider_core::{
    AlertFormatter, AuthConfig, ConfigError, FormattedAlerts, Provider, ProviderContext,
    ProviderError,
};
use serde_json::{Map, Value};

pub const PROVIDER_TYPE: &str = "keep";

const KNOWN_KEYS: &[&str] = &[
    "id",
    "name",
    "title",
    "status",
    "severity",
    "lastReceived",
    "last_received",
    "timestamp",
    "environment",
    "service",
    "description",
    "message",
    "url",
    "source",
    "labels",
    "fingerprint",
    "providerId",
    "provider_id",
    "providerType",
    "provider_type",
];

/// The generic webhook takes no credentials.
#[derive(Clone, Debug, Default, AuthConfig)]
pub struct KeepAuth {}

pub struct KeepProvider {
    context: ProviderContext,
}

impl KeepProvider {
    pub fn new(context: ProviderContext) -> Self {
        Self { context }
    }

    pub fn from_raw(context: ProviderContext, raw: &RawConfig) -> Result<Self, ConfigError> {
        KeepAuth::from_raw(raw)?;
        Ok(Self::new(context))
    }
}

impl AlertFormatter for KeepProvider {
    const FINGERPRINT_FIELDS: &'static [&'static str] = &["name"];

    /// A JSON array fans out, one alert per element.
    fn format_alert(
        event: &Value,
        context: Option<&ProviderContext>,
    ) -> Result<FormattedAlerts, ProviderError> {
        match event {
            Value::Array(items) => items
                .iter()
                .map(|item| format_one(item, context))
                .collect::<Result<Vec<_>, _>>()
                .map(FormattedAlerts::Many),
            other => format_one(other, context).map(FormattedAlerts::Single),
        }
    }
}

fn format_one(event: &Value, context: Option<&ProviderContext>) -> Result<AlertDto, ProviderError> {
    let obj = event_object(event)?;

    let name = str_field(obj, &["name", "title"]).unwrap_or_default();
    let id = str_field(obj, &["id"]).unwrap_or_else(|| name.clone());

    let mut alert = AlertDto::new(id, name);
    alert.status = str_field(obj, &["status"])
        .and_then(|s| AlertStatus::from_canonical(&s))
        .unwrap_or_default();
    alert.severity = str_field(obj, &["severity"])
        .and_then(|s| AlertSeverity::from_canonical(&s))
        .unwrap_or_default();
    alert.last_received = normalize_timestamp(
        ["lastReceived", "last_received", "timestamp"]
            .iter()
            .find_map(|key| obj.get(*key).filter(|v| !v.is_null())),
    );
    if let Some(environment) = str_field(obj, &["environment"]) {
        alert.environment = environment;
    }
    alert.service = str_field(obj, &["service"]);
    alert.description = str_field(obj, &["description"]).unwrap_or_default();
    alert.message = str_field(obj, &["message"]);
    alert.url = str_field(obj, &["url"]);
    alert.source = sources(obj);
    alert.labels = labels(obj);
    // A caller-supplied fingerprint wins over the computed one.
    let fingerprint = str_field(obj, &["fingerprint"]);

    for (key, value) in obj {
        if !KNOWN_KEYS.contains(&key.as_str()) && !value.is_null() {
            alert.extra.insert(key.clone(), value.clone());
        }
    }

    let mut alert = finish_alert(alert, context, KeepProvider::FINGERPRINT_FIELDS);
    if fingerprint.is_some() {
        alert.fingerprint = fingerprint;
    }
    Ok(alert)
}

fn sources(obj: &Map<String, Value>) -> Vec<String> {
    match obj.get("source") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => vec![PROVIDER_TYPE.to_string()],
    }
}

fn labels(obj: &Map<String, Value>) -> std::collections::BTreeMap<String, String> {
    let Some(Value::Object(labels)) = obj.get("labels") else {
        return Default::default();
    };
    labels
        .iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.clone(), s.clone())),
            Value::Null => None,
            other => Some((k.clone(), other.to_string())),
        })
        .collect()
}

impl Provider for KeepProvider {
    fn provider_type(&self) -> &'static str {
        PROVIDER_TYPE
    }

    fn context(&self) -> &ProviderContext {
        &self.context
    }
}
