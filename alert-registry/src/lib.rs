//! Canonical, provider-agnostic alert records.
//!
//! Every provider adapter normalizes its native payloads into [`AlertDto`].
//! The record is a fixed set of known fields plus an `extra` bag for
//! provider-specific attributes, which is flattened on the wire.

mod fingerprint;
mod status;
mod timestamp;

pub use fingerprint::{compute_fingerprint, DEFAULT_FINGERPRINT_FIELDS};
pub use status::{AlertSeverity, AlertStatus};
pub use timestamp::{normalize_timestamp, now_rfc3339, parse_timestamp};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const UNDEFINED_ENVIRONMENT: &str = "undefined";

/// Wire names owned by the record itself. An `extra` entry under one of
/// these would be flattened next to the real field and shadow it.
pub const RESERVED_KEYS: &[&str] = &[
    "id",
    "name",
    "status",
    "severity",
    "lastReceived",
    "last_received",
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

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: AlertStatus,
    #[serde(default)]
    pub severity: AlertSeverity,
    #[serde(default = "now_rfc3339")]
    pub last_received: String,
    #[serde(default = "undefined_environment")]
    pub environment: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub provider_type: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn undefined_environment() -> String {
    UNDEFINED_ENVIRONMENT.to_string()
}

impl AlertDto {
    /// A firing, info-level alert received now. Formatters start here and
    /// fill in what the native payload provides.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: AlertStatus::default(),
            severity: AlertSeverity::default(),
            last_received: now_rfc3339(),
            environment: undefined_environment(),
            service: None,
            description: String::new(),
            message: None,
            url: None,
            source: Vec::new(),
            labels: BTreeMap::new(),
            fingerprint: None,
            provider_id: None,
            provider_type: None,
            extra: BTreeMap::new(),
        }
    }

    /// Stringified value of a known field or an extra attribute, as used for
    /// fingerprinting. Returns `None` when the field is absent or null.
    pub fn field_value(&self, field: &str) -> Option<String> {
        let known = match field {
            "id" => Some(self.id.clone()),
            "name" => Some(self.name.clone()),
            "status" => Some(self.status.as_str().to_string()),
            "severity" => Some(self.severity.as_str().to_string()),
            "lastReceived" | "last_received" => Some(self.last_received.clone()),
            "environment" => Some(self.environment.clone()),
            "service" => self.service.clone(),
            "description" => Some(self.description.clone()),
            "message" => self.message.clone(),
            "url" => self.url.clone(),
            "source" => Some(self.source.join(",")),
            "fingerprint" => self.fingerprint.clone(),
            _ => None,
        };
        if known.is_some() {
            return known;
        }
        if let Some(label) = self.labels.get(field) {
            return Some(label.clone());
        }
        match self.extra.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            other => Some(other.to_string()),
        }
    }

    /// Removes `extra` entries that collide with a known field, returning
    /// the names that were dropped.
    pub fn drop_reserved_extra(&mut self) -> Vec<String> {
        let mut dropped = Vec::new();
        self.extra.retain(|key, _| {
            let reserved = RESERVED_KEYS.contains(&key.as_str());
            if reserved {
                dropped.push(key.clone());
            }
            !reserved
        });
        dropped
    }

    /// Sets `fingerprint` from the given fields and returns the alert.
    pub fn with_fingerprint(mut self, fields: &[&str]) -> Self {
        self.fingerprint = Some(compute_fingerprint(&self, fields));
        self
    }
}
