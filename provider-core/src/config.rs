//! Declarative auth-config schemas.
//!
//! A provider's auth config is a plain struct deriving
//! [`AuthConfig`](trait@AuthConfig). The derive turns each field into an
//! [`AuthField`] descriptor and generates `from_raw`, which pulls every field
//! out of the raw mapping through [`ConfigValue`]. Whether a field is required
//! follows from its type: `Option<T>` fields and fields with a `default` are
//! optional.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Raw, untyped configuration as stored by the platform.
pub type RawConfig = serde_json::Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Bool,
    Integer,
    Url,
}

/// Schema entry for one auth-config field; drives the settings form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthField {
    pub name: &'static str,
    pub description: &'static str,
    pub hint: Option<&'static str>,
    pub required: bool,
    pub sensitive: bool,
    pub kind: FieldKind,
    pub default: Option<&'static str>,
}

pub trait AuthConfig: Sized {
    fn fields() -> Vec<AuthField>;

    fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError>;
}

/// A type that can be read out of a raw configuration value.
pub trait ConfigValue: Sized {
    const KIND: FieldKind;
    const REQUIRED: bool = true;

    fn parse(field: &str, value: &Value) -> Result<Self, ConfigError>;

    fn missing(field: &str) -> Result<Self, ConfigError> {
        Err(ConfigError::missing(field))
    }
}

impl ConfigValue for String {
    const KIND: FieldKind = FieldKind::Text;

    fn parse(field: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::String(s) => Ok(s.trim().to_string()),
            other => Err(ConfigError::invalid(
                field,
                format!("expected a string, got {}", json_kind(other)),
            )),
        }
    }
}

impl ConfigValue for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn parse(field: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(ConfigError::invalid(
                    field,
                    format!("expected true or false, got '{other}'"),
                )),
            },
            other => Err(ConfigError::invalid(
                field,
                format!("expected a boolean, got {}", json_kind(other)),
            )),
        }
    }
}

macro_rules! integer_config_value {
    ($($ty:ty),*) => {
        $(
            impl ConfigValue for $ty {
                const KIND: FieldKind = FieldKind::Integer;

                fn parse(field: &str, value: &Value) -> Result<Self, ConfigError> {
                    let parsed = match value {
                        Value::Number(n) => n.as_u64().and_then(|n| <$ty>::try_from(n).ok()),
                        Value::String(s) => s.trim().parse::<$ty>().ok(),
                        _ => None,
                    };
                    parsed.ok_or_else(|| {
                        ConfigError::invalid(
                            field,
                            format!("expected an integer in range for {}", stringify!($ty)),
                        )
                    })
                }
            }
        )*
    };
}

integer_config_value!(u16, u32, u64);

impl ConfigValue for Url {
    const KIND: FieldKind = FieldKind::Url;

    fn parse(field: &str, value: &Value) -> Result<Self, ConfigError> {
        let raw = String::parse(field, value)?;
        Url::parse(&raw).map_err(|e| ConfigError::invalid(field, e.to_string()))
    }
}

impl<T: ConfigValue> ConfigValue for Option<T> {
    const KIND: FieldKind = T::KIND;
    const REQUIRED: bool = false;

    fn parse(field: &str, value: &Value) -> Result<Self, ConfigError> {
        T::parse(field, value).map(Some)
    }

    fn missing(_field: &str) -> Result<Self, ConfigError> {
        Ok(None)
    }
}

/// Reads `field` from `raw`. Null and blank strings count as absent; absent
/// fields take `default` when one is declared.
pub fn extract<T: ConfigValue>(
    raw: &RawConfig,
    field: &str,
    default: Option<&str>,
) -> Result<T, ConfigError> {
    let present = raw.get(field).filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    });

    match (present, default) {
        (Some(value), _) => T::parse(field, value),
        (None, Some(default)) => T::parse(field, &Value::String(default.to_string())),
        (None, None) => T::missing(field),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Prefixes `https://` when `host` carries no scheme and strips trailing
/// slashes.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// A configured provider instance as supplied by the platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub authentication: RawConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawConfig {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn required_string_missing_or_blank() {
        let cfg = raw(json!({"host": "  "}));
        assert_eq!(
            extract::<String>(&cfg, "host", None),
            Err(ConfigError::missing("host"))
        );
        assert_eq!(
            extract::<String>(&cfg, "other", None),
            Err(ConfigError::missing("other"))
        );
    }

    #[test]
    fn optional_missing_is_none() {
        let cfg = raw(json!({"token": null}));
        assert_eq!(extract::<Option<String>>(&cfg, "token", None), Ok(None));
    }

    #[test]
    fn defaults_and_string_booleans() {
        let cfg = raw(json!({"verify": "false"}));
        assert_eq!(extract::<bool>(&cfg, "verify", Some("true")), Ok(false));
        assert_eq!(extract::<bool>(&cfg, "absent", Some("true")), Ok(true));
    }

    #[test]
    fn type_mismatch_names_the_field() {
        let cfg = raw(json!({"port": "eighty", "host": 12}));
        let err = extract::<u16>(&cfg, "port", None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { ref field, .. } if field == "port"));

        let err = extract::<String>(&cfg, "host", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for field `host`: expected a string, got a number"
        );
    }

    #[test]
    fn integers_accept_numbers_and_strings() {
        let cfg = raw(json!({"a": 9092, "b": "9093", "c": 70000}));
        assert_eq!(extract::<u16>(&cfg, "a", None), Ok(9092));
        assert_eq!(extract::<u16>(&cfg, "b", None), Ok(9093));
        assert!(extract::<u16>(&cfg, "c", None).is_err());
    }

    #[test]
    fn urls_are_validated() {
        let cfg = raw(json!({"ok": "https://hooks.example.com/x", "bad": "not a url"}));
        assert!(extract::<Url>(&cfg, "ok", None).is_ok());
        assert!(extract::<Url>(&cfg, "bad", None).is_err());
    }

    #[test]
    fn host_normalization() {
        assert_eq!(normalize_host("example.com/"), "https://example.com");
        assert_eq!(normalize_host("http://example.com"), "http://example.com");
    }

    #[test]
    fn provider_config_from_json() {
        let cfg: ProviderConfig = serde_json::from_value(json!({
            "id": "kap-1",
            "type": "kapacitor",
            "authentication": {"host": "localhost:9092"}
        }))
        .expect("parse");
        assert_eq!(cfg.provider_type, "kapacitor");
        assert_eq!(cfg.name, None);
        assert_eq!(cfg.authentication.get("host"), Some(&json!("localhost:9092")));
    }
}
