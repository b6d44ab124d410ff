use crate::error::ProviderError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keyword arguments for `notify` / `query`, as a JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionParams(Map<String, Value>);

impl ActionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(ProviderError::InvalidParameter {
                name: "params".into(),
                reason: format!("expected an object, got {other}"),
            }),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn required_str(&self, name: &str) -> Result<&str, ProviderError> {
        match self.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
            Some(Value::String(_)) | None => Err(ProviderError::MissingParameter(name.into())),
            Some(_) => Err(ProviderError::InvalidParameter {
                name: name.into(),
                reason: "expected a string".into(),
            }),
        }
    }

    pub fn optional_str(&self, name: &str) -> Result<Option<&str>, ProviderError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ProviderError::InvalidParameter {
                name: name.into(),
                reason: "expected a string".into(),
            }),
        }
    }

    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ProviderError> {
        self.get(name)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| ProviderError::InvalidParameter {
                    name: name.into(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_and_optional_strings() {
        let params = ActionParams::new()
            .with("message", "hello")
            .with("blank", "")
            .with("count", 3);

        assert_eq!(params.required_str("message").expect("message"), "hello");
        assert!(matches!(
            params.required_str("blank"),
            Err(ProviderError::MissingParameter(name)) if name == "blank"
        ));
        assert!(matches!(
            params.required_str("count"),
            Err(ProviderError::InvalidParameter { .. })
        ));
        assert_eq!(params.optional_str("missing").expect("ok"), None);
        assert_eq!(params.optional::<u32>("count").expect("ok"), Some(3));
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(ActionParams::from_value(json!({"a": 1})).is_ok());
        assert!(ActionParams::from_value(Value::Null).is_ok());
        assert!(ActionParams::from_value(json!([1, 2])).is_err());
    }
}
