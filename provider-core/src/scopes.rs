use crate::error::ProviderError;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// One capability a provider needs from its credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderScope {
    pub name: &'static str,
    pub description: &'static str,
    pub mandatory: bool,
    pub mandatory_for_webhook: bool,
    pub alias: Option<&'static str>,
    pub documentation_url: Option<&'static str>,
}

impl ProviderScope {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            mandatory: false,
            mandatory_for_webhook: false,
            alias: None,
            documentation_url: None,
        }
    }

    pub const fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub const fn mandatory_for_webhook(mut self) -> Self {
        self.mandatory_for_webhook = true;
        self
    }

    pub const fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    pub const fn documentation_url(mut self, url: &'static str) -> Self {
        self.documentation_url = Some(url);
        self
    }
}

/// Result of probing one scope. Serializes as `true` or as the reason string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeStatus {
    Granted,
    Denied(String),
}

impl ScopeStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, ScopeStatus::Granted)
    }
}

impl From<Result<(), ProviderError>> for ScopeStatus {
    fn from(result: Result<(), ProviderError>) -> Self {
        match result {
            Ok(()) => ScopeStatus::Granted,
            Err(err) => ScopeStatus::Denied(err.to_string()),
        }
    }
}

impl Serialize for ScopeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScopeStatus::Granted => serializer.serialize_bool(true),
            ScopeStatus::Denied(reason) => serializer.serialize_str(reason),
        }
    }
}

pub type ScopeResults = BTreeMap<String, ScopeStatus>;

/// Runs one probe per scope and collects every outcome. Failures are recorded
/// as `Denied`, so the caller always receives a complete mapping.
pub fn probe_scopes<F>(scopes: &[ProviderScope], mut probe: F) -> ScopeResults
where
    F: FnMut(&str, &ScopeResults) -> Result<(), ProviderError>,
{
    let mut results = ScopeResults::new();
    for scope in scopes {
        let status = ScopeStatus::from(probe(scope.name, &results));
        if let ScopeStatus::Denied(reason) = &status {
            tracing::debug!(scope = scope.name, %reason, "scope not granted");
        }
        results.insert(scope.name.to_string(), status);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_true_or_reason() {
        let mut results = ScopeResults::new();
        results.insert("read".into(), ScopeStatus::Granted);
        results.insert("write".into(), ScopeStatus::Denied("403 Forbidden".into()));

        assert_eq!(
            serde_json::to_value(&results).expect("json"),
            serde_json::json!({"read": true, "write": "403 Forbidden"})
        );
    }

    #[test]
    fn probe_collects_every_scope_and_sees_earlier_results() {
        const SCOPES: [ProviderScope; 3] = [
            ProviderScope::new("read", "list things").mandatory(),
            ProviderScope::new("write", "create things"),
            ProviderScope::new("update", "update things"),
        ];

        let results = probe_scopes(&SCOPES, |name, earlier| match name {
            "read" => Ok(()),
            "write" => Err(ProviderError::Remote("denied".into())),
            _ => {
                assert!(earlier.get("read").is_some_and(ScopeStatus::is_granted));
                Ok(())
            }
        });

        assert_eq!(results.len(), 3);
        assert_eq!(results["read"], ScopeStatus::Granted);
        assert_eq!(results["write"], ScopeStatus::Denied("denied".into()));
        assert_eq!(results["update"], ScopeStatus::Granted);
    }
}
