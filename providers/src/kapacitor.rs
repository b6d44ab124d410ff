//! Kapacitor: receives alert-handler webhooks and pulls alert topics.
//!
//! Severity default: `info`. Level `OK` marks the alert resolved; every other
//! level, known or not, is firing.

use alert_registry::{normalize_timestamp, AlertDto, AlertSeverity, AlertStatus};
use provider_core::config::RawConfig;
use provider_core::formatter::{event_object, finish_alert, str_field};
use provider_core::http::{json_response, HttpClient, SchemeProbe};
use provider_core::scopes::probe_scopes;
use provider_core::{
    AlertFormatter, AuthConfig, ConfigError, FormattedAlerts, Provider, ProviderContext,
    ProviderError, ProviderScope, ScopeResults,
};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

pub const PROVIDER_TYPE: &str = "kapacitor";

pub(crate) const SCOPES: &[ProviderScope] = &[ProviderScope::new(
    "kapacitor_ping",
    "Kapacitor answers the ping endpoint with these credentials",
)
.mandatory()
.documentation_url("https://docs.influxdata.com/kapacitor/v1/working/api/")];

#[derive(Clone, Debug, AuthConfig)]
pub struct KapacitorAuth {
    /// Kapacitor host, scheme optional
    #[auth(hint = "kapacitor.example.com:9092")]
    pub host: String,
    /// Basic-auth username
    pub username: Option<String>,
    #[auth(description = "Basic-auth password", sensitive)]
    pub password: Option<String>,
    #[auth(description = "Verify TLS certificates", default = "true")]
    pub verify_ssl: bool,
}

pub struct KapacitorProvider {
    context: ProviderContext,
    auth: KapacitorAuth,
    http: HttpClient,
    base: SchemeProbe,
}

impl KapacitorProvider {
    pub fn new(context: ProviderContext, auth: KapacitorAuth) -> Self {
        let http = HttpClient::new(provider_core::http::DEFAULT_TIMEOUT, auth.verify_ssl);
        let base = SchemeProbe::new(auth.host.clone());
        Self {
            context,
            auth,
            http,
            base,
        }
    }

    pub fn from_raw(context: ProviderContext, raw: &RawConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(context, KapacitorAuth::from_raw(raw)?))
    }

    fn request(&self, path: &str) -> Result<RequestBuilder, ProviderError> {
        let client: Client = self.http.client()?;
        let base = self.base.base_url(&client)?;
        let mut request = client.get(format!("{base}{path}"));
        if let Some(username) = &self.auth.username {
            request = request.basic_auth(username, self.auth.password.as_ref());
        }
        Ok(request)
    }

    fn get_json(&self, path: &str) -> Result<Value, ProviderError> {
        json_response(self.request(path)?.send()?)
    }

    fn topic_events(&self, topic: &str) -> Result<Vec<AlertDto>, ProviderError> {
        let body = self.get_json(&format!("/kapacitor/v1/alerts/topics/{topic}/events"))?;
        let events = body
            .get("events")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut alerts = Vec::with_capacity(events.len());
        for event in events {
            // Pulled events nest the handler fields under `state`.
            let mut flat = event
                .get("state")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            if let (Some(obj), Some(id)) = (flat.as_object_mut(), event.get("id")) {
                obj.insert("id".into(), id.clone());
                obj.insert("topic".into(), Value::String(topic.to_string()));
            }
            alerts.extend(Self::format_alert(&flat, Some(&self.context))?.into_vec());
        }
        Ok(alerts)
    }
}

impl AlertFormatter for KapacitorProvider {
    const FINGERPRINT_FIELDS: &'static [&'static str] = &["id"];

    fn format_alert(
        event: &Value,
        context: Option<&ProviderContext>,
    ) -> Result<FormattedAlerts, ProviderError> {
        let obj = event_object(event)?;

        let id = str_field(obj, &["id"]).unwrap_or_default();
        let name = str_field(obj, &["message", "id"]).unwrap_or_default();
        let level = str_field(obj, &["level"]).unwrap_or_default();

        let mut alert = AlertDto::new(id, name);
        alert.severity = severity(&level);
        alert.status = status(&level);
        alert.last_received = normalize_timestamp(obj.get("time"));
        alert.description = str_field(obj, &["details"]).unwrap_or_default();
        alert.message = str_field(obj, &["message"]);
        alert.source = vec![PROVIDER_TYPE.to_string()];

        for key in ["duration", "previousLevel", "data", "topic"] {
            if let Some(value) = obj.get(key).filter(|v| !v.is_null()) {
                alert.extra.insert(key.to_string(), value.clone());
            }
        }

        Ok(finish_alert(alert, context, Self::FINGERPRINT_FIELDS).into())
    }
}

fn severity(level: &str) -> AlertSeverity {
    match level.to_uppercase().as_str() {
        "CRITICAL" => AlertSeverity::Critical,
        "WARNING" => AlertSeverity::Warning,
        "INFO" | "OK" => AlertSeverity::Info,
        _ => AlertSeverity::Info,
    }
}

fn status(level: &str) -> AlertStatus {
    match level.to_uppercase().as_str() {
        "OK" => AlertStatus::Resolved,
        _ => AlertStatus::Firing,
    }
}

impl Provider for KapacitorProvider {
    fn provider_type(&self) -> &'static str {
        PROVIDER_TYPE
    }

    fn context(&self) -> &ProviderContext {
        &self.context
    }

    fn scopes(&self) -> &'static [ProviderScope] {
        SCOPES
    }

    fn validate_scopes(&self) -> ScopeResults {
        let _guard = self.context.span().entered();
        probe_scopes(SCOPES, |_scope, _| {
            let response = self
                .request("/kapacitor/v1/ping")?
                .timeout(Duration::from_secs(10))
                .send()?;
            provider_core::http::check_response(response).map(|_| ())
        })
    }

    /// Lists every alert topic, then each topic's events. A topic whose
    /// events cannot be read is logged and skipped.
    fn get_alerts(&self) -> Result<Vec<AlertDto>, ProviderError> {
        let _guard = self.context.span().entered();
        let body = self.get_json("/kapacitor/v1/alerts/topics")?;
        let topics = body
            .get("topics")
            .and_then(Value::as_array)
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(|t| t.get("id").and_then(Value::as_str).map(String::from))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let mut alerts = Vec::new();
        for topic in topics {
            match self.topic_events(&topic) {
                Ok(found) => alerts.extend(found),
                Err(err) => tracing::warn!(%topic, error = %err, "skipping topic"),
            }
        }
        tracing::info!(count = alerts.len(), "pulled kapacitor alerts");
        Ok(alerts)
    }

    fn dispose(&self) {
        self.http.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    fn provider(host: String) -> KapacitorProvider {
        let raw = json!({"host": host}).as_object().cloned().expect("object");
        KapacitorProvider::from_raw(ProviderContext::new("t1", "kap-1", PROVIDER_TYPE), &raw)
            .expect("config")
    }

    fn format_one(event: Value) -> AlertDto {
        match KapacitorProvider::format_alert(&event, None).expect("format") {
            FormattedAlerts::Single(alert) => alert,
            other => panic!("expected a single alert, got {other:?}"),
        }
    }

    #[test]
    fn formats_critical_webhook() {
        let alert = format_one(json!({
            "id": "a1",
            "message": "disk full",
            "level": "CRITICAL",
            "time": "2024-01-15T10:30:00Z"
        }));

        assert_eq!(alert.id, "a1");
        assert_eq!(alert.name, "disk full");
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.status, AlertStatus::Firing);
        assert_eq!(alert.last_received, "2024-01-15T10:30:00+00:00");
        assert_eq!(alert.source, vec!["kapacitor"]);
        assert!(alert.fingerprint.is_some());
    }

    #[test]
    fn every_level_maps_and_unknown_levels_default() {
        let cases = [
            ("CRITICAL", AlertSeverity::Critical, AlertStatus::Firing),
            ("WARNING", AlertSeverity::Warning, AlertStatus::Firing),
            ("INFO", AlertSeverity::Info, AlertStatus::Firing),
            ("OK", AlertSeverity::Info, AlertStatus::Resolved),
            ("ok", AlertSeverity::Info, AlertStatus::Resolved),
            ("EXPLODED", AlertSeverity::Info, AlertStatus::Firing),
        ];
        for (level, sev, st) in cases {
            let alert = format_one(json!({"id": "a1", "message": "m", "level": level}));
            assert_eq!(alert.severity, sev, "severity for {level}");
            assert_eq!(alert.status, st, "status for {level}");
        }
    }

    #[test]
    fn empty_event_still_formats() {
        let alert = format_one(json!({}));
        assert_eq!(alert.id, "");
        assert_eq!(alert.description, "");
        assert_eq!(alert.message, None);
        assert!(alert_registry::parse_timestamp(&json!(alert.last_received)).is_some());
    }

    #[test]
    fn formatting_is_pure() {
        let event = json!({"id": "a1", "message": "disk full", "level": "WARNING",
                           "time": "2024-01-15T10:30:00Z", "duration": 5});
        assert_eq!(format_one(event.clone()), format_one(event));
    }

    #[test]
    fn pull_skips_failing_topics() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/kapacitor/v1/alerts/topics");
            then.status(200)
                .json_body(json!({"topics": [{"id": "main:cpu"}, {"id": "main:disk"}]}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/kapacitor/v1/alerts/topics/main:cpu/events");
            then.status(200).json_body(json!({"events": [{
                "id": "cpu:host=a",
                "state": {"level": "WARNING", "message": "cpu high",
                          "time": "2024-01-15T10:30:00Z", "duration": 0}
            }]}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/kapacitor/v1/alerts/topics/main:disk/events");
            then.status(500).body("boom");
        });

        let alerts = provider(server.base_url()).get_alerts().expect("alerts");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "cpu:host=a");
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
        assert_eq!(alerts[0].provider_id.as_deref(), Some("kap-1"));
        assert_eq!(alerts[0].extra.get("topic"), Some(&json!("main:cpu")));
    }

    #[test]
    fn scopes_report_failures_as_strings() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/kapacitor/v1/ping");
            then.status(401).body("unauthorized");
        });

        let results = provider(server.base_url()).validate_scopes();
        let json = serde_json::to_value(&results).expect("json");
        assert_eq!(
            json["kapacitor_ping"],
            json!("remote returned HTTP 401: unauthorized")
        );
    }

    #[test]
    fn bare_host_is_probed_once() {
        let server = MockServer::start();
        let root = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(404);
        });
        let ping = server.mock(|when, then| {
            when.method(GET).path("/kapacitor/v1/ping");
            then.status(204);
        });

        let provider = provider(server.address().to_string());
        assert!(provider.validate_scopes()["kapacitor_ping"].is_granted());
        assert!(provider.validate_scopes()["kapacitor_ping"].is_granted());
        root.assert_hits(1);
        ping.assert_hits(2);
    }
}
