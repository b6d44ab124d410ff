//! Prometheus and Alertmanager.
//!
//! Webhooks come from Alertmanager and carry a batch of alerts, so one event
//! fans out to several `AlertDto`s. Pulls read the Prometheus rules API.
//! Severity comes from the `severity` label and defaults to `info`.

use alert_registry::{normalize_timestamp, AlertDto, AlertSeverity, AlertStatus};
use provider_core::config::RawConfig;
use provider_core::formatter::{event_object, finish_alert, str_field};
use provider_core::http::{json_response, HttpClient};
use provider_core::scopes::probe_scopes;
use provider_core::{
    ActionParams, AlertFormatter, AuthConfig, ConfigError, Effect, FormattedAlerts, MethodEntry,
    Provider, ProviderContext, ProviderError, ProviderMethod, ProviderScope, ScopeResults,
};
use reqwest::blocking::RequestBuilder;
use serde_json::{Map, Value};
use url::Url;

pub const PROVIDER_TYPE: &str = "prometheus";

pub(crate) const SCOPES: &[ProviderScope] = &[ProviderScope::new(
    "connectivity",
    "The alerts API is reachable with these credentials",
)
.mandatory()];

pub(crate) const METHODS: &[ProviderMethod] = &[ProviderMethod {
    name: "Run PromQL query",
    entry: MethodEntry::Query,
    description: "Evaluate an instant PromQL expression",
    scopes: &["connectivity"],
    effect: Effect::Observe,
}];

// Alertmanager sends the zero time for alerts that have not ended.
const ZERO_TIME_PREFIX: &str = "0001-01-01";

#[derive(Clone, Debug, AuthConfig)]
pub struct PrometheusAuth {
    #[auth(description = "Prometheus server URL", hint = "http://localhost:9090")]
    pub url: Url,
    /// Basic-auth username
    pub username: Option<String>,
    #[auth(description = "Basic-auth password", sensitive)]
    pub password: Option<String>,
    #[auth(description = "Verify TLS certificates", default = "true")]
    pub verify: bool,
}

pub struct PrometheusProvider {
    context: ProviderContext,
    auth: PrometheusAuth,
    http: HttpClient,
}

impl PrometheusProvider {
    pub fn new(context: ProviderContext, auth: PrometheusAuth) -> Self {
        let http = HttpClient::new(provider_core::http::DEFAULT_TIMEOUT, auth.verify);
        Self {
            context,
            auth,
            http,
        }
    }

    pub fn from_raw(context: ProviderContext, raw: &RawConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(context, PrometheusAuth::from_raw(raw)?))
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, ProviderError> {
        let base = self.auth.url.as_str().trim_end_matches('/');
        let mut request = self.http.client()?.get(format!("{base}{path}"));
        if let Some(username) = &self.auth.username {
            request = request.basic_auth(username, self.auth.password.as_ref());
        }
        Ok(request)
    }

    /// Unwraps the `{"status": "success", "data": ...}` envelope.
    fn api_data(&self, request: RequestBuilder) -> Result<Value, ProviderError> {
        let body = json_response(request.send()?)?;
        match body.get("status").and_then(Value::as_str) {
            Some("success") => Ok(body.get("data").cloned().unwrap_or(Value::Null)),
            _ => Err(ProviderError::Remote(
                str_field(body.as_object().unwrap_or(&Map::new()), &["error"])
                    .unwrap_or_else(|| "prometheus returned an error".into()),
            )),
        }
    }
}

impl AlertFormatter for PrometheusProvider {
    const FINGERPRINT_FIELDS: &'static [&'static str] = &["name", "instance", "job"];

    fn format_alert(
        event: &Value,
        context: Option<&ProviderContext>,
    ) -> Result<FormattedAlerts, ProviderError> {
        let obj = event_object(event)?;

        match obj.get("alerts") {
            Some(Value::Array(alerts)) => {
                let group_status = str_field(obj, &["status"]);
                let mut out = Vec::with_capacity(alerts.len());
                for alert in alerts {
                    let alert = event_object(alert)?;
                    out.push(format_single(alert, group_status.as_deref(), context));
                }
                Ok(FormattedAlerts::Many(out))
            }
            _ => Ok(format_single(obj, None, context).into()),
        }
    }
}

fn format_single(
    obj: &Map<String, Value>,
    group_status: Option<&str>,
    context: Option<&ProviderContext>,
) -> AlertDto {
    let labels = string_map(obj.get("labels"));
    let annotations = string_map(obj.get("annotations"));

    let name = labels
        .get("alertname")
        .cloned()
        .unwrap_or_else(|| "prometheus alert".into());
    let id = str_field(obj, &["fingerprint"]).unwrap_or_else(|| name.clone());

    let raw_status = str_field(obj, &["status", "state"])
        .or_else(|| {
            obj.get("status")
                .and_then(|s| s.get("state"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .or_else(|| group_status.map(String::from))
        .unwrap_or_default();

    let mut alert = AlertDto::new(id, name);
    alert.status = status(&raw_status);
    alert.severity = severity(labels.get("severity").map(String::as_str).unwrap_or_default());

    let ends_at = obj
        .get("endsAt")
        .filter(|v| v.as_str().is_some_and(|s| !s.starts_with(ZERO_TIME_PREFIX)));
    let received = match alert.status {
        AlertStatus::Resolved => ends_at.or_else(|| obj.get("startsAt")),
        _ => obj.get("startsAt").or_else(|| obj.get("activeAt")),
    };
    alert.last_received = normalize_timestamp(received);

    alert.description = annotations
        .get("description")
        .or_else(|| annotations.get("summary"))
        .cloned()
        .unwrap_or_default();
    alert.message = annotations.get("summary").cloned();
    alert.url = str_field(obj, &["generatorURL"]);
    alert.environment = labels
        .get("environment")
        .or_else(|| labels.get("env"))
        .cloned()
        .unwrap_or_else(|| alert.environment.clone());
    alert.service = labels.get("service").or_else(|| labels.get("job")).cloned();
    alert.source = vec![PROVIDER_TYPE.to_string()];

    if !annotations.is_empty() {
        alert.extra.insert(
            "annotations".into(),
            serde_json::to_value(&annotations).unwrap_or(Value::Null),
        );
    }
    if let Some(value) = obj.get("value").filter(|v| !v.is_null()) {
        alert.extra.insert("value".into(), value.clone());
    }
    alert.labels = labels;

    finish_alert(alert, context, PrometheusProvider::FINGERPRINT_FIELDS)
}

fn string_map(value: Option<&Value>) -> std::collections::BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), v)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn status(value: &str) -> AlertStatus {
    match value.to_lowercase().as_str() {
        "firing" | "active" => AlertStatus::Firing,
        "resolved" | "inactive" => AlertStatus::Resolved,
        "pending" | "unprocessed" => AlertStatus::Pending,
        "suppressed" => AlertStatus::Suppressed,
        _ => AlertStatus::Firing,
    }
}

fn severity(value: &str) -> AlertSeverity {
    match value.to_lowercase().as_str() {
        "critical" | "page" => AlertSeverity::Critical,
        "error" | "high" => AlertSeverity::High,
        "warning" | "warn" => AlertSeverity::Warning,
        "low" => AlertSeverity::Low,
        "info" | "none" => AlertSeverity::Info,
        _ => AlertSeverity::Info,
    }
}

impl Provider for PrometheusProvider {
    fn provider_type(&self) -> &'static str {
        PROVIDER_TYPE
    }

    fn context(&self) -> &ProviderContext {
        &self.context
    }

    fn scopes(&self) -> &'static [ProviderScope] {
        SCOPES
    }

    fn methods(&self) -> &'static [ProviderMethod] {
        METHODS
    }

    fn validate_scopes(&self) -> ScopeResults {
        let _guard = self.context.span().entered();
        probe_scopes(SCOPES, |_scope, _| {
            self.api_data(self.get("/api/v1/alerts")?).map(|_| ())
        })
    }

    fn get_alerts(&self) -> Result<Vec<AlertDto>, ProviderError> {
        let _guard = self.context.span().entered();
        let data = self.api_data(self.get("/api/v1/alerts")?)?;
        let alerts = match data.get("alerts") {
            Some(Value::Array(alerts)) => alerts,
            _ => return Ok(Vec::new()),
        };

        let mut out = Vec::with_capacity(alerts.len());
        for alert in alerts {
            match event_object(alert) {
                Ok(obj) => out.push(format_single(obj, None, Some(&self.context))),
                Err(err) => tracing::warn!(error = %err, "skipping malformed alert"),
            }
        }
        Ok(out)
    }

    fn query(&self, params: &ActionParams) -> Result<Value, ProviderError> {
        let _guard = self.context.span().entered();
        let query = params.required_str("query")?;
        let mut request = self.get("/api/v1/query")?.query(&[("query", query)]);
        if let Some(time) = params.optional_str("time")? {
            request = request.query(&[("time", time)]);
        }
        self.api_data(request)
    }

    fn dispose(&self) {
        self.http.dispose();
    }
}
