//! ServiceNow ticketing through the Table API.

use provider_core::config::{normalize_host, RawConfig};
use provider_core::http::HttpClient;
use provider_core::scopes::probe_scopes;
use provider_core::{
    ActionParams, AuthConfig, ConfigError, Effect, MethodEntry, Provider, ProviderContext,
    ProviderError, ProviderMethod, ProviderScope, ScopeResults, ScopeStatus,
};
use reqwest::blocking::RequestBuilder;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::{json, Value};

pub const PROVIDER_TYPE: &str = "servicenow";

const READ_SCOPE: &str = "read_ticket";
const WRITE_SCOPE: &str = "write_ticket";
const UPDATE_SCOPE: &str = "update_ticket";

pub(crate) const SCOPES: &[ProviderScope] = &[
    ProviderScope::new(READ_SCOPE, "List records of the configured table")
        .mandatory()
        .alias("itil"),
    ProviderScope::new(WRITE_SCOPE, "Create and delete records of the configured table"),
    ProviderScope::new(UPDATE_SCOPE, "Update existing records of the configured table"),
];

pub(crate) const METHODS: &[ProviderMethod] = &[
    ProviderMethod {
        name: "Create or update ticket",
        entry: MethodEntry::Notify,
        description: "Create a record, or update it when ticket_id is given",
        scopes: &[WRITE_SCOPE],
        effect: Effect::Mutate,
    },
    ProviderMethod {
        name: "Get tickets",
        entry: MethodEntry::Query,
        description: "Fetch one record by ticket_id, or search with an encoded query",
        scopes: &[READ_SCOPE],
        effect: Effect::Observe,
    },
];

const DEFAULT_QUERY_LIMIT: u64 = 100;

#[derive(Clone, Debug, AuthConfig)]
pub struct ServiceNowAuth {
    #[auth(
        description = "ServiceNow instance URL",
        hint = "https://dev12345.service-now.com"
    )]
    pub service_now_base_url: String,
    /// Username of an account with the itil role
    pub username: String,
    #[auth(description = "Password", sensitive)]
    pub password: String,
    #[auth(description = "Table tickets are written to", default = "incident")]
    pub table_name: String,
}

pub struct ServiceNowProvider {
    context: ProviderContext,
    auth: ServiceNowAuth,
    base_url: String,
    http: HttpClient,
}

impl ServiceNowProvider {
    pub fn new(context: ProviderContext, auth: ServiceNowAuth) -> Self {
        let base_url = normalize_host(&auth.service_now_base_url);
        Self {
            context,
            auth,
            base_url,
            http: HttpClient::default(),
        }
    }

    pub fn from_raw(context: ProviderContext, raw: &RawConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(context, ServiceNowAuth::from_raw(raw)?))
    }

    pub fn record_url(&self, table: &str, sys_id: &str) -> String {
        format!("{}/now/nav_to.do?uri={table}.do?sys_id={sys_id}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ProviderError> {
        Ok(self
            .http
            .client()?
            .request(method, format!("{}/api/now/table/{path}", self.base_url))
            .basic_auth(&self.auth.username, Some(&self.auth.password))
            .header("Accept", "application/json"))
    }

    /// Sends the request and returns the `result` member of the response.
    fn send(&self, request: RequestBuilder) -> Result<Value, ProviderError> {
        let response = request.send()?;
        let status = response.status();
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/html"));
        let body = response.text()?;

        if is_hibernating(is_html, &body) {
            return Err(ProviderError::Hibernating(format!(
                "{} is hibernating; wake it from the developer portal",
                self.base_url
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Remote(format!("response is not valid JSON: {e}")))?;
        Ok(match parsed {
            Value::Object(mut obj) if obj.contains_key("result") => {
                obj.remove("result").unwrap_or(Value::Null)
            }
            other => other,
        })
    }

    fn list(&self, table: &str, query: Option<&str>, limit: u64) -> Result<Value, ProviderError> {
        let mut request = self
            .request(Method::GET, table)?
            .query(&[("sysparm_limit", limit.to_string())]);
        if let Some(query) = query {
            request = request.query(&[("sysparm_query", query)]);
        }
        self.send(request)
    }

    fn probe_write(&self) -> Result<(), ProviderError> {
        let table = &self.auth.table_name;
        let created = self.send(
            self.request(Method::POST, table)?
                .json(&json!({"short_description": "Keep scope validation, safe to delete"})),
        )?;
        let sys_id = created
            .get("sys_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Remote("created record has no sys_id".into()))?;
        self.send(self.request(Method::DELETE, &format!("{table}/{sys_id}"))?)?;
        Ok(())
    }

    fn probe_update(&self, sys_id: &str) -> Result<(), ProviderError> {
        let table = &self.auth.table_name;
        self.send(
            self.request(Method::PATCH, &format!("{table}/{sys_id}"))?
                .json(&json!({})),
        )?;
        Ok(())
    }
}

fn is_hibernating(is_html: bool, body: &str) -> bool {
    is_html && body.to_lowercase().contains("hibernat")
}

impl Provider for ServiceNowProvider {
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

    fn validate_config(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.base_url)
            .map(|_| ())
            .map_err(|e| ConfigError::invalid("service_now_base_url", e.to_string()))
    }

    /// Update is only probed against a record the read probe returned.
    fn validate_scopes(&self) -> ScopeResults {
        let _guard = self.context.span().entered();
        let mut first_sys_id: Option<String> = None;

        probe_scopes(SCOPES, |scope, earlier| match scope {
            READ_SCOPE => {
                let records = self.list(&self.auth.table_name, None, 1)?;
                first_sys_id = records
                    .get(0)
                    .and_then(|r| r.get("sys_id"))
                    .and_then(Value::as_str)
                    .map(String::from);
                Ok(())
            }
            WRITE_SCOPE => self.probe_write(),
            UPDATE_SCOPE => {
                if !earlier.get(READ_SCOPE).is_some_and(ScopeStatus::is_granted) {
                    return Err(ProviderError::Remote(format!(
                        "cannot verify without the {READ_SCOPE} scope"
                    )));
                }
                match &first_sys_id {
                    Some(sys_id) => self.probe_update(sys_id),
                    None => Err(ProviderError::Remote(format!(
                        "no records in {} to verify update against",
                        self.auth.table_name
                    ))),
                }
            }
            other => Err(ProviderError::Remote(format!("unknown scope {other}"))),
        })
    }

    /// Creates a record from `payload`, or patches `ticket_id` when given.
    fn notify(&self, params: &ActionParams) -> Result<Value, ProviderError> {
        let _guard = self.context.span().entered();
        let table = path_segment(
            "table_name",
            params
                .optional_str("table_name")?
                .unwrap_or(self.auth.table_name.as_str()),
        )?
        .to_string();
        let payload = params
            .get("payload")
            .cloned()
            .ok_or_else(|| ProviderError::MissingParameter("payload".into()))?;
        if !payload.is_object() {
            return Err(ProviderError::InvalidParameter {
                name: "payload".into(),
                reason: "expected an object".into(),
            });
        }

        let mut record = match params.optional_str("ticket_id")? {
            Some(ticket_id) => {
                let ticket_id = path_segment("ticket_id", ticket_id)?;
                tracing::info!(%table, %ticket_id, "updating ticket");
                self.send(
                    self.request(Method::PATCH, &format!("{table}/{ticket_id}"))?
                        .json(&payload),
                )?
            }
            None => {
                tracing::info!(%table, "creating ticket");
                self.send(self.request(Method::POST, &table)?.json(&payload))?
            }
        };

        let link = record
            .get("sys_id")
            .and_then(Value::as_str)
            .map(|sys_id| self.record_url(&table, sys_id));
        if let (Some(obj), Some(link)) = (record.as_object_mut(), link) {
            obj.insert("link".into(), Value::String(link));
        }
        Ok(record)
    }

    fn query(&self, params: &ActionParams) -> Result<Value, ProviderError> {
        let _guard = self.context.span().entered();
        let table = path_segment(
            "table_name",
            params
                .optional_str("table_name")?
                .unwrap_or(self.auth.table_name.as_str()),
        )?
        .to_string();
        match params.optional_str("ticket_id")? {
            Some(ticket_id) => {
                let ticket_id = path_segment("ticket_id", ticket_id)?;
                self.send(self.request(Method::GET, &format!("{table}/{ticket_id}"))?)
            }
            None => {
                let limit = params.optional::<u64>("limit")?.unwrap_or(DEFAULT_QUERY_LIMIT);
                self.list(&table, params.optional_str("query")?, limit)
            }
        }
    }

    fn dispose(&self) {
        self.http.dispose();
    }
}

/// Table names and sys_ids are spliced into the request path, so they must
/// stay a single plain segment.
fn path_segment<'a>(name: &str, value: &'a str) -> Result<&'a str, ProviderError> {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if value.is_empty() || value == "." || value == ".." || !plain {
        return Err(ProviderError::InvalidParameter {
            name: name.into(),
            reason: format!("`{value}` is not a valid path segment"),
        });
    }
    Ok(value)
}
