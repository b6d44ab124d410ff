//! Slack messages, through an incoming webhook or the Web API.

use provider_core::config::RawConfig;
use provider_core::http::{check_response, json_response, HttpClient};
use provider_core::scopes::probe_scopes;
use provider_core::{
    ActionParams, AuthConfig, ConfigError, Effect, MethodEntry, Provider, ProviderContext,
    ProviderError, ProviderMethod, ProviderScope, ScopeResults,
};
use serde_json::{json, Map, Value};
use url::Url;

pub const PROVIDER_TYPE: &str = "slack";

pub(crate) const SCOPES: &[ProviderScope] = &[ProviderScope::new(
    "chat:write",
    "Post messages to channels the app is a member of",
)
.documentation_url("https://api.slack.com/scopes/chat:write")];

pub(crate) const METHODS: &[ProviderMethod] = &[ProviderMethod {
    name: "Send message",
    entry: MethodEntry::Notify,
    description: "Post a message, optionally as a thread reply",
    scopes: &["chat:write"],
    effect: Effect::Irreversible,
}];

#[derive(Clone, Debug, AuthConfig)]
pub struct SlackAuth {
    #[auth(description = "Incoming webhook URL", sensitive)]
    pub webhook_url: Option<Url>,
    #[auth(description = "Bot token for the Web API", hint = "xoxb-...", sensitive)]
    pub access_token: Option<String>,
    #[auth(description = "Slack Web API base URL", default = "https://slack.com/api")]
    pub api_url: Url,
}

pub struct SlackProvider {
    context: ProviderContext,
    auth: SlackAuth,
    http: HttpClient,
}

impl SlackProvider {
    pub fn new(context: ProviderContext, auth: SlackAuth) -> Self {
        Self {
            context,
            auth,
            http: HttpClient::default(),
        }
    }

    pub fn from_raw(context: ProviderContext, raw: &RawConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(context, SlackAuth::from_raw(raw)?))
    }

    fn api(&self, method: &str, token: &str, body: &Value) -> Result<Value, ProviderError> {
        let base = self.auth.api_url.as_str().trim_end_matches('/');
        let response = self
            .http
            .client()?
            .post(format!("{base}/{method}"))
            .bearer_auth(token)
            .json(body)
            .send()?;
        let body = json_response(response)?;
        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(body)
        } else {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(ProviderError::Remote(format!("slack {method} failed: {error}")))
        }
    }
}

fn message_body(params: &ActionParams) -> Result<Map<String, Value>, ProviderError> {
    let text = params.optional_str("message")?;
    let blocks = params.get("blocks").cloned();
    if text.is_none() && blocks.is_none() {
        return Err(ProviderError::MissingParameter("message".into()));
    }

    let mut body = Map::new();
    if let Some(text) = text {
        body.insert("text".into(), json!(text));
    }
    if let Some(blocks) = blocks {
        body.insert("blocks".into(), blocks);
    }
    if let Some(thread_ts) = params.optional_str("thread_timestamp")? {
        body.insert("thread_ts".into(), json!(thread_ts));
    }
    Ok(body)
}

impl Provider for SlackProvider {
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
        if self.auth.webhook_url.is_none() && self.auth.access_token.is_none() {
            return Err(ConfigError::Invalid(
                "either webhook_url or access_token is required".into(),
            ));
        }
        Ok(())
    }

    fn validate_scopes(&self) -> ScopeResults {
        let _guard = self.context.span().entered();
        probe_scopes(SCOPES, |_scope, _| match &self.auth.access_token {
            Some(token) => self.api("auth.test", token, &json!({})).map(|_| ()),
            // An incoming webhook can always post to its own channel.
            None if self.auth.webhook_url.is_some() => Ok(()),
            None => Err(ProviderError::Remote("no credentials configured".into())),
        })
    }

    /// Posts through the webhook when one is configured, else through
    /// `chat.postMessage`, which also needs a `channel`.
    fn notify(&self, params: &ActionParams) -> Result<Value, ProviderError> {
        let _guard = self.context.span().entered();
        let mut body = message_body(params)?;

        if let Some(webhook) = &self.auth.webhook_url {
            let response = self
                .http
                .client()?
                .post(webhook.clone())
                .json(&body)
                .send()?;
            check_response(response)?;
            tracing::info!("posted slack message through webhook");
            return Ok(json!({"ok": true}));
        }

        let token = self
            .auth
            .access_token
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("no slack credentials configured".into()))?;
        let channel = params.required_str("channel")?;
        body.insert("channel".into(), json!(channel));
        let response = self.api("chat.postMessage", token, &Value::Object(body))?;
        tracing::info!(%channel, "posted slack message");
        Ok(response)
    }

    fn dispose(&self) {
        self.http.dispose();
    }
}
