use provider_core::config::{AuthConfig, FieldKind, RawConfig};
use provider_core::ConfigError;
use serde_json::json;

#[derive(Debug, provider_core::AuthConfig)]
struct ExampleAuth {
    /// Service host, with or without scheme
    #[auth(hint = "e.g. alerts.example.com")]
    host: String,
    #[auth(description = "API token", sensitive)]
    api_token: Option<String>,
    #[auth(description = "Verify TLS certificates", default = "true")]
    verify_tls: bool,
    port: Option<u16>,
    webhook_url: Option<url::Url>,
}

fn raw(value: serde_json::Value) -> RawConfig {
    value.as_object().cloned().expect("object")
}

#[test]
fn schema_reflects_types_and_attributes() {
    let fields = ExampleAuth::fields();
    assert_eq!(fields.len(), 5);

    let host = &fields[0];
    assert_eq!(host.name, "host");
    assert_eq!(host.description, "Service host, with or without scheme");
    assert_eq!(host.hint, Some("e.g. alerts.example.com"));
    assert!(host.required);
    assert!(!host.sensitive);

    let token = &fields[1];
    assert!(!token.required);
    assert!(token.sensitive);
    assert_eq!(token.kind, FieldKind::Text);

    let verify = &fields[2];
    assert!(!verify.required);
    assert_eq!(verify.default, Some("true"));
    assert_eq!(verify.kind, FieldKind::Bool);

    assert_eq!(fields[3].description, "port");
    assert_eq!(fields[3].kind, FieldKind::Integer);
    assert_eq!(fields[4].kind, FieldKind::Url);
}

#[test]
fn builds_from_raw_mapping() {
    let cfg = ExampleAuth::from_raw(&raw(json!({
        "host": "alerts.example.com",
        "api_token": "secret",
        "port": "8443",
    })))
    .expect("valid config");

    assert_eq!(cfg.host, "alerts.example.com");
    assert_eq!(cfg.api_token.as_deref(), Some("secret"));
    assert!(cfg.verify_tls);
    assert_eq!(cfg.port, Some(8443));
    assert!(cfg.webhook_url.is_none());
}

#[test]
fn missing_required_field_is_named() {
    let err = ExampleAuth::from_raw(&raw(json!({"api_token": "secret"}))).unwrap_err();
    assert_eq!(
        err,
        ConfigError::MissingField {
            field: "host".into()
        }
    );
}

#[test]
fn mistyped_field_is_named() {
    let err = ExampleAuth::from_raw(&raw(json!({
        "host": "alerts.example.com",
        "verify_tls": "sometimes",
    })))
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidField { field, .. } if field == "verify_tls"));
}
