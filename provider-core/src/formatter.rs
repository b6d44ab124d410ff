use crate::context::ProviderContext;
use crate::error::ProviderError;
use alert_registry::AlertDto;
use serde_json::Value;

/// Output of one formatting call: native events either map to a single alert
/// or fan out to several.
#[derive(Clone, Debug, PartialEq)]
pub enum FormattedAlerts {
    Single(AlertDto),
    Many(Vec<AlertDto>),
}

impl FormattedAlerts {
    pub fn into_vec(self) -> Vec<AlertDto> {
        match self {
            FormattedAlerts::Single(alert) => vec![alert],
            FormattedAlerts::Many(alerts) => alerts,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FormattedAlerts::Single(_) => 1,
            FormattedAlerts::Many(alerts) => alerts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<AlertDto> for FormattedAlerts {
    fn from(alert: AlertDto) -> Self {
        FormattedAlerts::Single(alert)
    }
}

impl From<Vec<AlertDto>> for FormattedAlerts {
    fn from(alerts: Vec<AlertDto>) -> Self {
        FormattedAlerts::Many(alerts)
    }
}

/// Static mapping from a provider's native event to canonical alerts.
///
/// Formatting is pure: no provider instance is needed and the same input
/// always yields the same output (apart from a "now" timestamp substituted
/// for events that carry none). Unknown status or severity values map to the
/// adapter's documented default; only a structurally unusable payload is an
/// error.
pub trait AlertFormatter {
    /// Fields hashed into each alert's fingerprint. Empty means the adapter
    /// does not fingerprint.
    const FINGERPRINT_FIELDS: &'static [&'static str] = &[];

    fn format_alert(
        event: &Value,
        context: Option<&ProviderContext>,
    ) -> Result<FormattedAlerts, ProviderError>;
}

/// Function-pointer form of [`AlertFormatter::format_alert`], for registries
/// and the consume loop.
pub type FormatFn = fn(&Value, Option<&ProviderContext>) -> Result<FormattedAlerts, ProviderError>;

/// Returns the event as a JSON object or a format error.
pub fn event_object<'a>(
    event: &'a Value,
) -> Result<&'a serde_json::Map<String, Value>, ProviderError> {
    event
        .as_object()
        .ok_or_else(|| ProviderError::format("event is not a JSON object"))
}

/// First string-ish value among `keys`. Numbers and booleans are stringified.
pub fn str_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Final touches every formatter applies: context stamping, then the
/// fingerprint, so context labels can take part in it.
pub fn finish_alert(
    mut alert: AlertDto,
    context: Option<&ProviderContext>,
    fingerprint_fields: &[&str],
) -> AlertDto {
    let dropped = alert.drop_reserved_extra();
    if !dropped.is_empty() {
        tracing::debug!(alert_id = %alert.id, ?dropped, "ignoring extra keys that shadow known fields");
    }
    if let Some(context) = context {
        context.apply(&mut alert);
    }
    if !fingerprint_fields.is_empty() {
        alert = alert.with_fingerprint(fingerprint_fields);
    }
    alert
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn str_field_takes_first_present_key() {
        let event = json!({"title": "", "name": "cpu", "count": 3});
        let obj = event_object(&event).expect("object");
        assert_eq!(str_field(obj, &["title", "name"]).as_deref(), Some("cpu"));
        assert_eq!(str_field(obj, &["count"]).as_deref(), Some("3"));
        assert_eq!(str_field(obj, &["missing"]), None);
    }

    #[test]
    fn non_objects_are_format_errors() {
        assert!(matches!(
            event_object(&json!([1, 2])),
            Err(ProviderError::Format(_))
        ));
    }

    #[test]
    fn finish_stamps_context_and_fingerprint() {
        let ctx = ProviderContext::new("tenant-a", "kap-1", "kapacitor").with_label("region", "eu");
        let alert = finish_alert(AlertDto::new("a1", "disk"), Some(&ctx), &["name"]);

        assert_eq!(alert.provider_id.as_deref(), Some("kap-1"));
        assert_eq!(alert.labels.get("region").map(String::as_str), Some("eu"));
        assert!(alert.fingerprint.is_some());

        let bare = finish_alert(AlertDto::new("a1", "disk"), None, &[]);
        assert_eq!(bare.provider_id, None);
        assert_eq!(bare.fingerprint, None);
    }

    #[test]
    fn finish_drops_extra_keys_shadowing_known_fields() {
        let ctx = ProviderContext::new("tenant-a", "kap-1", "kapacitor");
        let mut alert = AlertDto::new("a1", "disk");
        alert.extra.insert("providerId".into(), json!("other"));
        alert.extra.insert("fingerprint".into(), json!("forged"));
        alert.extra.insert("host".into(), json!("db-1"));

        let alert = finish_alert(alert, Some(&ctx), &[]);
        assert_eq!(alert.extra.keys().collect::<Vec<_>>(), vec!["host"]);
        assert_eq!(alert.provider_id.as_deref(), Some("kap-1"));
        assert_eq!(alert.fingerprint, None);
    }

    #[test]
    fn formatted_alerts_flatten() {
        let one = FormattedAlerts::from(AlertDto::new("a", "b"));
        assert_eq!(one.len(), 1);
        let many = FormattedAlerts::from(vec![AlertDto::new("a", "b"), AlertDto::new("c", "d")]);
        assert_eq!(many.into_vec().len(), 2);
    }
}
