use crate::AlertDto;
use sha2::{Digest, Sha256};

pub const DEFAULT_FINGERPRINT_FIELDS: &[&str] = &["name"];

/// SHA-256 hex digest over the named fields of `alert`.
///
/// Field names are sorted, and comma-separated values are split, trimmed and
/// sorted before hashing, so neither the declaration order of `fields` nor the
/// order of items inside a list-valued field affects the result. Absent fields
/// hash as empty. An empty `fields` slice falls back to
/// [`DEFAULT_FINGERPRINT_FIELDS`].
pub fn compute_fingerprint(alert: &AlertDto, fields: &[&str]) -> String {
    let fields = if fields.is_empty() {
        DEFAULT_FINGERPRINT_FIELDS
    } else {
        fields
    };

    let mut names = fields.to_vec();
    names.sort_unstable();
    names.dedup();

    let mut hasher = Sha256::new();
    for name in names {
        let value = alert
            .field_value(name)
            .map(|v| canonical_list(&v))
            .unwrap_or_default();
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

fn canonical_list(value: &str) -> String {
    if !value.contains(',') {
        return value.trim().to_string();
    }
    let mut parts = value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>();
    parts.sort_unstable();
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alert_with_hosts(hosts: &str) -> AlertDto {
        let mut alert = AlertDto::new("a1", "disk full");
        alert.extra.insert("hosts".into(), json!(hosts));
        alert
    }

    #[test]
    fn list_order_does_not_change_fingerprint() {
        let a = compute_fingerprint(&alert_with_hosts("web-1,web-2, db-1"), &["name", "hosts"]);
        let b = compute_fingerprint(&alert_with_hosts("db-1,web-2,web-1"), &["hosts", "name"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_values_differ() {
        let a = compute_fingerprint(&alert_with_hosts("web-1"), &["hosts"]);
        let b = compute_fingerprint(&alert_with_hosts("web-2"), &["hosts"]);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_field_list_uses_name() {
        let alert = AlertDto::new("a1", "disk full");
        assert_eq!(
            compute_fingerprint(&alert, &[]),
            compute_fingerprint(&alert, DEFAULT_FINGERPRINT_FIELDS)
        );

        let other = AlertDto::new("a2", "disk full");
        assert_eq!(
            compute_fingerprint(&alert, &[]),
            compute_fingerprint(&other, &[])
        );
    }
}
