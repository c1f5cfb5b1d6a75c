//! Redaction of secrets in provider configurations.

use serde_json::Value;

const SENSITIVE_MARKERS: &[&str] = &["key", "token", "secret", "password"];

/// Placeholder written in place of redacted values.
pub const REDACTED: &str = "<redacted>";

/// Return a copy of `value` with every sensitive object entry masked.
///
/// An entry is sensitive when its key contains one of `key`, `token`,
/// `secret` or `password`, ignoring case. Nested objects and arrays are
/// walked recursively; null and empty-string secrets are left as they are.
pub fn redact_sensitive(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let redacted = if is_sensitive(k) && !is_blank(v) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_sensitive(v)
                    };
                    (k.clone(), redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive).collect()),
        other => other.clone(),
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
