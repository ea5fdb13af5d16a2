use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use super::CacheError;

/// Extra request settings that take part in the fingerprint (temperature, agent name, ...).
pub type ExtraConfig = BTreeMap<String, Value>;

/// Hex-encoded SHA-256 fingerprint of a normalized request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First few hex chars, enough to correlate log lines
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the cache key for a `(prompt, model, config)` request.
///
/// The prompt is trimmed and lowercased, then the three parts are written as a
/// JSON document with every object's keys sorted and hashed with SHA-256. Two
/// requests that differ only in prompt casing, surrounding whitespace or config
/// key order therefore share a key.
pub fn compute_key(
    prompt: &str,
    model: &str,
    extra_config: Option<&ExtraConfig>,
) -> Result<CacheKey, CacheError> {
    let normalized_prompt = prompt.trim().to_lowercase();
    if normalized_prompt.is_empty() {
        return Err(CacheError::InvalidInput("prompt is empty"));
    }
    if model.is_empty() {
        return Err(CacheError::InvalidInput("model identifier is empty"));
    }

    let config: Map<String, Value> = extra_config
        .map(|cfg| cfg.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    let mut descriptor = Map::new();
    descriptor.insert("prompt".to_string(), Value::String(normalized_prompt));
    descriptor.insert("model".to_string(), Value::String(model.to_string()));
    descriptor.insert("config".to_string(), Value::Object(config));

    let mut canonical = String::new();
    write_canonical(&Value::Object(descriptor), &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(CacheKey(format!("{:x}", hasher.finalize())))
}

// serde_json's map ordering depends on the `preserve_order` feature, which any
// dependency can switch on, so key order is fixed here explicitly.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
