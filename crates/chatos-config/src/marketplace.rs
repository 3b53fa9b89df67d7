//! Merging active marketplace records into one effective manifest (§3, §4.1,
//! §8 "Marketplace merge preserves first-occurrence order").

use serde_json::{Map, Value};

use crate::types::MarketplaceRecord;

/// A plugin's merge key, used to de-duplicate across active records: its
/// `source` path if present, else its `name`, else its full JSON form.
fn plugin_key(plugin: &Value) -> String {
    if let Some(source) = plugin.get("source").and_then(Value::as_str) {
        return format!("source:{source}");
    }
    if let Some(name) = plugin.get("name").and_then(Value::as_str) {
        return format!("name:{name}");
    }
    format!("json:{plugin}")
}

/// Merge the `plugins` arrays of every active record's manifest JSON into a
/// single `{"plugins": [...]}` document, keeping the first occurrence of
/// each plugin key and otherwise preserving record order.
///
/// `records` must already be filtered to active records and sorted into a
/// deterministic visiting order by the caller.
#[must_use]
pub fn merge_effective_manifest(records: &[MarketplaceRecord]) -> Value {
    let mut seen = std::collections::HashSet::new();
    let mut plugins = Vec::new();
    for record in records {
        let Some(list) = record.json.get("plugins").and_then(Value::as_array) else {
            continue;
        };
        for plugin in list {
            let key = plugin_key(plugin);
            if seen.insert(key) {
                plugins.push(plugin.clone());
            }
        }
    }
    let mut root = Map::new();
    root.insert("plugins".to_string(), Value::Array(plugins));
    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, plugins: Value) -> MarketplaceRecord {
        MarketplaceRecord {
            id: id.to_string(),
            name: id.to_string(),
            json: serde_json::json!({ "plugins": plugins }),
            plugin_count: 0,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn merge_dedupes_by_source_keeping_first() {
        let a = record(
            "a",
            serde_json::json!([{"source": "./p1", "name": "first"}]),
        );
        let b = record(
            "b",
            serde_json::json!([{"source": "./p1", "name": "second"}]),
        );
        let merged = merge_effective_manifest(&[a, b]);
        let plugins = merged["plugins"].as_array().unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0]["name"], "first");
    }

    #[test]
    fn merge_falls_back_to_name_then_json() {
        let a = record("a", serde_json::json!([{"name": "p"}]));
        let b = record("b", serde_json::json!([{"name": "p"}]));
        let c = record("c", serde_json::json!([{"other": 1}]));
        let merged = merge_effective_manifest(&[a, b, c]);
        assert_eq!(merged["plugins"].as_array().unwrap().len(), 2);
    }
}
