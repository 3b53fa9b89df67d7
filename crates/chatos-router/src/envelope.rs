//! The `{chatos: {status, server, tool}}` response envelope (§4.10).

use serde_json::{Value, json};

/// Wrap a tool's result payload with the router's identifying envelope.
///
/// `payload` is expected to be a JSON object; non-object payloads are
/// coerced to `{}` before the envelope field is added so the result is
/// always an object.
#[must_use]
pub fn with_chatos(server_name: &str, tool: &str, payload: Value, status: &str) -> Value {
    let mut object = payload.as_object().cloned().unwrap_or_default();
    object.insert(
        "chatos".to_string(),
        json!({ "status": status, "server": server_name, "tool": tool }),
    );
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_object_payload() {
        let wrapped = with_chatos("sub_agent_router", "get_sub_agent", json!({"agent_id": "x"}), "ok");
        assert_eq!(wrapped["chatos"]["status"], "ok");
        assert_eq!(wrapped["chatos"]["server"], "sub_agent_router");
        assert_eq!(wrapped["chatos"]["tool"], "get_sub_agent");
        assert_eq!(wrapped["agent_id"], "x");
    }

    #[test]
    fn coerces_non_object_payload() {
        let wrapped = with_chatos("sub_agent_router", "t", json!(null), "error");
        assert!(wrapped.is_object());
        assert_eq!(wrapped["chatos"]["status"], "error");
    }
}
