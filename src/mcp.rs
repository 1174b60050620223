use serde_json::Value;

// Build an MCP-compliant result envelope for tools/call outputs.
// - content: always a single text block so clients can render something.
// - structuredContent: the full structured output shape.
// - isError: included only when true to keep payloads small.
pub fn mcp_wrap(structured: Value, text_opt: Option<String>, is_error: bool) -> Value {
    let text = match text_opt {
        Some(s) => s,
        None => serde_json::to_string(&structured).unwrap_or_else(|_| "{}".to_string()),
    };
    let mut obj = serde_json::json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": structured,
    });
    if is_error {
        if let Some(map) = obj.as_object_mut() {
            map.insert("isError".to_string(), Value::Bool(true));
        }
    }
    obj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_flag_appears_only_when_set() {
        let ok = mcp_wrap(serde_json::json!({"items": []}), None, false);
        assert!(ok.get("isError").is_none());
        assert!(ok["content"][0]["text"].is_string());

        let err = mcp_wrap(serde_json::json!({"error": {}}), Some("boom".into()), true);
        assert_eq!(err["isError"], Value::Bool(true));
        assert_eq!(err["content"][0]["text"], "boom");
    }
}
