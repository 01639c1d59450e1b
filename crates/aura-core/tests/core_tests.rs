#[cfg(test)]
mod tests {
    use aura_core::*;

    // ── Message tests ──────────────────────────────────────────

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "hello");
        assert!(msg.tool_calls.is_empty());
        assert!(msg.tool_call_id.is_none());
    }

    #[test]
    fn test_tool_call_message_keeps_calls_verbatim() {
        let call = ToolCall::new("call_1", "search", r#"{"q": "rust"}"#);
        let msg = Message::assistant_tool_calls(None, vec![call.clone()]);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.text(), "");
        assert_eq!(msg.tool_calls, vec![call]);
    }

    #[test]
    fn test_tool_result_links_call_id() {
        let msg = Message::tool_result("call_9", "ok");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));
        assert_eq!(msg.text(), "ok");
    }

    #[test]
    fn test_message_serde_skips_empty_fields() {
        let msg = Message::user("test message");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_call_id").is_none());
        let restored: Message = serde_json::from_value(json).unwrap();
        assert_eq!(restored.text(), "test message");
    }

    // ── Tool call tests ────────────────────────────────────────

    #[test]
    fn test_parse_arguments_object() {
        let call = ToolCall::new("1", "open", r#"{"path": "/tmp/x", "lines": 3}"#);
        let args = call.parse_arguments().unwrap();
        assert_eq!(args["path"], "/tmp/x");
        assert_eq!(args["lines"], 3);
    }

    #[test]
    fn test_parse_arguments_empty_is_empty_object() {
        let call = ToolCall::new("1", "now", "  ");
        assert!(call.parse_arguments().unwrap().is_empty());
    }

    #[test]
    fn test_parse_arguments_malformed() {
        let call = ToolCall::new("1", "open", r#"{"path": "/tmp"#);
        let err = call.parse_arguments().unwrap_err();
        assert!(matches!(err, AuraError::ToolArguments { ref tool, .. } if tool == "open"));
    }

    #[test]
    fn test_parse_arguments_rejects_non_object() {
        let call = ToolCall::new("1", "open", "[1, 2]");
        assert!(call.parse_arguments().is_err());
    }

    // ── Error tests ────────────────────────────────────────────

    #[test]
    fn test_error_display() {
        let err = AuraError::ToolTimeout {
            tool: "browser".into(),
            secs: 120,
        };
        assert_eq!(err.to_string(), "tool browser timed out after 120s");
    }

    #[test]
    fn test_error_from_serde() {
        let bad: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: AuraError = bad.unwrap_err().into();
        assert!(matches!(err, AuraError::Serialization(_)));
        assert_eq!(err.retry_class(), RetryClass::Fatal);
    }
}
