#[cfg(test)]
mod tests {
    use aura_core::{AuraError, Message, RetryClass, ToolCall};
    use aura_llm::*;
    use std::time::Duration;

    fn request() -> LlmRequest {
        LlmRequest::plain("test-model", vec![Message::user("hello")], 0.2)
    }

    // ── Completions ────────────────────────────────────────────

    #[test]
    fn test_completion_to_message_keeps_calls() {
        let completion = Completion::ToolCalls {
            text: Some("Let me check.".into()),
            calls: vec![ToolCall::new("c1", "screenshot", "")],
        };
        let msg = completion.to_message();
        assert_eq!(msg.text(), "Let me check.");
        assert_eq!(msg.tool_calls.len(), 1);
    }

    // ── Retry policy ───────────────────────────────────────────

    #[tokio::test]
    async fn test_policy_retries_only_transient_classes() {
        let policy = RetryPolicy::immediate(2);
        let provider = MockProvider::new("mock")
            .with_err(AuraError::LlmConnection("refused".into()))
            .with_err(AuraError::RateLimited { retry_after_secs: 3 })
            .with_response("ok");
        let resp = policy.complete(&provider, &request()).await.unwrap();
        assert_eq!(resp.completion.text(), Some("ok"));
        assert_eq!(provider.request_count(), 3);

        let provider = MockProvider::new("mock").with_error("malformed body");
        assert!(policy.complete(&provider, &request()).await.is_err());
        assert_eq!(provider.request_count(), 1);
    }

    // ── HTTP provider failure mapping ──────────────────────────

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        // Port 9 (discard) is closed on loopback.
        let provider = OpenAiProvider::new("sk-test".into(), "http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = provider.complete(&request()).await.unwrap_err();
        assert_eq!(err.retry_class(), RetryClass::Transient, "got {err}");
    }

    #[tokio::test]
    async fn test_unreachable_embedding_endpoint_errors() {
        let embedder = OpenAiEmbedding::new("sk-test".into(), "http://127.0.0.1:9", "text-embedding-3-small", 8);
        assert!(embedder.embed(&["hello"]).await.is_err());
        assert_eq!(embedder.dimensions(), 8);
    }

    // ── Local embedder ─────────────────────────────────────────

    #[tokio::test]
    async fn test_hash_embedding_batch_matches_single() {
        let e = HashEmbedding::new(64);
        let batch = e.embed(&["open the browser", "play some jazz"]).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], e.encode("play some jazz"));
        assert_eq!(e.embed_one("open the browser").await.unwrap(), batch[0]);
    }
}
