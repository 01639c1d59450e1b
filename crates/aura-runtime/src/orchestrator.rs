use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use aura_config::AuraConfig;
use aura_core::{AuraError, Message, ToolCall, ToolExecutor, ToolSchema};
use aura_llm::{Completion, LlmProvider, LlmRequest, RetryPolicy, ToolChoice};
use aura_memory::MemoryStore;

use crate::history::ConversationHistory;
use crate::performance::{PerformanceMonitor, PerformanceSample};
use crate::reflection::{ReflectionPool, Reflector};
use crate::session::SessionStore;

/// Reply when the model cannot be reached after retries.
pub const APOLOGY_REPLY: &str =
    "Sorry, I'm having trouble reaching my brain right now. Please try again in a moment.";

/// Reply when the tool-calling loop hits its iteration cap.
pub const TOO_COMPLEX_REPLY: &str =
    "This task is too complex for me to finish in one go. Could you break it into smaller steps?";

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_iterations: u32,
    pub max_history: usize,
    /// `None` lets tools run as long as they like.
    pub tool_timeout: Option<Duration>,
    /// Memories pulled into the system prompt per turn.
    pub context_results: usize,
    pub memory_reflection: bool,
    pub lesson_reflection: bool,
    pub reflection_model: String,
    pub reflection_temperature: f32,
    pub max_concurrent_reflections: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AuraConfig::default())
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &AuraConfig) -> Self {
        let agent = &config.agent;
        Self {
            model: agent.model.clone(),
            temperature: agent.temperature,
            max_tokens: agent.max_tokens,
            max_iterations: agent.max_iterations,
            max_history: agent.max_history,
            tool_timeout: (agent.tool_timeout_secs > 0)
                .then(|| Duration::from_secs(agent.tool_timeout_secs)),
            context_results: config.memory.context_results,
            memory_reflection: config.learning.memory_reflection,
            lesson_reflection: config.learning.lesson_reflection,
            reflection_model: config.reflection_model().to_string(),
            reflection_temperature: config.learning.reflection_temperature,
            max_concurrent_reflections: config.learning.max_concurrent_reflections,
        }
    }
}

/// Drives one user utterance to one reply, then learns from the turn in the
/// background.
pub struct Orchestrator {
    llm: Arc<dyn LlmProvider>,
    memory: Arc<MemoryStore>,
    settings: OrchestratorSettings,
    retry: RetryPolicy,
    history: ConversationHistory,
    monitor: PerformanceMonitor,
    reflector: Reflector,
    pool: ReflectionPool,
    session: Option<Arc<dyn SessionStore>>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmProvider>, memory: Arc<MemoryStore>, settings: OrchestratorSettings) -> Self {
        let reflector = Reflector::new(
            llm.clone(),
            memory.clone(),
            settings.reflection_model.clone(),
            settings.reflection_temperature,
        );
        Self {
            history: ConversationHistory::new(settings.max_history),
            pool: ReflectionPool::new(settings.max_concurrent_reflections),
            monitor: PerformanceMonitor::default(),
            retry: RetryPolicy::default(),
            session: None,
            reflector,
            llm,
            memory,
            settings,
        }
    }

    /// Build with every knob taken from `config`.
    pub fn from_config(llm: Arc<dyn LlmProvider>, memory: Arc<MemoryStore>, config: &AuraConfig) -> Self {
        let retry = RetryPolicy::new(
            config.retry.max_retries,
            Duration::from_millis(config.retry.base_delay_ms),
            Duration::from_millis(config.retry.rate_limit_step_ms),
        );
        let monitor = PerformanceMonitor::new(
            config.learning.sample_capacity,
            config.learning.slow_threshold_secs,
            config.learning.tool_count_threshold,
        );
        Self::new(llm, memory, OrchestratorSettings::from_config(config))
            .with_retry(retry)
            .with_monitor(monitor)
    }

    pub fn with_session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_monitor(mut self, monitor: PerformanceMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Run reflections against a different provider than the chat model.
    pub fn with_reflection_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.reflector = Reflector::new(
            llm,
            self.memory.clone(),
            self.settings.reflection_model.clone(),
            self.settings.reflection_temperature,
        );
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Process one utterance. Always returns a reply; model and tool
    /// failures are turned into text.
    pub async fn chat(
        &mut self,
        user_input: &str,
        system_content: &str,
        tools: &[ToolSchema],
        executor: &dyn ToolExecutor,
    ) -> String {
        let started = Instant::now();

        let system = self.build_system_prompt(user_input, system_content).await;
        let user_message = match self.memory.recipe_hint(user_input).await {
            Ok(Some(hint)) => {
                debug!("prepending recipe hint");
                format!("{hint}\n{user_input}")
            }
            Ok(None) => user_input.to_string(),
            Err(e) => {
                warn!(error = %e, "recipe recall failed");
                user_input.to_string()
            }
        };

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(self.history.messages().iter().cloned());
        messages.push(Message::user(user_message));

        let (reply, tool_sequence) = self.run_loop(messages, tools, executor).await;

        let sample = PerformanceSample::new(user_input, started.elapsed(), tool_sequence);
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            tools = sample.tool_count,
            "turn finished"
        );
        if self.monitor.record(sample.clone()) && self.settings.lesson_reflection {
            let reflector = self.reflector.clone();
            let reply = reply.clone();
            self.pool.spawn("lesson", async move {
                if let Err(e) = reflector.learn_lesson(&sample, &reply).await {
                    warn!(error = %e, "lesson reflection failed");
                }
            });
        }

        self.history.push_exchange(user_input, &reply);

        if self.settings.memory_reflection && !is_fallback_reply(&reply) {
            let reflector = self.reflector.clone();
            let input = user_input.to_string();
            let reply = reply.clone();
            self.pool.spawn("memory", async move {
                if let Err(e) = reflector.reflect_memory(&input, &reply).await {
                    warn!(error = %e, "memory reflection failed");
                }
            });
        }

        if let Some(session) = &self.session
            && let Err(e) = session.touch()
        {
            warn!(error = %e, "failed to update session");
        }

        reply
    }

    /// System prompt plus the session profile and summary, the pending
    /// performance hint and memory context.
    async fn build_system_prompt(&mut self, user_input: &str, system_content: &str) -> String {
        let mut system = system_content.to_string();
        if let Some(session) = &self.session {
            match session.load() {
                Ok(state) => system.push_str(&state.prompt_context()),
                Err(e) => warn!(error = %e, "failed to load session"),
            }
        }
        if let Some(hint) = self.monitor.take_hint() {
            info!("injecting performance hint");
            system.push_str("\n\n");
            system.push_str(hint.text());
        }
        match self
            .memory
            .get_memory_context(user_input, self.settings.context_results)
            .await
        {
            Ok(ctx) => system.push_str(&ctx),
            Err(e) => warn!(error = %e, "memory context lookup failed"),
        }
        system
    }

    /// The bounded tool-calling loop. Returns the reply and the names of
    /// every tool called, in order.
    async fn run_loop(
        &self,
        mut messages: Vec<Message>,
        tools: &[ToolSchema],
        executor: &dyn ToolExecutor,
    ) -> (String, Vec<String>) {
        let mut tool_sequence = Vec::new();

        for iteration in 1..=self.settings.max_iterations {
            let request = LlmRequest {
                model: self.settings.model.clone(),
                messages: messages.clone(),
                tools: tools.to_vec(),
                tool_choice: if tools.is_empty() { ToolChoice::None } else { ToolChoice::Auto },
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            };

            let response = match self.retry.complete(self.llm.as_ref(), &request).await {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, iteration, "llm call failed");
                    return (APOLOGY_REPLY.to_string(), tool_sequence);
                }
            };

            match response.completion {
                Completion::Text(text) => return (text, tool_sequence),
                Completion::ToolCalls { text, calls } if calls.is_empty() => {
                    return (text.unwrap_or_default(), tool_sequence);
                }
                Completion::ToolCalls { text, calls } => {
                    debug!(iteration, count = calls.len(), "model requested tools");
                    messages.push(Message::assistant_tool_calls(text, calls.clone()));
                    for call in &calls {
                        tool_sequence.push(call.name.clone());
                        let output = self.run_tool(call, executor).await;
                        messages.push(Message::tool_result(call.id.clone(), output));
                    }
                }
            }
        }

        warn!(max = self.settings.max_iterations, "iteration cap reached");
        (TOO_COMPLEX_REPLY.to_string(), tool_sequence)
    }

    /// Execute one call. Every failure, including a panic or timeout, comes
    /// back as text for the model.
    async fn run_tool(&self, call: &ToolCall, executor: &dyn ToolExecutor) -> String {
        let args = match call.parse_arguments() {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "malformed tool arguments");
                return format!("Error: {e}");
            }
        };

        let started = Instant::now();
        let guarded = AssertUnwindSafe(executor.execute(&call.name, &args)).catch_unwind();
        let outcome = match self.settings.tool_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let e = AuraError::ToolTimeout {
                        tool: call.name.clone(),
                        secs: limit.as_secs(),
                    };
                    warn!(error = %e, "tool timed out");
                    return format!("Error: {e}");
                }
            },
            None => guarded.await,
        };

        match outcome {
            Ok(Ok(output)) => {
                debug!(tool = %call.name, elapsed_ms = started.elapsed().as_millis() as u64, "tool ok");
                output
            }
            Ok(Err(e)) => {
                warn!(tool = %call.name, error = %e, "tool failed");
                format!("Error: {e}")
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(tool = %call.name, reason = %reason, "tool panicked");
                format!(
                    "Error: {}",
                    AuraError::ToolExecution {
                        tool: call.name.clone(),
                        reason: format!("panicked: {reason}"),
                    }
                )
            }
        }
    }

    /// Wait for every background reflection to finish.
    pub async fn wait_for_reflections(&self) {
        self.pool.wait_idle().await;
    }

    /// Drain background work, then summarise the conversation into the
    /// session so the next run can pick up where this one stopped.
    pub async fn shutdown(&self) {
        debug!(pending = self.pool.in_flight(), "draining reflections");
        self.pool.shutdown().await;

        let Some(session) = &self.session else {
            return;
        };
        let summary = match self.reflector.summarize(self.history.messages()).await {
            Ok(Some(summary)) => summary,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "conversation summary failed");
                return;
            }
        };
        let saved = session.load().and_then(|mut state| {
            state.record_summary(&summary);
            session.save(&state)
        });
        match saved {
            Ok(()) => info!("saved conversation summary"),
            Err(e) => warn!(error = %e, "failed to save conversation summary"),
        }
    }
}

/// Fixed replies carry nothing worth reflecting on.
fn is_fallback_reply(reply: &str) -> bool {
    reply == APOLOGY_REPLY || reply == TOO_COMPLEX_REPLY
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_tool_timeout_disables_it() {
        let mut config = AuraConfig::default();
        config.agent.tool_timeout_secs = 0;
        assert!(OrchestratorSettings::from_config(&config).tool_timeout.is_none());
        assert_eq!(
            OrchestratorSettings::default().tool_timeout,
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_reflection_model_falls_back_to_chat_model() {
        let settings = OrchestratorSettings::default();
        assert_eq!(settings.reflection_model, settings.model);
    }

    #[test]
    fn test_fallback_replies_are_recognised() {
        assert!(is_fallback_reply(APOLOGY_REPLY));
        assert!(is_fallback_reply(TOO_COMPLEX_REPLY));
        assert!(!is_fallback_reply("Sorry, I couldn't find that file."));
    }

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(s.as_ref()), "boom");
        let s: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(s.as_ref()), "bang");
        let s: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic");
    }
}
