//! Background self-learning.
//!
//! Two reflections run after a turn, both off the reply path:
//! memory reflection distils at most one durable fact from every exchange,
//! lesson reflection turns a slow, tool-heavy turn into a recipe. Every
//! failure is logged and dropped. The same model also summarises the
//! conversation on exit.

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use aura_core::{Message, Result, Role};
use aura_llm::{LlmProvider, LlmRequest};
use aura_memory::seed::LEARNED_SOURCE;
use aura_memory::{AddOutcome, MemoryCategory, MemoryMeta, MemoryStore, RecipeMeta};

use crate::performance::PerformanceSample;

/// Bounded pool for reflection tasks.
#[derive(Clone)]
pub struct ReflectionPool {
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
}

impl ReflectionPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            tracker: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Spawn a reflection. It waits for a permit before running.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        self.tracker.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                debug!(task = name, "reflection pool closed, skipping");
                return;
            };
            task.await;
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every spawned reflection has finished. The pool stays usable.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Drain outstanding work and stop accepting permits.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.permits.close();
    }
}

impl Default for ReflectionPool {
    fn default() -> Self {
        Self::new(2)
    }
}

const NOTHING_MARKER: &str = "NONE";

const MEMORY_PROMPT: &str = "You maintain a long-term memory about the user of a voice assistant. \
Read the exchange below and decide whether it reveals ONE durable fact worth remembering \
(a preference, a personal fact, an upcoming event, or an ongoing task). Ignore small talk, \
one-off requests and anything about the assistant itself.\n\n\
If there is such a fact, reply with exactly one JSON object:\n\
{\"content\": \"<the fact, one sentence, third person>\", \
\"category\": \"preference|fact|event|task|general\", \"importance\": <1-5>}\n\
Otherwise reply with exactly: NONE";

const LESSON_PROMPT: &str = "A voice assistant just finished a task too slowly. \
Work out the single most useful lesson that would make the same kind of task fast next time. \
The lesson must be a concrete instruction naming which tool to use and what to skip.\n\n\
Reply with exactly one JSON object:\n\
{\"lesson\": \"<imperative instruction>\"}\n\
If there is nothing to learn, reply with exactly: NONE";

const KEYWORD_PROMPT: &str = "Below is a lesson a voice assistant learned about one kind of task. \
Extract 3 to 5 short keywords describing the KIND of task it applies to, \
so similar future requests can be matched. Reply with exactly one JSON object:\n\
{\"keywords\": [\"...\", \"...\", \"...\"]}";

const SUMMARY_PROMPT: &str = "Summarise the key information in the conversation below \
in at most 100 words. Keep names, preferences, plans and open tasks; drop small talk.";

/// Fewer keywords than this is too vague to match on.
const MIN_KEYWORDS: usize = 3;
const MAX_KEYWORDS: usize = 5;

#[derive(Debug, Deserialize)]
struct MemoryVerdict {
    content: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    importance: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct LessonVerdict {
    lesson: String,
}

#[derive(Debug, Deserialize)]
struct KeywordVerdict {
    keywords: Vec<String>,
}

/// Runs the reflection prompts against a (usually cheaper) model.
#[derive(Clone)]
pub struct Reflector {
    llm: Arc<dyn LlmProvider>,
    memory: Arc<MemoryStore>,
    model: String,
    temperature: f32,
}

impl Reflector {
    pub fn new(llm: Arc<dyn LlmProvider>, memory: Arc<MemoryStore>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            llm,
            memory,
            model: model.into(),
            temperature,
        }
    }

    async fn ask(&self, system: &str, user: String) -> Result<String> {
        let request = LlmRequest::plain(
            self.model.clone(),
            vec![Message::system(system), Message::user(user)],
            self.temperature,
        );
        let response = self.llm.complete(&request).await?;
        Ok(response.completion.text().unwrap_or_default().trim().to_string())
    }

    /// Distil at most one memory from an exchange. `Ok(None)` when the model
    /// found nothing or answered with something unparseable.
    pub async fn reflect_memory(&self, user_input: &str, reply: &str) -> Result<Option<AddOutcome>> {
        let answer = self
            .ask(MEMORY_PROMPT, format!("User: {user_input}\nAssistant: {reply}"))
            .await?;
        if is_nothing(&answer) {
            debug!("memory reflection: nothing to remember");
            return Ok(None);
        }
        let Some(verdict) = parse_json_object::<MemoryVerdict>(&answer) else {
            debug!(answer = %answer, "memory reflection returned no usable JSON");
            return Ok(None);
        };
        if verdict.content.trim().is_empty() {
            return Ok(None);
        }

        let category = verdict
            .category
            .as_deref()
            .and_then(|c| c.parse::<MemoryCategory>().ok())
            .unwrap_or(MemoryCategory::General);
        let importance = verdict.importance.as_ref().and_then(importance_from).unwrap_or(3);

        let outcome = self
            .memory
            .add_memory(verdict.content.trim(), category, MemoryMeta::new(importance, "auto_reflection"))
            .await?;
        match &outcome {
            AddOutcome::Inserted(id) => info!(%id, %category, importance, "reflected new memory"),
            AddOutcome::Duplicate(id) => debug!(%id, "reflected memory already known"),
        }
        Ok(Some(outcome))
    }

    /// Turn a slow turn into a recipe keyed by task keywords.
    pub async fn learn_lesson(&self, sample: &PerformanceSample, reply: &str) -> Result<Option<AddOutcome>> {
        let report = format!(
            "Task: {}\nTime taken: {:.1}s\nTool calls ({}): {}\nFinal reply: {}",
            sample.task,
            sample.elapsed_secs,
            sample.tool_count,
            sample.tool_sequence.join(" → "),
            reply.chars().take(300).collect::<String>(),
        );
        let answer = self.ask(LESSON_PROMPT, report).await?;
        if is_nothing(&answer) {
            debug!(task = %sample.task, "lesson reflection: nothing to learn");
            return Ok(None);
        }
        let Some(verdict) = parse_json_object::<LessonVerdict>(&answer) else {
            debug!(answer = %answer, "lesson reflection returned no usable JSON");
            return Ok(None);
        };
        let lesson = verdict.lesson.trim();
        if lesson.is_empty() {
            return Ok(None);
        }

        let trigger = match self.lesson_keywords(lesson).await {
            Some(keywords) => keywords,
            None => sample.task.clone(),
        };

        let meta = RecipeMeta::new(3, LEARNED_SOURCE).learned_from(
            sample.elapsed_secs,
            sample.tool_sequence.clone(),
            sample.task.clone(),
        );
        let outcome = self.memory.add_recipe(&trigger, lesson, meta).await?;
        if outcome.is_inserted() {
            info!(trigger = %trigger, "learned new recipe from slow turn");
        }
        Ok(Some(outcome))
    }

    /// Second pass of lesson reflection: keywords for the kind of task the
    /// lesson covers. `None` on any failure or when fewer than three come back.
    async fn lesson_keywords(&self, lesson: &str) -> Option<String> {
        let answer = match self.ask(KEYWORD_PROMPT, lesson.to_string()).await {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "keyword extraction failed, using task text as trigger");
                return None;
            }
        };
        let verdict = parse_json_object::<KeywordVerdict>(&answer)?;
        let keywords: Vec<String> = verdict
            .keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .take(MAX_KEYWORDS)
            .collect();
        if keywords.len() < MIN_KEYWORDS {
            debug!(count = keywords.len(), "too few keywords, using task text as trigger");
            return None;
        }
        Some(keywords.join(" "))
    }

    /// Condense a finished conversation into a short summary for the next
    /// session. `Ok(None)` when there is no complete exchange to summarise.
    pub async fn summarize(&self, history: &[Message]) -> Result<Option<String>> {
        if history.len() < 2 {
            return Ok(None);
        }
        let transcript = history
            .iter()
            .filter_map(|m| match m.role {
                Role::User => Some(format!("User: {}", m.text())),
                Role::Assistant => Some(format!("Aura: {}", m.text())),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        let answer = self.ask(SUMMARY_PROMPT, transcript).await?;
        if answer.is_empty() {
            return Ok(None);
        }
        Ok(Some(answer))
    }
}

fn is_nothing(answer: &str) -> bool {
    let trimmed = answer.trim().trim_matches('`').trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOTHING_MARKER)
}

fn importance_from(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(n.round().clamp(1.0, 5.0) as u8)
}

/// Parse the first JSON object in a model answer, tolerating code fences
/// and chatter around it.
pub(crate) fn parse_json_object<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_llm::{HashEmbedding, MockProvider};
    use std::time::Duration;

    fn memory() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::open_in_memory(Arc::new(HashEmbedding::new(128))).unwrap())
    }

    #[test]
    fn test_parse_json_tolerates_fences() {
        let v: MemoryVerdict =
            parse_json_object("```json\n{\"content\": \"likes jazz\", \"importance\": 4}\n```").unwrap();
        assert_eq!(v.content, "likes jazz");
        assert!(parse_json_object::<MemoryVerdict>("no json here").is_none());
        assert!(parse_json_object::<MemoryVerdict>("} backwards {").is_none());
    }

    #[test]
    fn test_nothing_marker() {
        assert!(is_nothing("NONE"));
        assert!(is_nothing(" none \n"));
        assert!(is_nothing("`NONE`"));
        assert!(!is_nothing("{\"content\": \"x\"}"));
    }

    #[test]
    fn test_importance_parsing_clamps() {
        assert_eq!(importance_from(&serde_json::json!(9)), Some(5));
        assert_eq!(importance_from(&serde_json::json!("2")), Some(2));
        assert_eq!(importance_from(&serde_json::json!(0)), Some(1));
        assert_eq!(importance_from(&serde_json::json!(null)), None);
    }

    #[tokio::test]
    async fn test_reflect_memory_stores_fact() {
        let mem = memory();
        let llm = Arc::new(MockProvider::new("reflect").with_response(
            r#"{"content": "The user is vegetarian", "category": "preference", "importance": 4}"#,
        ));
        let r = Reflector::new(llm, mem.clone(), "m", 0.1);
        let outcome = r.reflect_memory("I don't eat meat", "Noted!").await.unwrap().unwrap();
        assert!(outcome.is_inserted());
        let all = mem.list_memories();
        assert_eq!(all[0].category, MemoryCategory::Preference);
        assert_eq!(all[0].meta.importance, 4);
        assert_eq!(all[0].meta.source, "auto_reflection");
    }

    #[tokio::test]
    async fn test_reflect_memory_none_is_noop() {
        let mem = memory();
        let llm = Arc::new(MockProvider::new("reflect").with_response("NONE"));
        let r = Reflector::new(llm, mem.clone(), "m", 0.1);
        assert!(r.reflect_memory("hi", "hello").await.unwrap().is_none());
        assert!(mem.list_memories().is_empty());
    }

    #[tokio::test]
    async fn test_learn_lesson_falls_back_to_task_when_keywords_fail() {
        let mem = memory();
        let llm = Arc::new(
            MockProvider::new("reflect")
                .with_response(r#"{"lesson": "Use find_file once with the name pattern"}"#)
                .with_error("keyword model down"),
        );
        let r = Reflector::new(llm, mem.clone(), "m", 0.1);
        let sample = PerformanceSample::new(
            "find my tax return",
            Duration::from_secs(40),
            vec!["ls".into(), "ls".into(), "ls".into(), "find".into()],
        );
        r.learn_lesson(&sample, "Found it").await.unwrap();
        let recipes = mem.list_recipes();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].trigger, "find my tax return");
        assert_eq!(recipes[0].meta.source, LEARNED_SOURCE);
        assert_eq!(recipes[0].meta.tools.len(), 4);
    }

    fn slow_sample() -> PerformanceSample {
        PerformanceSample::new(
            "uh can you find that tax thing please",
            Duration::from_secs(35),
            vec!["ls".into(), "ls".into(), "find".into(), "open".into()],
        )
    }

    #[tokio::test]
    async fn test_keywords_are_derived_from_the_lesson() {
        let mem = memory();
        let llm = Arc::new(
            MockProvider::new("reflect")
                .with_response(r#"{"lesson": "Use find_file once with the exact document name"}"#)
                .with_response(r#"{"keywords": ["find", "document", "file", "search"]}"#),
        );
        let r = Reflector::new(llm.clone(), mem.clone(), "m", 0.1);
        r.learn_lesson(&slow_sample(), "Here it is").await.unwrap();

        let keyword_request = llm.last_request().unwrap();
        assert_eq!(
            keyword_request.messages[1].text(),
            "Use find_file once with the exact document name"
        );
        assert!(!keyword_request.messages[1].text().contains("tax thing"));
        assert_eq!(mem.list_recipes()[0].trigger, "find document file search");
    }

    #[tokio::test]
    async fn test_too_few_keywords_fall_back_to_task() {
        let mem = memory();
        let llm = Arc::new(
            MockProvider::new("reflect")
                .with_response(r#"{"lesson": "Use find_file once with the exact document name"}"#)
                .with_response(r#"{"keywords": ["find", ""]}"#),
        );
        let r = Reflector::new(llm, mem.clone(), "m", 0.1);
        r.learn_lesson(&slow_sample(), "Here it is").await.unwrap();
        assert_eq!(mem.list_recipes()[0].trigger, "uh can you find that tax thing please");
    }

    #[tokio::test]
    async fn test_keywords_capped_at_five() {
        let mem = memory();
        let llm = Arc::new(
            MockProvider::new("reflect")
                .with_response(r#"{"lesson": "Open the calendar app directly"}"#)
                .with_response(r#"{"keywords": ["a1", "b2", "c3", "d4", "e5", "f6", "g7"]}"#),
        );
        let r = Reflector::new(llm, mem.clone(), "m", 0.1);
        r.learn_lesson(&slow_sample(), "Done").await.unwrap();
        assert_eq!(mem.list_recipes()[0].trigger, "a1 b2 c3 d4 e5");
    }

    #[tokio::test]
    async fn test_summarize_sends_transcript() {
        let llm = Arc::new(MockProvider::new("reflect").with_response("  Sam is planning a trip to Porto.  "));
        let r = Reflector::new(llm.clone(), memory(), "m", 0.1);

        assert!(r.summarize(&[Message::user("hi")]).await.unwrap().is_none());
        assert_eq!(llm.request_count(), 0);

        let history = vec![
            Message::user("I'm going to Porto next week"),
            Message::assistant("Sounds lovely!"),
        ];
        let summary = r.summarize(&history).await.unwrap();
        assert_eq!(summary.as_deref(), Some("Sam is planning a trip to Porto."));
        let transcript = llm.last_request().unwrap().messages[1].text().to_string();
        assert_eq!(transcript, "User: I'm going to Porto next week\nAura: Sounds lovely!");
    }

    #[tokio::test]
    async fn test_pool_wait_idle_then_reuse() {
        let pool = ReflectionPool::new(1);
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        for _ in 0..3 {
            let c = counter.clone();
            pool.spawn("count", async move {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            });
        }
        pool.wait_idle().await;
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 3);

        let c = counter.clone();
        pool.spawn("count", async move {
            c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        pool.shutdown().await;
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 4);
    }
}
