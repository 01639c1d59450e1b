use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use aura_core::{AuraError, Result, ToolExecutor, ToolSchema};

/// A tool with strongly typed arguments.
///
/// Arguments are deserialized from the model's JSON once, at the registry
/// boundary. A mismatch is reported as [`AuraError::ToolArguments`] and fed
/// back to the model like any other tool failure.
#[async_trait]
pub trait TypedTool: Send + Sync + 'static {
    const NAME: &'static str;
    type Args: DeserializeOwned + Send;

    fn schema(&self) -> ToolSchema;

    async fn call(&self, args: Self::Args) -> Result<String>;
}

#[async_trait]
trait ErasedTool: Send + Sync {
    async fn invoke(&self, args: &Map<String, Value>) -> Result<String>;
}

struct Erased<T>(T);

#[async_trait]
impl<T: TypedTool> ErasedTool for Erased<T> {
    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let parsed: T::Args =
            serde_json::from_value(Value::Object(args.clone())).map_err(|e| AuraError::ToolArguments {
                tool: T::NAME.to_string(),
                reason: e.to_string(),
            })?;
        self.0.call(parsed).await
    }
}

/// Name → handler command table.
///
/// Built-in tools are registered as [`TypedTool`]s. Anything else goes to
/// an optional fallback executor (the host's desktop, browser or remote tools).
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, (ToolSchema, Arc<dyn ErasedTool>)>,
    fallback: Option<(Arc<dyn ToolExecutor>, Vec<ToolSchema>)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed tool. A tool with the same name is replaced.
    pub fn register<T: TypedTool>(&mut self, tool: T) -> &mut Self {
        let schema = tool.schema();
        debug!(tool = T::NAME, "registered tool");
        self.tools
            .insert(T::NAME.to_string(), (schema, Arc::new(Erased(tool))));
        self
    }

    /// Route unknown names to `executor`, advertising `schemas` to the model.
    pub fn with_fallback(mut self, executor: Arc<dyn ToolExecutor>, schemas: Vec<ToolSchema>) -> Self {
        self.fallback = Some((executor, schemas));
        self
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
            || self
                .fallback
                .as_ref()
                .is_some_and(|(_, schemas)| schemas.iter().any(|s| s.name == name))
    }

    /// Schemas of every tool, built-ins first.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut out: Vec<ToolSchema> = self.tools.values().map(|(s, _)| s.clone()).collect();
        if let Some((_, extra)) = &self.fallback {
            out.extend(
                extra
                    .iter()
                    .filter(|s| !self.tools.contains_key(&s.name))
                    .cloned(),
            );
        }
        out
    }

    pub fn names(&self) -> Vec<String> {
        self.schemas().into_iter().map(|s| s.name).collect()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, args: &Map<String, Value>) -> Result<String> {
        if let Some((_, handler)) = self.tools.get(name) {
            return handler.invoke(args).await;
        }
        match &self.fallback {
            Some((executor, _)) => executor.execute(name, args).await,
            None => Err(AuraError::ToolNotFound(name.to_string())),
        }
    }
}
