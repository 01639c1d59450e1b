use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Description of a tool offered to the model. Passed through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    /// Human-readable description for the LLM.
    pub description: String,
    /// JSON Schema of the parameters object.
    pub parameters: Value,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A request from the LLM to call a tool.
///
/// `arguments` is the raw JSON text the model produced. It is parsed once,
/// at dispatch time, so malformed output can be reported back to the model
/// instead of failing the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the raw arguments into a JSON object.
    ///
    /// An empty string is treated as `{}`; anything that is not an object is
    /// rejected.
    pub fn parse_arguments(&self) -> crate::Result<Map<String, Value>> {
        let raw = self.arguments.trim();
        if raw.is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(crate::AuraError::ToolArguments {
                tool: self.name.clone(),
                reason: format!("expected a JSON object, got {other}"),
            }),
            Err(e) => Err(crate::AuraError::ToolArguments {
                tool: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// The external capability that actually performs tool calls (file system,
/// browser, vision, remote tool servers). Errors are reported back to the
/// model as text; they never abort a turn.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, args: &Map<String, Value>) -> crate::Result<String>;
}
