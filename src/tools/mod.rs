//! Tool capabilities exposed to generation.
//!
//! Tools are a closed set resolved once per turn from the [`ToolPolicy`],
//! not a runtime string-keyed registry: the available-tools contract for
//! each mode is checkable at the call site. Plain search mode exposes the
//! shallow web-search tool, deep-search mode the deeper variant, and
//! reasoning-mode models get no tools at all.

pub mod document;
pub mod search;
pub mod weather;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entitlement::ActionKind;

pub use document::{CreateDocumentTool, DocumentStore, UpdateDocumentTool};
pub use search::{SearchDepth, WebSearchTool};
pub use weather::WeatherTool;

/// A callable capability the generation step may invoke mid-turn.
///
/// Tools are independently failable; a failure degrades that tool's own
/// output and never aborts the turn.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, as declared to the model.
    fn name(&self) -> &'static str;

    /// Tool description for the model.
    fn description(&self) -> &'static str;

    /// JSON schema for the tool's arguments.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with JSON-encoded arguments.
    async fn execute(&self, arguments: &str) -> anyhow::Result<String>;
}

/// Which tool set a turn runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolPolicy {
    /// Shallow web search plus document and weather tools.
    Search,
    /// Deep web search plus document and weather tools.
    DeepSearch,
    /// No tools (reasoning-mode models).
    Reasoning,
}

impl ToolPolicy {
    /// Resolve the policy for a turn from the requested search mode and
    /// the selected model's reasoning flag.
    pub fn resolve(search_mode: ActionKind, reasoning_model: bool) -> Self {
        if reasoning_model {
            return Self::Reasoning;
        }
        match search_mode {
            ActionKind::Search => Self::Search,
            ActionKind::DeepSearch => Self::DeepSearch,
        }
    }
}

/// Connection settings for tool services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolSettings {
    /// Search service base URL.
    #[serde(default)]
    pub search_base_url: Option<String>,
    /// Search service API key.
    #[serde(default)]
    pub search_api_key: Option<String>,
    /// Weather service base URL.
    #[serde(default)]
    pub weather_base_url: Option<String>,
}

/// The closed tool set for one turn, resolved from a policy.
#[derive(Clone)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("ToolSet").field("tools", &names).finish()
    }
}

impl ToolSet {
    /// An empty tool set.
    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    /// Resolve the tool set for a policy.
    pub fn for_policy(
        policy: ToolPolicy,
        settings: &ToolSettings,
        documents: Arc<DocumentStore>,
    ) -> Self {
        let depth = match policy {
            ToolPolicy::Search => SearchDepth::Shallow,
            ToolPolicy::DeepSearch => SearchDepth::Deep,
            ToolPolicy::Reasoning => return Self::empty(),
        };

        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(WebSearchTool::new(
                settings.search_base_url.clone(),
                settings.search_api_key.clone(),
                depth,
            )),
            Arc::new(CreateDocumentTool::new(Arc::clone(&documents))),
            Arc::new(UpdateDocumentTool::new(documents)),
            Arc::new(WeatherTool::new(settings.weather_base_url.clone())),
        ];

        Self { tools }
    }

    /// Whether this set exposes any tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool declarations in OpenAI function schema format.
    pub fn schemas(&self) -> Vec<serde_json::Value> {
        self.tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema(),
                    }
                })
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, arguments: &str) -> anyhow::Result<String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tool.execute(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_policy_disables_tools() {
        assert_eq!(
            ToolPolicy::resolve(ActionKind::Search, true),
            ToolPolicy::Reasoning
        );
        assert_eq!(
            ToolPolicy::resolve(ActionKind::DeepSearch, true),
            ToolPolicy::Reasoning
        );

        let set = ToolSet::for_policy(
            ToolPolicy::Reasoning,
            &ToolSettings::default(),
            Arc::new(DocumentStore::new()),
        );
        assert!(set.is_empty());
    }

    #[test]
    fn search_modes_resolve_to_full_sets() {
        assert_eq!(
            ToolPolicy::resolve(ActionKind::Search, false),
            ToolPolicy::Search
        );

        let set = ToolSet::for_policy(
            ToolPolicy::Search,
            &ToolSettings::default(),
            Arc::new(DocumentStore::new()),
        );
        assert!(!set.is_empty());

        let schemas = set.schemas();
        let names: Vec<&str> = schemas
            .iter()
            .map(|s| s["function"]["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"web_search"));
        assert!(names.contains(&"create_document"));
        assert!(names.contains(&"update_document"));
        assert!(names.contains(&"get_weather"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let set = ToolSet::for_policy(
            ToolPolicy::Search,
            &ToolSettings::default(),
            Arc::new(DocumentStore::new()),
        );
        assert!(set.execute("no_such_tool", "{}").await.is_err());
    }
}
