//! Web search tool.
//!
//! Thin wrapper over a search HTTP service, in shallow and deep variants.
//! Upstream failures degrade to an empty result set rather than failing
//! the tool call; the guest/free tiers lean on search being best-effort.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::Tool;

/// How deep a search runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
    /// A handful of results, titles and snippets only.
    Shallow,
    /// More results with page content included.
    Deep,
}

impl SearchDepth {
    fn max_results(self) -> u32 {
        match self {
            Self::Shallow => 5,
            Self::Deep => 20,
        }
    }

    fn include_content(self) -> bool {
        matches!(self, Self::Deep)
    }
}

/// Web search over a configured search service.
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
    depth: SearchDepth,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    url: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    content: Option<String>,
}

impl WebSearchTool {
    /// Create a search tool at the given depth.
    pub fn new(base_url: Option<String>, api_key: Option<String>, depth: SearchDepth) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            depth,
        }
    }

    async fn run_search(&self, query: &str) -> anyhow::Result<Vec<SearchResult>> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Search service not configured"))?;

        let mut url = Url::parse(base)?;
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("Invalid search base URL"))?
            .push("search");
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("max_results", &self.depth.max_results().to_string())
            .append_pair("include_content", &self.depth.include_content().to_string());

        let mut request = self.client.get(url);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?.error_for_status()?;
        let body: SearchResponse = response.json().await?;
        Ok(body.results)
    }

    fn format_results(&self, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return "No results found.".to_string();
        }

        results
            .iter()
            .map(|r| {
                let mut entry = format!("- {} ({})\n  {}", r.title, r.url, r.snippet);
                if self.depth.include_content() {
                    if let Some(ref content) = r.content {
                        entry.push_str("\n  ");
                        entry.push_str(content);
                    }
                }
                entry
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        match self.depth {
            SearchDepth::Shallow => "Search the web and return titles and snippets for a query.",
            SearchDepth::Deep => {
                "Search the web in depth, returning page content for each result."
            }
        }
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &str) -> anyhow::Result<String> {
        let args: SearchArgs = serde_json::from_str(arguments)?;

        match self.run_search(&args.query).await {
            Ok(results) => Ok(self.format_results(&results)),
            Err(e) => {
                // Degrade, don't abort: a failed search reads as empty
                tracing::warn!(query = %args.query, error = %e, "Search failed, degrading to empty results");
                Ok("No results found.".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_search_degrades_to_empty() {
        let tool = WebSearchTool::new(None, None, SearchDepth::Shallow);
        let result = tool
            .execute(r#"{"query":"rust streaming"}"#)
            .await
            .unwrap();
        assert_eq!(result, "No results found.");
    }

    #[tokio::test]
    async fn malformed_arguments_are_an_error() {
        let tool = WebSearchTool::new(None, None, SearchDepth::Shallow);
        assert!(tool.execute("not json").await.is_err());
    }

    #[test]
    fn deep_includes_content() {
        let tool = WebSearchTool::new(None, None, SearchDepth::Deep);
        let results = vec![SearchResult {
            title: "Title".to_string(),
            url: "https://example.com".to_string(),
            snippet: "snippet".to_string(),
            content: Some("full page text".to_string()),
        }];
        assert!(tool.format_results(&results).contains("full page text"));

        let shallow = WebSearchTool::new(None, None, SearchDepth::Shallow);
        assert!(!shallow.format_results(&results).contains("full page text"));
    }
}
