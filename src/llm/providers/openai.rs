//! OpenAI-compatible streaming driver.
//!
//! Parses the chat-completions SSE wire format and normalizes deltas into
//! [`TurnEvent`]s. Reasoning-capable endpoints that emit
//! `reasoning_content` deltas are surfaced as reasoning events.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;

use crate::events::TurnEvent;
use crate::llm::{LlmDriver, LlmRequest, LlmSettings, Message, MessageRole, Provider};

/// OpenAI-compatible API driver.
#[derive(Debug, Clone)]
pub struct OpenAiDriver {
    settings: LlmSettings,
    client: Client,
}

impl OpenAiDriver {
    /// Create a new driver.
    pub fn new(settings: LlmSettings) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        Self { settings, client }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn convert_messages(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|msg| {
                let mut obj = serde_json::json!({
                    "role": match msg.role {
                        MessageRole::System => "system",
                        MessageRole::User => "user",
                        MessageRole::Assistant => "assistant",
                        MessageRole::Tool => "tool",
                    },
                    "content": msg.content,
                });

                if let Some(ref tool_call_id) = msg.tool_call_id {
                    obj["tool_call_id"] = serde_json::Value::String(tool_call_id.clone());
                }
                if let Some(ref tool_calls) = msg.tool_calls {
                    obj["tool_calls"] = serde_json::to_value(tool_calls).unwrap_or_default();
                }

                obj
            })
            .collect()
    }
}

#[async_trait]
impl LlmDriver for OpenAiDriver {
    async fn stream(
        &self,
        req: LlmRequest,
    ) -> anyhow::Result<Pin<Box<dyn Stream<Item = anyhow::Result<TurnEvent>> + Send>>> {
        let model = req.model.as_ref().unwrap_or(&self.settings.model);

        let mut body = serde_json::json!({
            "model": model,
            "messages": Self::convert_messages(&req.messages),
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "stream": true,
            "stream_options": {
                "include_usage": true
            }
        });

        if !req.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(req.tools.clone());
        }

        let mut request = self.client.post(self.api_url()).json(&body);
        if let Some(ref api_key) = self.settings.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Model API error ({}): {}", status, text);
        }

        let stream = response.bytes_stream();

        let event_stream = async_stream::stream! {
            let mut buffer = String::new();

            futures::pin_mut!(stream);

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(anyhow::anyhow!("Stream error: {}", e));
                        continue;
                    }
                };

                let chunk_str = match std::str::from_utf8(&chunk) {
                    Ok(s) => s,
                    Err(e) => {
                        yield Err(anyhow::anyhow!("UTF-8 error: {}", e));
                        continue;
                    }
                };

                buffer.push_str(chunk_str);

                // Process complete SSE frames
                while let Some(pos) = buffer.find("\n\n") {
                    let frame = buffer[..pos].to_string();
                    buffer = buffer[pos + 2..].to_string();

                    for data_line in frame.lines() {
                        if let Some(data) = data_line.strip_prefix("data: ") {
                            if data.trim() == "[DONE]" {
                                yield Ok(TurnEvent::done());
                                continue;
                            }

                            match serde_json::from_str::<StreamChunk>(data) {
                                Ok(chunk) => {
                                    for event in chunk.into_events() {
                                        yield Ok(event);
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!("Failed to parse chunk: {} - {}", e, data);
                                }
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(event_stream))
    }

    fn provider(&self) -> Provider {
        self.settings.provider
    }
}

/// Streaming response chunk.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Option<Delta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl StreamChunk {
    fn into_events(self) -> Vec<TurnEvent> {
        let mut events = Vec::new();

        if let Some(choices) = self.choices {
            for choice in choices {
                if let Some(delta) = choice.delta {
                    if let Some(content) = delta.content {
                        if !content.is_empty() {
                            events.push(TurnEvent::text_delta(content));
                        }
                    }

                    if let Some(reasoning) = delta.reasoning_content {
                        if !reasoning.is_empty() {
                            events.push(TurnEvent::reasoning(reasoning));
                        }
                    }

                    if let Some(tool_calls) = delta.tool_calls {
                        for tc in tool_calls {
                            events.push(TurnEvent::ToolCallDelta {
                                index: tc.index,
                                id: tc.id,
                                name: tc.function.as_ref().and_then(|f| f.name.clone()),
                                arguments: tc.function.and_then(|f| f.arguments),
                            });
                        }
                    }
                }

                if let Some(reason) = choice.finish_reason {
                    events.push(TurnEvent::done_with_reason(reason));
                }
            }
        }

        if let Some(usage) = self.usage {
            events.push(TurnEvent::Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }

        events
    }
}
