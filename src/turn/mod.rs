//! Turn orchestration.
//!
//! One turn takes one inbound user message, resolves the target
//! conversation, drives a step-bounded, tool-capable generation, and
//! durably records the outcome. The ordering guarantees are the point:
//! the user message is persisted before generation starts (a crash
//! mid-generation never loses the user's input), the stream is
//! registered before generation starts (an immediate resume request can
//! find it), and the assistant message plus usage bookkeeping land only
//! after generation completes. Usage accounting is best-effort; its
//! failure never rolls back or hides a completed generation.
//!
//! Generation runs in a spawned task, so a caller disconnecting does not
//! abandon persistence and leave a half-written conversation.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::entitlement::ActionKind;
use crate::events::{StreamEvent, ToolCallAccumulator, TurnEvent, WordChunker};
use crate::identity::Identity;
use crate::llm::{LlmDriver, LlmRequest, Message, ToolCall, ToolCallFunction};
use crate::store::{Chat, ChatMessage, ChatRepository, ChatRole, MessagePart, Visibility};
use crate::stream::{StreamChannel, StreamRegistry};
use crate::tools::{DocumentStore, ToolPolicy, ToolSet, ToolSettings};
use crate::usage::{UsageStore, day_key};

/// Hard upper bound on tool-call rounds per turn.
const MAX_TOOL_ROUNDS: usize = 5;

/// Failure modes of turn admission and setup.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The conversation exists and belongs to someone else.
    #[error("conversation belongs to another identity")]
    Forbidden,
    /// The user message could not be persisted; the turn never starts.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// One inbound chat turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Target conversation; a fresh one is created when absent or
    /// unknown.
    pub chat_id: Option<String>,
    /// The user's message text.
    pub message: String,
    /// Model override.
    pub model: Option<String>,
    /// Visibility for a newly created conversation.
    pub visibility: Visibility,
    /// Which search tier the turn was admitted for.
    pub search_mode: ActionKind,
}

/// Handle to a started turn.
pub struct TurnHandle {
    /// The conversation the turn runs in.
    pub chat_id: String,
    /// The registered stream ID.
    pub stream_id: String,
    /// The live event stream for the original caller.
    pub events: Pin<Box<dyn Stream<Item = StreamEvent> + Send>>,
}

impl std::fmt::Debug for TurnHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnHandle")
            .field("chat_id", &self.chat_id)
            .field("stream_id", &self.stream_id)
            .finish()
    }
}

/// Drives one chat turn end to end.
pub struct TurnOrchestrator {
    driver: Arc<dyn LlmDriver>,
    repository: Arc<dyn ChatRepository>,
    usage: Arc<UsageStore>,
    registry: Option<Arc<StreamRegistry>>,
    documents: Arc<DocumentStore>,
    tool_settings: ToolSettings,
    system_prompt: String,
    max_tool_rounds: usize,
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("resumable", &self.registry.is_some())
            .finish()
    }
}

impl TurnOrchestrator {
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        driver: Arc<dyn LlmDriver>,
        repository: Arc<dyn ChatRepository>,
        usage: Arc<UsageStore>,
        registry: Option<Arc<StreamRegistry>>,
        documents: Arc<DocumentStore>,
        tool_settings: ToolSettings,
        system_prompt: String,
    ) -> Self {
        Self {
            driver,
            repository,
            usage,
            registry,
            documents,
            tool_settings,
            system_prompt,
            max_tool_rounds: MAX_TOOL_ROUNDS,
        }
    }

    /// Override the tool-round bound.
    pub fn with_max_tool_rounds(mut self, max: usize) -> Self {
        self.max_tool_rounds = max;
        self
    }

    /// Start one turn.
    ///
    /// Fails fast, before any mutation, on ownership violations; fails
    /// with a storage error if the user message cannot be made durable.
    /// Everything after that streams.
    pub async fn handle_turn(
        &self,
        identity: &Identity,
        request: TurnRequest,
    ) -> Result<TurnHandle, TurnError> {
        // 1. Resolve or create the conversation; ownership fails fast
        let chat_id = match request.chat_id {
            Some(ref id) => id.clone(),
            None => Uuid::new_v4().to_string(),
        };

        match self.repository.get_chat(&chat_id).await? {
            Some(chat) => {
                if chat.owner_id != identity.id() {
                    return Err(TurnError::Forbidden);
                }
            }
            None => {
                let chat = Chat::new(&chat_id, identity.id(), &request.message, request.visibility);
                self.repository.create_chat(chat).await?;
            }
        }

        // 2. Load history in persisted order
        let history = self.repository.list_messages(&chat_id).await?;

        // 3. Write-ahead: the user message is durable before generation
        let user_message = ChatMessage::user_text(&chat_id, &request.message);
        self.repository.append_message(user_message).await?;

        // 4. Register the stream before generation so an immediate
        //    resume can find it
        let channel = match self.registry {
            Some(ref registry) => registry.register(&chat_id),
            None => StreamChannel::new(),
        };
        let stream_id = channel.stream_id.clone();
        let events = channel.subscribe();

        // 5. Resolve the tool set once for the whole turn
        let model = request.model.clone();
        let reasoning = model.as_deref().is_some_and(is_reasoning_model);
        let policy = ToolPolicy::resolve(request.search_mode, reasoning);
        let tools = ToolSet::for_policy(policy, &self.tool_settings, Arc::clone(&self.documents));

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_prompt.clone()));
        for msg in &history {
            messages.push(match msg.role {
                ChatRole::User => Message::user(msg.text()),
                ChatRole::Assistant => Message::assistant(msg.text()),
            });
        }
        messages.push(Message::user(request.message.clone()));

        let ctx = GenerationContext {
            driver: Arc::clone(&self.driver),
            repository: Arc::clone(&self.repository),
            usage: Arc::clone(&self.usage),
            registry: self.registry.clone(),
            channel,
            chat_id: chat_id.clone(),
            identity: identity.clone(),
            action: request.search_mode,
            model,
            tools,
            messages,
            max_tool_rounds: self.max_tool_rounds,
        };

        // Generation outlives the caller's connection: persistence must
        // complete even if the original requester goes away
        tokio::spawn(run_generation(ctx));

        Ok(TurnHandle {
            chat_id,
            stream_id,
            events: Box::pin(events),
        })
    }
}

/// Reasoning-mode models run without tools.
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("o1") || model.starts_with("o3") || model.contains("reasoning")
}

struct GenerationContext {
    driver: Arc<dyn LlmDriver>,
    repository: Arc<dyn ChatRepository>,
    usage: Arc<UsageStore>,
    registry: Option<Arc<StreamRegistry>>,
    channel: Arc<StreamChannel>,
    chat_id: String,
    identity: Identity,
    action: ActionKind,
    model: Option<String>,
    tools: ToolSet,
    messages: Vec<Message>,
    max_tool_rounds: usize,
}

/// Accumulated output of one generation, becoming the assistant message.
#[derive(Debug, Default)]
struct AssistantDraft {
    reasoning: String,
    tool_parts: Vec<MessagePart>,
    text: String,
}

impl AssistantDraft {
    fn into_parts(self) -> Vec<MessagePart> {
        let mut parts = Vec::new();
        if !self.reasoning.is_empty() {
            parts.push(MessagePart::Reasoning {
                text: self.reasoning,
            });
        }
        parts.extend(self.tool_parts);
        if !self.text.is_empty() {
            parts.push(MessagePart::Text { text: self.text });
        }
        parts
    }
}

/// The generation loop: stream model output, execute tool rounds, then
/// run post-completion bookkeeping.
async fn run_generation(mut ctx: GenerationContext) {
    let mut draft = AssistantDraft::default();
    let mut round = 0;
    let succeeded = loop {
        if round >= ctx.max_tool_rounds {
            ctx.channel.publish(TurnEvent::Error {
                message: format!("Tool call limit ({}) exceeded", ctx.max_tool_rounds),
                code: Some("tool_rounds_exceeded".to_string()),
            });
            break false;
        }

        let mut req = LlmRequest::new(ctx.messages.clone()).with_tools(ctx.tools.schemas());
        if let Some(ref model) = ctx.model {
            req = req.with_model(model.clone());
        }

        let response = match ctx.driver.stream(req).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(chat_id = %ctx.chat_id, error = %e, "Model call failed");
                ctx.channel.publish(generic_error());
                break false;
            }
        };

        match consume_round(&ctx, response, &mut draft).await {
            RoundOutcome::Finished => break true,
            RoundOutcome::Failed => break false,
            RoundOutcome::ToolCalls(calls) => {
                execute_tool_round(&mut ctx, &mut draft, calls).await;
                round += 1;
            }
        }
    };

    if succeeded {
        finish_turn(&ctx, draft).await;
    }

    // Retire the stream from the registry before the terminal event so
    // a client that observed the stream end never finds a stale entry.
    // The user message persisted ahead of generation stays either way,
    // so a retry resubmits cleanly.
    if let Some(ref registry) = ctx.registry {
        registry.finish(&ctx.chat_id, &ctx.channel.stream_id);
    }
    ctx.channel.publish(TurnEvent::done());
}

enum RoundOutcome {
    /// The model finished without requesting tools.
    Finished,
    /// The model failed mid-stream; a terminal error was published.
    Failed,
    /// The model requested tool calls; run them and go around again.
    ToolCalls(Vec<ToolCall>),
}

/// Consume one model response stream, forwarding events into the channel
/// and accumulating the draft.
async fn consume_round(
    ctx: &GenerationContext,
    response: Pin<Box<dyn Stream<Item = anyhow::Result<TurnEvent>> + Send>>,
    draft: &mut AssistantDraft,
) -> RoundOutcome {
    let mut chunker = WordChunker::new();
    let mut accumulators: BTreeMap<usize, ToolCallAccumulator> = BTreeMap::new();
    let mut response = response;

    while let Some(item) = response.next().await {
        match item {
            Ok(TurnEvent::TextDelta { content }) => {
                draft.text.push_str(&content);
                if let Some(chunk) = chunker.push(&content) {
                    ctx.channel.publish(TurnEvent::text_delta(chunk));
                }
            }
            Ok(TurnEvent::Reasoning { content }) => {
                draft.reasoning.push_str(&content);
                ctx.channel.publish(TurnEvent::reasoning(content));
            }
            Ok(TurnEvent::ToolCallDelta {
                index,
                id,
                name,
                arguments,
            }) => {
                accumulators.entry(index).or_default().apply_delta(
                    id.clone(),
                    name.clone(),
                    arguments.clone(),
                );
                ctx.channel.publish(TurnEvent::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                });
            }
            Ok(TurnEvent::Done { .. }) => {
                // Provider round boundary; the accumulated tool calls
                // decide whether the whole turn is done
            }
            Ok(event) => {
                ctx.channel.publish(event);
            }
            Err(e) => {
                tracing::error!(chat_id = %ctx.chat_id, error = %e, "Generation failed mid-stream");
                if let Some(chunk) = chunker.flush() {
                    ctx.channel.publish(TurnEvent::text_delta(chunk));
                }
                ctx.channel.publish(generic_error());
                return RoundOutcome::Failed;
            }
        }
    }

    if let Some(chunk) = chunker.flush() {
        ctx.channel.publish(TurnEvent::text_delta(chunk));
    }

    let calls: Vec<ToolCall> = accumulators
        .into_values()
        .filter_map(|acc| {
            let (id, name) = (acc.id?, acc.name?);
            Some(ToolCall {
                id,
                call_type: "function".to_string(),
                function: ToolCallFunction {
                    name,
                    arguments: acc.arguments,
                },
            })
        })
        .collect();

    if calls.is_empty() {
        RoundOutcome::Finished
    } else {
        RoundOutcome::ToolCalls(calls)
    }
}

/// Execute one round of tool calls and feed the results back into the
/// conversation. Tool failures degrade the tool's own output; they never
/// abort the turn.
async fn execute_tool_round(
    ctx: &mut GenerationContext,
    draft: &mut AssistantDraft,
    calls: Vec<ToolCall>,
) {
    for call in &calls {
        ctx.channel.publish(TurnEvent::ToolCallComplete {
            id: call.id.clone(),
            name: call.function.name.clone(),
            arguments: call.function.arguments.clone(),
        });
    }

    ctx.messages.push(Message {
        role: crate::llm::MessageRole::Assistant,
        content: std::mem::take(&mut draft.text),
        tool_call_id: None,
        tool_calls: Some(calls.clone()),
    });

    for call in calls {
        let result = ctx
            .tools
            .execute(&call.function.name, &call.function.arguments)
            .await;

        let (content, success) = match result {
            Ok(output) => (output, true),
            Err(e) => {
                tracing::warn!(
                    chat_id = %ctx.chat_id,
                    tool = %call.function.name,
                    error = %e,
                    "Tool execution failed, degrading"
                );
                (format!("Tool error: {}", e), false)
            }
        };

        ctx.channel.publish(TurnEvent::ToolResult {
            tool_call_id: call.id.clone(),
            name: call.function.name.clone(),
            content: content.clone(),
            success,
        });

        draft.tool_parts.push(MessagePart::ToolInvocation {
            tool_call_id: call.id.clone(),
            name: call.function.name.clone(),
            arguments: call.function.arguments.clone(),
            result: content.clone(),
            success,
        });

        ctx.messages.push(Message::tool_result(call.id, content));
    }
}

/// Post-completion bookkeeping: persist the assistant message, then
/// charge usage for authenticated identities.
async fn finish_turn(ctx: &GenerationContext, draft: AssistantDraft) {
    let assistant = ChatMessage::assistant(&ctx.chat_id, draft.into_parts());

    if let Err(e) = ctx.repository.append_message(assistant).await {
        // The output already streamed to the client; warn, never
        // present it as lost
        tracing::error!(chat_id = %ctx.chat_id, error = %e, "Failed to persist assistant message");
        ctx.channel.publish(TurnEvent::Error {
            message: "The response streamed but could not be saved to history.".to_string(),
            code: Some("assistant_save_failed".to_string()),
        });
        return;
    }

    if let Identity::Authenticated(ref user) = ctx.identity {
        if let Err(e) = ctx.usage.increment(&user.id, day_key(), ctx.action).await {
            // Bookkeeping failure never rolls back a completed turn
            tracing::error!(user_id = %user.id, error = %e, "Usage increment failed");
        }
    }
}

/// The user-facing message for model failures; internal diagnostics stay
/// in the logs.
fn generic_error() -> TurnEvent {
    TurnEvent::Error {
        message: "Something went wrong generating a response. Please try again.".to_string(),
        code: Some("generation_failed".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{AuthenticatedUser, GuestIdentity};
    use crate::llm::{LlmDriver, Provider};
    use crate::store::MemoryRepository;
    use async_trait::async_trait;
    use futures::stream;

    /// Driver that replays a script of event batches, one per round.
    struct ScriptedDriver {
        rounds: parking_lot::Mutex<Vec<Vec<anyhow::Result<TurnEvent>>>>,
    }

    impl ScriptedDriver {
        fn new(rounds: Vec<Vec<anyhow::Result<TurnEvent>>>) -> Self {
            Self {
                rounds: parking_lot::Mutex::new(rounds),
            }
        }

        fn text_round(text: &str) -> Vec<anyhow::Result<TurnEvent>> {
            vec![
                Ok(TurnEvent::text_delta(text)),
                Ok(TurnEvent::done_with_reason("stop")),
            ]
        }
    }

    #[async_trait]
    impl LlmDriver for ScriptedDriver {
        async fn stream(
            &self,
            _req: LlmRequest,
        ) -> anyhow::Result<Pin<Box<dyn Stream<Item = anyhow::Result<TurnEvent>> + Send>>>
        {
            let mut rounds = self.rounds.lock();
            if rounds.is_empty() {
                anyhow::bail!("no scripted rounds left");
            }
            let round = rounds.remove(0);
            Ok(Box::pin(stream::iter(round)))
        }

        fn provider(&self) -> Provider {
            Provider::Custom
        }
    }

    struct Fixture {
        orchestrator: TurnOrchestrator,
        repository: Arc<MemoryRepository>,
        usage: Arc<UsageStore>,
        registry: Arc<StreamRegistry>,
    }

    fn fixture(rounds: Vec<Vec<anyhow::Result<TurnEvent>>>) -> Fixture {
        let repository = Arc::new(MemoryRepository::new());
        let usage = Arc::new(UsageStore::in_memory());
        let registry = Arc::new(StreamRegistry::new());

        let orchestrator = TurnOrchestrator::new(
            Arc::new(ScriptedDriver::new(rounds)),
            Arc::clone(&repository) as Arc<dyn ChatRepository>,
            Arc::clone(&usage),
            Some(Arc::clone(&registry)),
            Arc::new(DocumentStore::new()),
            ToolSettings::default(),
            "You are a helpful assistant.".to_string(),
        );

        Fixture {
            orchestrator,
            repository,
            usage,
            registry,
        }
    }

    fn user(id: &str) -> Identity {
        Identity::Authenticated(AuthenticatedUser {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            plan_hint: None,
        })
    }

    fn request(chat_id: Option<&str>) -> TurnRequest {
        TurnRequest {
            chat_id: chat_id.map(String::from),
            message: "what is new in rust?".to_string(),
            model: None,
            visibility: Visibility::Private,
            search_mode: ActionKind::Search,
        }
    }

    async fn drain(handle: TurnHandle) -> Vec<StreamEvent> {
        handle.events.collect().await
    }

    #[tokio::test]
    async fn successful_turn_persists_both_messages_and_charges_usage() {
        let fx = fixture(vec![ScriptedDriver::text_round("all quiet on the crates front")]);

        let handle = fx
            .orchestrator
            .handle_turn(&user("user-1"), request(Some("chat-1")))
            .await
            .unwrap();
        let events = drain(handle).await;

        assert!(events.iter().any(|e| matches!(e.event, TurnEvent::TextDelta { .. })));
        assert!(matches!(events.last().unwrap().event, TurnEvent::Done { .. }));

        let messages = fx.repository.list_messages("chat-1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].text(), "all quiet on the crates front");

        let record = fx.usage.get("user-1", day_key()).await.unwrap();
        assert_eq!(record.searches_used, 1);
    }

    #[tokio::test]
    async fn failed_generation_keeps_user_message_only() {
        let fx = fixture(vec![vec![
            Ok(TurnEvent::text_delta("partial ")),
            Err(anyhow::anyhow!("provider exploded")),
        ]]);

        let handle = fx
            .orchestrator
            .handle_turn(&user("user-1"), request(Some("chat-1")))
            .await
            .unwrap();
        let events = drain(handle).await;

        assert!(events.iter().any(|e| matches!(e.event, TurnEvent::Error { .. })));
        assert!(matches!(events.last().unwrap().event, TurnEvent::Done { .. }));

        let messages = fx.repository.list_messages("chat-1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::User);

        // No usage charged for a failed turn
        let record = fx.usage.get("user-1", day_key()).await.unwrap();
        assert_eq!(record.searches_used, 0);
    }

    #[tokio::test]
    async fn foreign_chat_is_forbidden_with_no_writes() {
        let fx = fixture(vec![ScriptedDriver::text_round("never runs")]);
        fx.repository
            .create_chat(Chat::new("chat-1", "owner", "hi", Visibility::Private))
            .await
            .unwrap();

        let result = fx
            .orchestrator
            .handle_turn(&user("intruder"), request(Some("chat-1")))
            .await;
        assert!(matches!(result, Err(TurnError::Forbidden)));

        assert!(fx.repository.list_messages("chat-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn guest_turns_do_not_touch_the_usage_store() {
        let fx = fixture(vec![ScriptedDriver::text_round("hello guest")]);
        let guest = Identity::Guest(GuestIdentity {
            id: "guest-1".to_string(),
            fingerprint: 99,
        });

        let handle = fx
            .orchestrator
            .handle_turn(&guest, request(Some("chat-1")))
            .await
            .unwrap();
        drain(handle).await;

        let record = fx.usage.get("guest-1", day_key()).await.unwrap();
        assert_eq!(record, Default::default());
    }

    #[tokio::test]
    async fn tool_round_executes_and_feeds_back() {
        let tool_round = vec![
            Ok(TurnEvent::ToolCallDelta {
                index: 0,
                id: Some("call_1".to_string()),
                name: Some("create_document".to_string()),
                arguments: Some(r#"{"title":"T","content":"C"}"#.to_string()),
            }),
            Ok(TurnEvent::done_with_reason("tool_calls")),
        ];
        let fx = fixture(vec![tool_round, ScriptedDriver::text_round("created it")]);

        let handle = fx
            .orchestrator
            .handle_turn(&user("user-1"), request(Some("chat-1")))
            .await
            .unwrap();
        let events = drain(handle).await;

        assert!(events.iter().any(|e| matches!(
            &e.event,
            TurnEvent::ToolResult { name, success: true, .. } if name == "create_document"
        )));

        let messages = fx.repository.list_messages("chat-1").await.unwrap();
        let assistant = &messages[1];
        assert!(assistant
            .parts
            .iter()
            .any(|p| matches!(p, MessagePart::ToolInvocation { success: true, .. })));
        assert_eq!(assistant.text(), "created it");
    }

    #[tokio::test]
    async fn runaway_tool_loop_is_bounded() {
        let tool_round = || {
            vec![Ok(TurnEvent::ToolCallDelta {
                index: 0,
                id: Some("call_x".to_string()),
                name: Some("get_weather".to_string()),
                arguments: Some(r#"{"latitude":0,"longitude":0}"#.to_string()),
            })]
        };
        let fx = fixture(vec![tool_round(), tool_round(), tool_round()]);
        let orchestrator = fx.orchestrator.with_max_tool_rounds(2);

        let handle = orchestrator
            .handle_turn(&user("user-1"), request(Some("chat-1")))
            .await
            .unwrap();
        let events = drain(handle).await;

        assert!(events.iter().any(|e| matches!(
            &e.event,
            TurnEvent::Error { code: Some(code), .. } if code == "tool_rounds_exceeded"
        )));
    }

    #[tokio::test]
    async fn stream_is_resumable_while_live_and_gone_after() {
        let fx = fixture(vec![ScriptedDriver::text_round("resumable")]);

        let handle = fx
            .orchestrator
            .handle_turn(&user("user-1"), request(Some("chat-1")))
            .await
            .unwrap();

        // Registered before generation completes is observable via resume
        let resumed = fx.registry.resume("chat-1");
        let live_events = drain(handle).await;
        assert!(matches!(live_events.last().unwrap().event, TurnEvent::Done { .. }));

        if let Some(stream) = resumed {
            let replayed: Vec<StreamEvent> = stream.collect().await;
            assert_eq!(replayed.len(), live_events.len());
        }

        // Finished stream is retired from the registry
        assert!(fx.registry.resume("chat-1").is_none());
    }

    #[tokio::test]
    async fn new_chat_is_created_with_title_and_owner() {
        let fx = fixture(vec![ScriptedDriver::text_round("hi")]);

        let handle = fx
            .orchestrator
            .handle_turn(&user("user-1"), request(None))
            .await
            .unwrap();
        let chat_id = handle.chat_id.clone();
        drain(handle).await;

        let chat = fx.repository.get_chat(&chat_id).await.unwrap().unwrap();
        assert_eq!(chat.owner_id, "user-1");
        assert_eq!(chat.title, "what is new in rust?");
    }
}
