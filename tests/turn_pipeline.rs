//! End-to-end tests for the chat turn pipeline.
//!
//! Drives the full HTTP surface with a scripted model driver: admission
//! gating for guests and authenticated users, turn streaming, stream
//! resumption, and conversation deletion.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use futures::Stream;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;

use harbor_api::AppState;
use harbor_api::api;
use harbor_api::api::rate_limit::IdentityRateLimiters;
use harbor_api::config::AppConfig;
use harbor_api::entitlement::{EntitlementGate, PlanLimits, PlanTable, PlanType};
use harbor_api::events::TurnEvent;
use harbor_api::identity::{Claims, SessionResolver};
use harbor_api::llm::{LlmDriver, LlmRequest, Provider};
use harbor_api::store::{ChatRepository, MemoryRepository};
use harbor_api::stream::StreamRegistry;
use harbor_api::tools::{DocumentStore, ToolSettings};
use harbor_api::turn::TurnOrchestrator;
use harbor_api::usage::UsageStore;
use harbor_api::usage::guest::GuestUsageTracker;

const JWT_SECRET: &str = "test-secret";

/// Driver that replays scripted event batches, one per model round.
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
    ) -> anyhow::Result<Pin<Box<dyn Stream<Item = anyhow::Result<TurnEvent>> + Send>>> {
        let mut rounds = self.rounds.lock();
        if rounds.is_empty() {
            anyhow::bail!("no scripted rounds left");
        }
        let round = rounds.remove(0);
        Ok(Box::pin(futures::stream::iter(round)))
    }

    fn provider(&self) -> Provider {
        Provider::Custom
    }
}

struct Pipeline {
    server: TestServer,
    repository: Arc<MemoryRepository>,
    usage: Arc<UsageStore>,
}

/// Build the full pipeline over a scripted driver and in-memory stores.
///
/// The plan table is shrunk so limit exhaustion is reachable in a test:
/// free gets 2 searches and 1 deep search per day.
fn pipeline(rounds: Vec<Vec<anyhow::Result<TurnEvent>>>) -> Pipeline {
    pipeline_with_message_cap(rounds, 100)
}

fn pipeline_with_message_cap(
    rounds: Vec<Vec<anyhow::Result<TurnEvent>>>,
    daily_message_cap: u32,
) -> Pipeline {
    let repository = Arc::new(MemoryRepository::new());
    let usage = Arc::new(UsageStore::in_memory());
    let registry = Arc::new(StreamRegistry::new());
    let plans = PlanTable {
        free: PlanLimits {
            searches_per_day: 2,
            deep_searches_per_day: 1,
        },
        pro: PlanLimits {
            searches_per_day: 100,
            deep_searches_per_day: 20,
        },
    };

    let gate = Arc::new(EntitlementGate::new(
        Arc::clone(&repository) as Arc<dyn ChatRepository>,
        Arc::clone(&usage),
        Arc::new(GuestUsageTracker::new()),
        plans,
    ));

    let orchestrator = Arc::new(TurnOrchestrator::new(
        Arc::new(ScriptedDriver::new(rounds)),
        Arc::clone(&repository) as Arc<dyn ChatRepository>,
        Arc::clone(&usage),
        Some(Arc::clone(&registry)),
        Arc::new(DocumentStore::new()),
        ToolSettings::default(),
        "You are a helpful assistant.".to_string(),
    ));

    let state = AppState {
        config: Arc::new(AppConfig::default()),
        resolver: SessionResolver::new(Some(JWT_SECRET.to_string())),
        gate,
        orchestrator,
        repository: Arc::clone(&repository) as Arc<dyn ChatRepository>,
        registry: Some(registry),
        limiters: Arc::new(IdentityRateLimiters::new(1000, 100, daily_message_cap)),
    };

    let server = TestServer::new(api::create_router().with_state(state)).unwrap();

    Pipeline {
        server,
        repository,
        usage,
    }
}

fn bearer(user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        email: format!("{user_id}@example.com"),
        exp: now + 3600,
        iat: now,
        plan: Some(PlanType::Free),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

#[tokio::test]
async fn authenticated_turn_streams_and_persists() {
    let px = pipeline(vec![ScriptedDriver::text_round("hello there friend")]);

    let response = px
        .server
        .post("/api/v1/chat")
        .add_header("authorization", bearer("user-1"))
        .json(&json!({ "message": "hi", "conversationId": "chat-1" }))
        .await;

    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("stream.start"));
    assert!(body.contains("message.delta"));
    assert!(body.contains("done"));

    let messages = px.repository.list_messages("chat-1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].text(), "hello there friend");

    let record = px
        .usage
        .get("user-1", harbor_api::usage::day_key())
        .await
        .unwrap();
    assert_eq!(record.searches_used, 1);
}

#[tokio::test]
async fn authenticated_user_is_denied_past_the_daily_limit() {
    let px = pipeline(vec![
        ScriptedDriver::text_round("one"),
        ScriptedDriver::text_round("two"),
    ]);

    for _ in 0..2 {
        px.server
            .post("/api/v1/chat")
            .add_header("authorization", bearer("user-1"))
            .json(&json!({ "message": "hi" }))
            .await
            .assert_status_ok();
    }

    // Third request exceeds the free limit of 2
    let response = px
        .server
        .post("/api/v1/chat")
        .add_header("authorization", bearer("user-1"))
        .json(&json!({ "message": "hi" }))
        .await;

    response.assert_status_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "limit_exceeded");
    assert_eq!(body["requiresUpgrade"], true);
    assert_eq!(body["requiresLogin"], false);
}

#[tokio::test]
async fn daily_message_cap_answers_429_before_the_quota_gate() {
    // Cap of 1: the second message trips the cap even though the free
    // plan still has a search left
    let px = pipeline_with_message_cap(vec![ScriptedDriver::text_round("one")], 1);

    px.server
        .post("/api/v1/chat")
        .add_header("authorization", bearer("user-1"))
        .json(&json!({ "message": "hi" }))
        .await
        .assert_status_ok();

    let response = px
        .server
        .post("/api/v1/chat")
        .add_header("authorization", bearer("user-1"))
        .json(&json!({ "message": "hi again" }))
        .await;

    assert_eq!(response.status_code(), 429);
    assert!(response.headers().contains_key("Retry-After"));
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "daily_message_cap_exceeded");
}

#[tokio::test]
async fn malformed_turn_body_is_a_bad_request() {
    let px = pipeline(vec![]);

    // `message` must be a string
    let response = px
        .server
        .post("/api/v1/chat")
        .json(&json!({ "message": 42 }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn guest_gets_one_search_then_a_login_prompt() {
    let px = pipeline(vec![ScriptedDriver::text_round("guest answer")]);

    let first = px
        .server
        .post("/api/v1/chat")
        .add_header("x-forwarded-for", "9.8.7.6")
        .add_header("user-agent", "pipeline-test")
        .json(&json!({ "message": "hi" }))
        .await;
    first.assert_status_ok();

    // Same origin fingerprint, so the guest allowance is spent
    let second = px
        .server
        .post("/api/v1/chat")
        .add_header("x-forwarded-for", "9.8.7.6")
        .add_header("user-agent", "pipeline-test")
        .json(&json!({ "message": "hi again" }))
        .await;

    second.assert_status_forbidden();
    let body: serde_json::Value = second.json();
    assert_eq!(body["error"], "limit_exceeded");
    assert_eq!(body["requiresLogin"], true);
}

#[tokio::test]
async fn guest_deep_search_is_always_denied() {
    let px = pipeline(vec![]);

    let response = px
        .server
        .post("/api/v1/chat")
        .add_header("x-forwarded-for", "1.1.1.1")
        .add_header("user-agent", "pipeline-test")
        .json(&json!({ "message": "dig deep", "searchMode": "deep-search" }))
        .await;

    response.assert_status_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "guest_deep_search_not_allowed");
    assert_eq!(body["requiresLogin"], true);
}

#[tokio::test]
async fn resume_unknown_conversation_is_not_found() {
    let px = pipeline(vec![]);

    let response = px
        .server
        .get("/api/v1/chat")
        .add_query_param("conversationId", "no-such-chat")
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn resume_after_the_stream_finishes_is_not_found() {
    let px = pipeline(vec![ScriptedDriver::text_round("done already")]);

    // Run a turn to completion; its stream deregisters on finish, so the
    // conversation reads as having no live stream
    px.server
        .post("/api/v1/chat")
        .add_header("authorization", bearer("user-1"))
        .json(&json!({ "message": "hi", "conversationId": "chat-1" }))
        .await
        .assert_status_ok();

    let response = px
        .server
        .get("/api/v1/chat")
        .add_query_param("conversationId", "chat-1")
        .add_header("authorization", bearer("user-1"))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn private_conversation_cannot_be_resumed_by_others() {
    let px = pipeline(vec![ScriptedDriver::text_round("secret")]);

    px.server
        .post("/api/v1/chat")
        .add_header("authorization", bearer("owner"))
        .json(&json!({ "message": "hi", "conversationId": "chat-1", "visibility": "private" }))
        .await
        .assert_status_ok();

    let response = px
        .server
        .get("/api/v1/chat")
        .add_query_param("conversationId", "chat-1")
        .add_header("authorization", bearer("intruder"))
        .await;

    response.assert_status_forbidden();
}

#[tokio::test]
async fn delete_requires_an_authenticated_owner() {
    let px = pipeline(vec![ScriptedDriver::text_round("to be deleted")]);

    px.server
        .post("/api/v1/chat")
        .add_header("authorization", bearer("owner"))
        .json(&json!({ "message": "hi", "conversationId": "chat-1" }))
        .await
        .assert_status_ok();

    // Guests and non-owners get the same unauthorized answer
    px.server
        .delete("/api/v1/chat")
        .add_query_param("id", "chat-1")
        .await
        .assert_status_unauthorized();

    px.server
        .delete("/api/v1/chat")
        .add_query_param("id", "chat-1")
        .add_header("authorization", bearer("someone-else"))
        .await
        .assert_status_unauthorized();

    let response = px
        .server
        .delete("/api/v1/chat")
        .add_query_param("id", "chat-1")
        .add_header("authorization", bearer("owner"))
        .await;
    response.assert_status_ok();

    assert!(px.repository.get_chat("chat-1").await.unwrap().is_none());
}

#[tokio::test]
async fn foreign_chat_submission_is_forbidden() {
    let px = pipeline(vec![
        ScriptedDriver::text_round("mine"),
        ScriptedDriver::text_round("never used"),
    ]);

    px.server
        .post("/api/v1/chat")
        .add_header("authorization", bearer("owner"))
        .json(&json!({ "message": "hi", "conversationId": "chat-1" }))
        .await
        .assert_status_ok();

    let response = px
        .server
        .post("/api/v1/chat")
        .add_header("authorization", bearer("intruder"))
        .json(&json!({ "message": "mine now", "conversationId": "chat-1" }))
        .await;

    response.assert_status_forbidden();

    // No write happened for the intruder
    let messages = px.repository.list_messages("chat-1").await.unwrap();
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn health_endpoints_respond() {
    let px = pipeline(vec![]);

    px.server.get("/health").await.assert_status_ok();
    let ready: serde_json::Value = px.server.get("/ready").await.json();
    assert_eq!(ready["status"], "ready");
    assert_eq!(ready["resumable_streams"], true);
}
