//! Chat turn endpoints.
//!
//! One resource, three verbs: `POST /api/v1/chat` submits a turn and
//! streams it, `GET /api/v1/chat?conversationId=…` resumes the live stream
//! for a conversation, `DELETE /api/v1/chat?id=…` deletes a conversation.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::AppState;
use crate::entitlement::ActionKind;
use crate::events::StreamEvent;
use crate::store::Visibility;
use crate::turn::{TurnError, TurnRequest};

/// Create the chat router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/v1/chat",
        post(submit_turn).get(resume_stream).delete(delete_chat),
    )
}

/// Turn submission request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTurnRequest {
    /// The user's message.
    pub message: String,
    /// Target conversation; omitted for a new one.
    pub conversation_id: Option<String>,
    /// Model override.
    pub model_selection: Option<String>,
    /// Visibility for a newly created conversation.
    #[serde(default)]
    pub visibility: Visibility,
    /// Requested search tier.
    #[serde(default = "default_search_mode")]
    pub search_mode: ActionKind,
}

fn default_search_mode() -> ActionKind {
    ActionKind::Search
}

/// Query parameters for resume.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeQuery {
    /// The conversation ID.
    pub conversation_id: String,
}

/// Query parameters for delete.
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    /// The conversation ID.
    pub id: String,
}

/// Submit one chat turn and stream its events.
async fn submit_turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SubmitTurnRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    // Deserialization failures are the client's fault, answered as 400
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let identity = state.resolver.resolve(&headers);

    state
        .limiters
        .check_daily_message(&identity.rate_key())
        .map_err(|retry_after_secs| ApiError::DailyCapExceeded { retry_after_secs })?;

    let decision = state.gate.can_perform(&identity, req.search_mode).await?;
    if !decision.allowed {
        return Err(ApiError::Denied(decision));
    }

    let handle = state
        .orchestrator
        .handle_turn(
            &identity,
            TurnRequest {
                chat_id: req.conversation_id,
                message: req.message,
                model: req.model_selection,
                visibility: req.visibility,
                search_mode: req.search_mode,
            },
        )
        .await
        .map_err(|e| match e {
            TurnError::Forbidden => ApiError::Forbidden,
            TurnError::Storage(e) => ApiError::Internal(e),
        })?;

    // Lead with stream metadata so a new-conversation client learns its
    // chat ID before the first delta
    let opening = StreamOpening {
        conversation_id: handle.chat_id,
        stream_id: handle.stream_id,
    };
    let first = futures::stream::once(async move {
        Ok::<_, Infallible>(
            Event::default()
                .event("stream.start")
                .data(serde_json::to_string(&opening).unwrap_or_default()),
        )
    });

    Ok(Sse::new(first.chain(sse_events(handle.events))).into_response())
}

/// Metadata event sent before the turn events.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamOpening {
    conversation_id: String,
    stream_id: String,
}

/// Resume the live stream for a conversation.
///
/// `204 No Content` when resumable streaming is disabled for this
/// deployment; `404` when the conversation does not exist or has no live
/// stream (finished streams deregister, so they read as absent).
async fn resume_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ResumeQuery>,
) -> Result<Response, ApiError> {
    let Some(ref registry) = state.registry else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let chat = state
        .repository
        .get_chat(&query.conversation_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if chat.visibility == Visibility::Private {
        let identity = state.resolver.resolve(&headers);
        if chat.owner_id != identity.id() {
            return Err(ApiError::Forbidden);
        }
    }

    let stream = registry
        .resume(&query.conversation_id)
        .ok_or(ApiError::NotFound)?;
    Ok(Sse::new(sse_events(stream)).into_response())
}

/// Delete a conversation and its messages.
async fn delete_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Result<Response, ApiError> {
    let identity = state.resolver.resolve(&headers);
    if identity.is_guest() {
        return Err(ApiError::Unauthorized);
    }

    let chat = state
        .repository
        .get_chat(&query.id)
        .await?
        .ok_or(ApiError::NotFound)?;

    // Non-owners get the same answer as the unauthenticated
    if chat.owner_id != identity.id() {
        return Err(ApiError::Unauthorized);
    }

    state.repository.delete_chat(&query.id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })).into_response())
}

/// Map turn events onto SSE frames.
fn sse_events(
    events: impl Stream<Item = StreamEvent> + Send + 'static,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    events.map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok::<_, Infallible>(Event::default().event(event.event_type()).data(data))
    })
}
