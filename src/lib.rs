//! Harbor API - Streaming Chat Turn Pipeline
//!
//! This crate implements the full lifecycle of a chat turn: a request
//! arrives carrying a user message, is attributed to an identity
//! (authenticated or guest), passes an entitlement gate enforcing
//! per-plan daily quotas, drives a streaming tool-capable model
//! generation, persists the results, and exposes the output as a
//! resumable event stream.
//!
//! # Architecture
//!
//! - [`config`]: Configuration management and environment loading
//! - [`identity`]: Session resolution (authenticated vs. guest)
//! - [`entitlement`]: Plan limits and the admission gate
//! - [`usage`]: Durable per-user daily usage counters, plus the
//!   in-memory guest tracker
//! - [`store`]: Conversation, message, and subscription storage
//! - [`events`]: Normalized streaming event model
//! - [`llm`]: Model driver abstractions and provider implementations
//! - [`tools`]: Tool capabilities exposed to generation
//! - [`stream`]: Resumable stream registry
//! - [`turn`]: Turn orchestration
//! - [`api`]: HTTP API endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use harbor_api::{config::AppConfig, server::create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let app = create_app(config).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod config;
pub mod entitlement;
pub mod events;
pub mod identity;
pub mod llm;
pub mod logging;
pub mod server;
pub mod store;
pub mod stream;
pub mod tools;
pub mod turn;
pub mod usage;

use std::sync::Arc;

use api::rate_limit::IdentityRateLimiters;
use config::AppConfig;
use entitlement::EntitlementGate;
use identity::SessionResolver;
use store::ChatRepository;
use stream::StreamRegistry;
use turn::TurnOrchestrator;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Session resolver for identity attribution.
    pub resolver: SessionResolver,
    /// Admission gate over plan limits and usage counters.
    pub gate: Arc<EntitlementGate>,
    /// Turn orchestrator.
    pub orchestrator: Arc<TurnOrchestrator>,
    /// Conversation storage.
    pub repository: Arc<dyn ChatRepository>,
    /// Resumable stream registry; absent when the deployment disables
    /// stream resumption.
    pub registry: Option<Arc<StreamRegistry>>,
    /// Per-identity request rate limiters.
    pub limiters: Arc<IdentityRateLimiters>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"AppConfig")
            .field("resumable", &self.registry.is_some())
            .finish()
    }
}
