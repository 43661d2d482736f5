//! HTTP server setup and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::api::rate_limit::IdentityRateLimiters;
use crate::config::AppConfig;
use crate::entitlement::EntitlementGate;
use crate::identity::SessionResolver;
use crate::llm::providers::create_driver;
use crate::logging::OpTimer;
use crate::store::{ChatRepository, MemoryRepository};
use crate::stream::StreamRegistry;
use crate::tools::DocumentStore;
use crate::turn::TurnOrchestrator;
use crate::usage::UsageStore;
use crate::usage::guest::GuestUsageTracker;
use crate::{AppState, log_banner, log_init_step, log_init_warning, log_success};

/// Harbor API version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create the application with all routes and middleware.
pub async fn create_app(config: AppConfig) -> anyhow::Result<Router> {
    let overall_timer = OpTimer::new("server", "create_app");

    log_banner!(
        format!("🚀 Harbor API v{}", VERSION),
        format!("Model: {} ({:?})", config.llm.model, config.llm.provider)
    );

    // [1/6] Session resolver
    let step_timer = OpTimer::new("server", "session_resolver");
    let resolver = SessionResolver::new(config.gateway.jwt_secret.clone());
    let auth_info = if config.gateway.jwt_secret.is_some() {
        "🔑 JWT sessions enabled"
    } else {
        "🔑 No JWT secret; all requests resolve to guests"
    };
    log_init_step!(1, 6, "Session Resolver", auth_info);
    if config.gateway.jwt_secret.is_none() {
        log_init_warning!("No JWT secret configured. Authenticated sessions are disabled.");
    }
    step_timer.finish();

    // [2/6] Usage store (Redis with in-memory fallback)
    let step_timer = OpTimer::new("server", "usage_store");
    let usage = if let Some(ref redis_url) = config.redis.url {
        let redis_timer = OpTimer::new("usage-store", "redis_connect");
        let connected = init_redis(redis_url).await;
        redis_timer.finish_with_result(connected.as_ref());
        match connected {
            Ok(conn) => {
                log_init_step!(2, 6, "Usage Store", format!("💾 Redis at {}", redis_url));
                Arc::new(UsageStore::redis(conn))
            }
            Err(e) => {
                log_init_warning!("Failed to connect to Redis: {}. Using in-memory fallback.", e);
                log_init_step!(2, 6, "Usage Store", "💾 In-memory fallback");
                Arc::new(UsageStore::in_memory())
            }
        }
    } else {
        log_init_step!(2, 6, "Usage Store", "💾 In-memory (Redis not configured)");
        Arc::new(UsageStore::in_memory())
    };
    step_timer.finish();

    // [3/6] Storage + entitlement gate
    let step_timer = OpTimer::new("server", "entitlement");
    let repository: Arc<dyn ChatRepository> = Arc::new(MemoryRepository::new());
    let guests = Arc::new(GuestUsageTracker::new());
    let gate = Arc::new(EntitlementGate::new(
        Arc::clone(&repository),
        Arc::clone(&usage),
        Arc::clone(&guests),
        config.plans,
    ));
    log_init_step!(
        3,
        6,
        "Entitlement Gate",
        format!(
            "🛂 free {}/{} · pro {}/{} per day",
            config.plans.free.searches_per_day,
            config.plans.free.deep_searches_per_day,
            config.plans.pro.searches_per_day,
            config.plans.pro.deep_searches_per_day
        )
    );
    step_timer.finish();

    // [4/6] Model driver
    let step_timer = OpTimer::new("server", "llm_driver");
    let llm_settings = config.llm.to_settings();
    let key_info = if llm_settings.api_key.is_some() {
        "✓"
    } else {
        "✗ No API key"
    };
    log_init_step!(
        4,
        6,
        "Model Driver",
        format!("⚙️ {:?} {} {}", llm_settings.provider, llm_settings.model, key_info)
    );
    if llm_settings.api_key.is_none() {
        log_init_warning!(
            "No API key configured for provider: {:?}. Model requests will fail.",
            llm_settings.provider
        );
    }
    let driver = create_driver(llm_settings);
    step_timer.finish();

    // [5/6] Stream registry + turn orchestrator
    let step_timer = OpTimer::new("server", "orchestrator");
    let registry = if config.gateway.resumable_streams {
        log_init_step!(5, 6, "Stream Registry", "🔁 Resumable streams enabled");
        Some(Arc::new(StreamRegistry::new()))
    } else {
        log_init_step!(5, 6, "Stream Registry", "🔁 Disabled");
        None
    };
    let orchestrator = Arc::new(TurnOrchestrator::new(
        driver,
        Arc::clone(&repository),
        Arc::clone(&usage),
        registry.clone(),
        Arc::new(DocumentStore::new()),
        config.tools.clone(),
        config.gateway.system_prompt.clone(),
    ));
    step_timer.finish();

    let limiters = Arc::new(IdentityRateLimiters::new(
        config.gateway.rate_limit_per_minute,
        config.gateway.rate_limit_burst,
        config.gateway.daily_message_cap,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        resolver,
        gate,
        orchestrator,
        repository,
        registry,
        limiters,
    };

    // [6/6] Build router with middleware
    let step_timer = OpTimer::new("server", "router");
    let app = api::create_router()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.timeout_secs),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            api::rate_limit::rate_limit_middleware,
        ))
        .with_state(state);
    log_init_step!(6, 6, "Router", "🌐 Routes + middleware configured");
    step_timer.finish();

    overall_timer.finish();
    log_success!("Harbor API server created successfully");
    tracing::info!("");

    Ok(app)
}

/// Initialize Redis connection.
async fn init_redis(url: &str) -> anyhow::Result<redis::aio::ConnectionManager> {
    let client = redis::Client::open(url)?;
    let conn = redis::aio::ConnectionManager::new(client).await?;
    Ok(conn)
}
