//! Application startup and lifecycle management.

use crate::calendar::{Clock, SystemClock};
use crate::config::RenewalConfig;
use crate::services::notifier::{BarkSender, SmtpSender, TelegramSender, WebhookSender};
use crate::services::{
    get_metrics, init_metrics, BlobStore, Dispatcher, EvaluationReport, EvaluationService,
    HttpRateSource, InMemoryStore, NotificationSender, RateSource, RedisStore, SpendSummary,
    SubscriptionRepository, SubscriptionService,
};
use axum::{
    extract::State, http::StatusCode, middleware, response::IntoResponse, routing::get,
    routing::post, Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: RenewalConfig,
    pub repository: SubscriptionRepository,
    pub dispatcher: Dispatcher,
    pub evaluation: EvaluationService,
    pub subscriptions: SubscriptionService,
    pub rate_source: Arc<dyn RateSource>,
}

/// Health check endpoint for Docker/K8s liveness checks.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.repository.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "renewal-service",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "renewal-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness checks.
async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.repository.health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        AppError::ServiceUnavailable
    })?;
    if let Err(e) = state.dispatcher.health_check().await {
        tracing::warn!(error = %e, "Notification channel misconfigured");
    }
    Ok(StatusCode::OK)
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Run one evaluation pass on demand.
async fn evaluate_now(State(state): State<AppState>) -> Result<Json<EvaluationReport>, AppError> {
    Ok(Json(state.evaluation.run_evaluation_pass().await?))
}

/// Monthly spend in the base currency.
async fn summary(State(state): State<AppState>) -> Result<Json<SpendSummary>, AppError> {
    Ok(Json(
        state
            .subscriptions
            .spend_summary(state.rate_source.as_ref())
            .await?,
    ))
}

fn build_dispatcher(config: &RenewalConfig) -> Result<Dispatcher, AppError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

    let smtp = SmtpSender::new(config.smtp.clone())
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

    let senders: Vec<Arc<dyn NotificationSender>> = vec![
        Arc::new(WebhookSender::new(config.webhook.clone(), client.clone())),
        Arc::new(TelegramSender::new(config.telegram.clone(), client.clone())),
        Arc::new(BarkSender::new(config.bark.clone(), client)),
        Arc::new(smtp),
    ];
    Ok(Dispatcher::new(senders))
}

async fn build_store(config: &RenewalConfig) -> Result<Arc<dyn BlobStore>, AppError> {
    match &config.store.redis_url {
        Some(url) => {
            let store = RedisStore::new(url).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to Redis");
                AppError::from(e)
            })?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("REDIS_URL not set, subscriptions are kept in memory only");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: RenewalConfig) -> Result<Self, AppError> {
        let store = build_store(&config).await?;
        let dispatcher = build_dispatcher(&config)?;
        Self::build_with(config, store, dispatcher, Arc::new(SystemClock)).await
    }

    /// Build from explicit parts. Tests use this to inject an in-memory
    /// store, recording senders and a frozen clock.
    pub async fn build_with(
        config: RenewalConfig,
        store: Arc<dyn BlobStore>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let repository = SubscriptionRepository::new(store, config.store.key_prefix.clone());
        let evaluation =
            EvaluationService::new(repository.clone(), dispatcher.clone(), clock.clone());
        let subscriptions = SubscriptionService::new(repository.clone(), clock);
        let rate_source: Arc<dyn RateSource> = Arc::new(HttpRateSource::new(
            config.rates.api_url.clone(),
            reqwest::Client::new(),
        ));

        let state = AppState {
            config: config.clone(),
            repository,
            dispatcher,
            evaluation,
            subscriptions,
            rate_source,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Renewal service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn subscriptions(&self) -> &SubscriptionService {
        &self.state.subscriptions
    }

    pub fn evaluation(&self) -> &EvaluationService {
        &self.state.evaluation
    }

    /// Run the scheduler and the HTTP server until either stops.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let interval_secs = self.state.config.scheduler.interval_secs;
        let evaluation = self.state.evaluation.clone();

        let scheduler = async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = evaluation.run_evaluation_pass().await {
                    tracing::error!(error = %e, "Evaluation pass failed");
                }
            }
        };

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_handler))
            .route("/evaluate", post(evaluate_now))
            .route("/summary", get(summary))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(self.state);

        tracing::info!(
            service = "renewal-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            interval_secs = interval_secs,
            "Service ready to accept connections"
        );

        tokio::select! {
            result = axum::serve(self.listener, router) => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "HTTP server error");
                    return Err(std::io::Error::other(format!("HTTP server error: {}", e)));
                }
            }
            _ = scheduler => {}
        }

        Ok(())
    }
}
