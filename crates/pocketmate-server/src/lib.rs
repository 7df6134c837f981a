//! Pocket Mate Web Server
//!
//! Axum-based REST API over pocketmate-core, plus the background job
//! scheduler for the three routines (recurrence scan, budget check,
//! monthly reports).
//!
//! Identity is header-based: the reverse proxy / identity provider injects
//! the authenticated external user id and email, and the server provisions
//! a local user row the first time an id is seen. Error responses are
//! sanitized; full errors go to the log only.

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use pocketmate_core::db::Database;
use pocketmate_core::email::{EmailClient, Notifier};
use pocketmate_core::insights::{GeminiClient, InsightBackend};
use pocketmate_core::models::User;

mod handlers;
mod scheduler;

pub use scheduler::{start_scheduler, ScheduleConfig};

/// Maximum receipt upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// At most this many recurring occurrences post per user per cycle; anything
/// beyond is still due and is picked up by the next scan
pub const RECURRING_PER_USER_LIMIT: usize = 10;

/// Header carrying the authenticated external user id
const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's email
const USER_EMAIL_HEADER: &str = "x-user-email";

/// Header carrying the authenticated user's display name (optional)
const USER_NAME_HEADER: &str = "x-user-name";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Email delivery backend; None when not configured
    pub notifier: Option<Arc<dyn Notifier>>,
    /// Generative-AI backend for insights and receipt scans; None when not configured
    pub insights: Option<Arc<dyn InsightBackend>>,
}

/// Resolve the caller from identity headers, provisioning a user row on
/// first sight.
///
/// The id and email headers are required; the name header is optional and
/// sticks once seen (later requests without it keep the stored name).
pub(crate) fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let auth_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing identity headers"))?;
    let email = headers
        .get(USER_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing identity headers"))?;
    let name = headers
        .get(USER_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    Ok(state.db.upsert_user(auth_id, email, name)?)
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router with backends from the environment
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    let notifier: Option<Arc<dyn Notifier>> = match EmailClient::from_env() {
        Some(client) => {
            info!("Email notifier configured");
            Some(Arc::new(client))
        }
        None => {
            info!("Email notifier not configured (set POCKETMATE_EMAIL_API_KEY to enable)");
            None
        }
    };

    let insights: Option<Arc<dyn InsightBackend>> = match GeminiClient::from_env() {
        Some(client) => {
            info!("Insight backend configured");
            Some(Arc::new(client))
        }
        None => {
            info!("Insight backend not configured (set GEMINI_API_KEY to enable)");
            None
        }
    };

    create_router_with_backends(db, config, notifier, insights)
}

/// Create the application router with explicit backends (for testing)
pub fn create_router_with_backends(
    db: Database,
    config: ServerConfig,
    notifier: Option<Arc<dyn Notifier>>,
    insights: Option<Arc<dyn InsightBackend>>,
) -> Router {
    use axum::routing::{get, post, put};

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        notifier,
        insights,
    });

    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health))
        // Identity
        .route("/me", get(handlers::get_me))
        .route(
            "/me/currency",
            get(handlers::get_currency).put(handlers::update_currency),
        )
        // Accounts
        .route(
            "/accounts",
            get(handlers::list_accounts).post(handlers::create_account),
        )
        .route("/accounts/:id", get(handlers::get_account))
        .route(
            "/accounts/:id/default",
            post(handlers::set_default_account),
        )
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/:id",
            get(handlers::get_transaction)
                .put(handlers::update_transaction)
                .delete(handlers::delete_transaction),
        )
        // Budget (one per user)
        .route(
            "/budget",
            get(handlers::get_budget).put(handlers::upsert_budget),
        )
        // Stats and dashboard
        .route("/stats/monthly", get(handlers::get_monthly_stats))
        .route("/dashboard", get(handlers::get_dashboard))
        // Receipt scanning
        .route("/receipts/scan", post(handlers::scan_receipt))
        // Operator job triggers - the same idempotent routines the
        // scheduler calls
        .route("/jobs/recurring", post(handlers::run_recurring_job))
        .route("/jobs/budgets", post(handlers::run_budget_job))
        .route("/jobs/reports", post(handlers::run_report_job));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server, with the background scheduler when configured
pub async fn serve(db: Database, host: &str, port: u16, config: ServerConfig) -> anyhow::Result<()> {
    let notifier: Option<Arc<dyn Notifier>> = EmailClient::from_env().map(|c| Arc::new(c) as _);
    let insights: Option<Arc<dyn InsightBackend>> = GeminiClient::from_env().map(|c| Arc::new(c) as _);

    if notifier.is_none() {
        warn!("Email notifier not configured - budget alerts and reports will not send");
    }

    if let Some(schedule) = ScheduleConfig::from_env() {
        start_scheduler(db.clone(), notifier.clone(), insights.clone(), schedule);
    } else {
        info!("Background scheduler disabled (set POCKETMATE_SCHEDULE=1 to enable)");
    }

    let app = create_router_with_backends(db, config, notifier, insights);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<pocketmate_core::Error> for AppError {
    fn from(err: pocketmate_core::Error) -> Self {
        match err {
            pocketmate_core::Error::NotFound(what) => Self {
                status: StatusCode::NOT_FOUND,
                message: format!("{} not found", what),
                internal: None,
            },
            pocketmate_core::Error::InvalidData(msg) => Self {
                status: StatusCode::BAD_REQUEST,
                message: msg,
                internal: None,
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(other.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests;
