//! Conciliar Web Server
//!
//! Axum-based REST API for manual-review screens of the reconciliation engine.
//!
//! - No authentication layer: the acting user is read from the `x-user-id`
//!   header and recorded on manual actions
//! - Domain errors map to 4xx status codes
//! - Sanitized error responses for everything else

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use conciliar_core::db::Database;
use conciliar_core::Error as CoreError;

mod handlers;

/// Maximum listing limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Header carrying the acting user id
const USER_ID_HEADER: &str = "x-user-id";

/// User recorded when the header is absent
pub const DEFAULT_USER: &str = "system";

/// Shared application state
pub struct AppState {
    pub db: Database,
}

/// Acting user for manual actions
pub fn get_user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_USER)
        .to_string()
}

/// Create the application router
pub fn create_router(db: Database) -> Router {
    let state = Arc::new(AppState { db });

    let api_routes = Router::new()
        // Statements
        .route(
            "/statements",
            get(handlers::list_statements).post(handlers::create_statement),
        )
        .route("/statements/:id", get(handlers::get_statement))
        .route(
            "/statements/:id/items",
            get(handlers::list_items).post(handlers::add_items),
        )
        .route("/statements/:id/auto-match", post(handlers::auto_match))
        .route("/statements/:id/summary", get(handlers::get_summary))
        .route("/statements/:id/verify", get(handlers::verify_counters))
        // Statement items
        .route("/items/:id", get(handlers::get_item))
        .route("/items/:id/suggestions", get(handlers::get_suggestions))
        .route("/items/:id/match", post(handlers::match_item))
        .route("/items/:id/unmatch", post(handlers::unmatch_item))
        .route(
            "/items/:id/resolve-suspense",
            post(handlers::resolve_suspense),
        )
        .route("/items/:id/materialize", post(handlers::materialize))
        // Internal records
        .route("/records", post(handlers::create_record))
        .route("/records/:id", get(handlers::get_record))
        .route(
            "/accounts/:id/unmatched-records",
            get(handlers::list_unmatched_records),
        );

    // Same-origin only; the review UI is expected to be served alongside
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static(USER_ID_HEADER),
        ]);

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(db);
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
#[derive(Debug)]
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

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
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

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        // Domain rule violations are safe to echo back
        if let Some(core) = err.downcast_ref::<CoreError>().filter(|e| e.is_domain()) {
            let message = core.to_string();
            return match core {
                CoreError::NotFound(_) => Self::not_found(&message),
                CoreError::AlreadyReconciled(_)
                | CoreError::NotReconciled(_)
                | CoreError::NotSuspense(_)
                | CoreError::PreconditionFailed(_) => Self::conflict(&message),
                _ => Self::bad_request(&message),
            };
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
