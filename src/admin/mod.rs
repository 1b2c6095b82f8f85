//! Admin API for a management UI.
//!
//! # Routes
//! - `GET  /admin/status`
//! - `GET  /admin/scopes/{scope}`
//! - `GET  /admin/scopes/{scope}/channels/{channel}/health`
//! - `POST /admin/scopes/{scope}/channels/{channel}/health/reset`
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::scheduler::Scheduler;

/// Shared state of the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub scheduler: Arc<Scheduler>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(scheduler: Arc<Scheduler>, api_key: &str) -> Self {
        Self {
            scheduler,
            api_key: Arc::from(api_key),
        }
    }
}

/// Errors surfaced by admin routes.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("missing or invalid admin credentials")]
    Unauthorized,

    #[error("channel '{channel}' is not configured in scope '{scope}'")]
    UnknownChannel { scope: String, channel: String },
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
            AdminError::UnknownChannel { .. } => StatusCode::NOT_FOUND,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/scopes/{scope}", get(get_scope))
        .route(
            "/admin/scopes/{scope}/channels/{channel}/health",
            get(get_channel_health),
        )
        .route(
            "/admin/scopes/{scope}/channels/{channel}/health/reset",
            post(reset_channel_health),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
