use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::admin::{AdminError, AdminState};
use crate::health::HealthSnapshot;
use crate::scheduler::SchedulerSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub scopes: Vec<String>,
}

#[derive(Serialize)]
pub struct ChannelHealth {
    pub scope: String,
    pub channel: String,
    pub health: HealthSnapshot,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        scopes: state.scheduler.registry().scopes(),
    })
}

pub async fn get_scope(
    State(state): State<AdminState>,
    Path(scope): Path<String>,
) -> Json<SchedulerSnapshot> {
    Json(state.scheduler.state(&scope))
}

/// Only enabled channels are health-tracked.
fn ensure_channel(state: &AdminState, scope: &str, channel: &str) -> Result<(), AdminError> {
    let known = state
        .scheduler
        .registry()
        .list_channels(scope)
        .iter()
        .any(|c| c.enabled && c.id == channel);
    if known {
        Ok(())
    } else {
        Err(AdminError::UnknownChannel {
            scope: scope.to_string(),
            channel: channel.to_string(),
        })
    }
}

pub async fn get_channel_health(
    State(state): State<AdminState>,
    Path((scope, channel)): Path<(String, String)>,
) -> Result<Json<ChannelHealth>, AdminError> {
    ensure_channel(&state, &scope, &channel)?;
    let health = state.scheduler.health().status(&scope, &channel);
    Ok(Json(ChannelHealth {
        scope,
        channel,
        health,
    }))
}

pub async fn reset_channel_health(
    State(state): State<AdminState>,
    Path((scope, channel)): Path<(String, String)>,
) -> Result<Json<ChannelHealth>, AdminError> {
    ensure_channel(&state, &scope, &channel)?;
    let tracker = state.scheduler.health();
    tracker.reset(&scope, &channel);
    Ok(Json(ChannelHealth {
        health: tracker.status(&scope, &channel),
        scope,
        channel,
    }))
}
