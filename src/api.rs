//! HTTP API over the probe, resolver, dispatcher and changelog.
//!
//! Endpoints: container count/status maps, per-tool status, lifecycle
//! actions, changelog read and append, the static tool catalog, and a
//! health check.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog;
use crate::changelog::Changelog;
use crate::commands::{ActionResult, Dispatcher};
use crate::docker::{ContainerStatus, LifecycleState, Probe};
use crate::monitor::MonitorHandle;
use crate::resolver::ToolResolver;

pub struct AppState {
    pub probe: Probe,
    pub resolver: ToolResolver,
    pub dispatcher: Dispatcher,
    pub changelog: Arc<Changelog>,
    pub monitor: MonitorHandle,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/containers", get(container_count))
        .route("/api/containers/status", get(container_status))
        .route("/api/containers/tools", get(tool_status))
        .route("/api/containers/stats", get(container_stats))
        .route("/api/containers/{name}/start", post(start_container))
        .route("/api/containers/{name}/stop", post(stop_container))
        .route("/api/containers/{name}/restart", post(restart_container))
        .route("/api/changelog", get(changelog_entries))
        .route("/api/changelog/stats", get(changelog_stats))
        .route("/api/changelog/add", post(changelog_add))
        .route("/api/tools", get(tool_catalog))
        .route("/health", get(health))
        .with_state(state)
}

async fn container_count(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let count = state.probe.count_running().await;
    state
        .changelog
        .append(
            "api_call",
            &format!("Container count requested: {count} containers"),
            "system",
            "info",
        )
        .await;
    Json(json!({ "count": count }))
}

async fn container_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let containers = state.probe.list_all().await;
    state
        .changelog
        .append(
            "api_call",
            &format!("Container status requested: {} containers", containers.len()),
            "system",
            "info",
        )
        .await;
    Json(json!({ "containers": containers }))
}

async fn tool_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let tool_containers = state.resolver.status_for_all_tools(&state.probe).await;
    state
        .changelog
        .append(
            "api_call",
            &format!(
                "Tool container status requested: {} tools",
                tool_containers.len()
            ),
            "system",
            "info",
        )
        .await;
    Json(json!({ "tool_containers": tool_containers }))
}

#[derive(Debug, Serialize)]
struct ToolContainerStats {
    total: usize,
    running: usize,
    stopped: usize,
    not_found: usize,
}

#[derive(Debug, Serialize)]
struct ContainerStatsResponse {
    total_containers: usize,
    running_containers: usize,
    stopped_containers: usize,
    tool_containers: ToolContainerStats,
    health_percentage: f64,
    last_updated: String,
}

fn count_state(containers: &HashMap<String, ContainerStatus>, state: LifecycleState) -> usize {
    containers.values().filter(|c| c.status == state).count()
}

async fn container_stats(State(state): State<Arc<AppState>>) -> Json<ContainerStatsResponse> {
    let all = state.probe.list_all().await;
    let tools = state.resolver.statuses_in(&all);

    let total_containers = all.len();
    let running_containers = count_state(&all, LifecycleState::Running);
    let health_percentage = if total_containers > 0 {
        (running_containers as f64 / total_containers as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    let stats = ContainerStatsResponse {
        total_containers,
        running_containers,
        stopped_containers: count_state(&all, LifecycleState::Stopped),
        tool_containers: ToolContainerStats {
            total: tools.len(),
            running: count_state(&tools, LifecycleState::Running),
            stopped: count_state(&tools, LifecycleState::Stopped),
            not_found: count_state(&tools, LifecycleState::NotFound),
        },
        health_percentage,
        last_updated: chrono::Local::now().to_rfc3339(),
    };

    state
        .changelog
        .append(
            "api_call",
            &format!("Container stats requested: {}% health", stats.health_percentage),
            "system",
            "info",
        )
        .await;
    Json(stats)
}

/// The "requested" entry is the API layer's responsibility and is written
/// whether or not the command itself succeeded.
async fn log_action_requested(state: &AppState, name: &str, verb: &str) {
    state
        .changelog
        .append(
            "container_action",
            &format!("Container '{name}' {verb} requested"),
            "api_user",
            "info",
        )
        .await;
}

async fn start_container(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<ActionResult> {
    let result = state.dispatcher.start(&name).await;
    log_action_requested(&state, &name, "start").await;
    Json(result)
}

async fn stop_container(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<ActionResult> {
    let result = state.dispatcher.stop(&name).await;
    log_action_requested(&state, &name, "stop").await;
    Json(result)
}

async fn restart_container(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<ActionResult> {
    let result = state.dispatcher.restart(&name).await;
    log_action_requested(&state, &name, "restart").await;
    Json(result)
}

#[derive(Debug, Deserialize)]
struct ChangelogParams {
    limit: Option<usize>,
    level: Option<String>,
}

async fn changelog_entries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChangelogParams>,
) -> Json<serde_json::Value> {
    let entries = state
        .changelog
        .entries(params.limit, params.level.as_deref())
        .await;
    Json(json!({ "entries": entries }))
}

async fn changelog_stats(
    State(state): State<Arc<AppState>>,
) -> Json<crate::changelog::ChangelogStats> {
    Json(state.changelog.stats().await)
}

fn default_action() -> String {
    "unknown".to_string()
}

fn default_user() -> String {
    "api_user".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
struct NewEntry {
    #[serde(default = "default_action")]
    action: String,
    #[serde(default)]
    details: String,
    #[serde(default = "default_user")]
    user: String,
    #[serde(default = "default_level")]
    level: String,
}

async fn changelog_add(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewEntry>,
) -> Json<serde_json::Value> {
    let entry = state
        .changelog
        .append(&body.action, &body.details, &body.user, &body.level)
        .await;
    Json(json!({ "success": true, "entry": entry }))
}

async fn tool_catalog() -> Json<serde_json::Value> {
    Json(json!({ "tools": catalog::TOOL_CATALOG }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Local::now().to_rfc3339(),
        "container_count": state.probe.count_running().await,
        "changelog_entries": state.changelog.len().await,
        "monitoring_active": state.monitor.is_active(),
    }))
}
