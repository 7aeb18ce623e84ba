//! 健康检查和部署状态 API
//!
//! 包含 /health, /status 端点

use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::env::constants::VERSION;
use crate::domain::deploy::RunningDeployment;
use crate::state::AppState;

/// 部署状态响应
#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    running: Vec<RunningDeployment>,
}

/// 健康检查响应
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    uptime_secs: i64,
    repos: Vec<String>,
    default_branch: String,
    active_deploys: usize,
    active_repos: Vec<String>,
    listeners: usize,
}

/// 创建状态路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(deploy_status))
}

/// 部署状态 - 进程级状态加在途部署快照
///
/// GET /status
/// 无需认证
async fn deploy_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        status: state.broadcaster.current_state().await.as_str(),
        running: state.registry.snapshot().await,
    })
}

/// 健康检查 - 返回状态、版本、运行时间等信息
///
/// GET /health
/// 无需认证
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.registry.snapshot().await;
    let active_repos: Vec<String> = snapshot.iter().map(|r| r.repo.clone()).collect();

    Json(HealthResponse {
        status: "ok",
        service: "push-deploy-agent",
        version: VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
        repos: state.config.repo_names(),
        default_branch: state.config.expected_branch().to_string(),
        active_deploys: snapshot.len(),
        active_repos,
        listeners: state.config.listeners().len(),
    })
}
