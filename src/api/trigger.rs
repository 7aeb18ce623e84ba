//! 手动触发部署 API

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::domain::deploy::PushEvent;
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireApiKey;
use crate::services;
use crate::state::AppState;

/// 触发部署响应
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub repo: String,
    pub status: String,
    pub stream_url: String,
}

/// 创建手动触发路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/trigger/:repo", post(trigger_deploy))
}

/// 手动触发部署
///
/// POST /trigger/:repo
/// 需要 API Key
///
/// 合成一个指向该部署目标分支的 push 事件，之后与 webhook 同路
async fn trigger_deploy(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(repo): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let definition = state
        .config
        .definition_for(&repo)
        .ok_or_else(|| ApiError::not_found(format!("Deployment '{}'", repo)))?;

    // 提前给出友好的 409；真正的准入判定仍在 pipeline 里原子完成
    if state.registry.is_running(&repo).await {
        return Err(ApiError::conflict(format!(
            "Deployment for '{}' is already in flight",
            repo
        )));
    }

    let git_ref = format!("refs/heads/{}", definition.branch);
    let event = PushEvent::new(repo.clone(), git_ref, json!({ "source": "manual" }));
    tokio::spawn(services::pipeline::execute(state.clone(), event));

    tracing::info!(repo = %repo, "Manual deployment triggered");

    Ok(Json(TriggerResponse {
        repo,
        status: "started".to_string(),
        stream_url: "/events/stream".to_string(),
    }))
}
