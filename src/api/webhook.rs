//! Push webhook 接入
//!
//! 签名校验由上游网关负责，这里只解析 payload 并把事件交给 pipeline。
//! 立即返回 202，部署在后台任务中进行

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::domain::deploy::PushEvent;
use crate::error::{ApiError, ApiResult};
use crate::services;
use crate::state::AppState;

/// push payload 中用到的字段（GitHub 风格）
#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    repository: RepositoryInfo,
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    name: String,
}

/// 创建 webhook 路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", post(receive_push))
}

/// 接收 push 通知
///
/// POST /webhook
///
/// 未配置的仓库同样返回 202：对 pipeline 来说那是静默 no-op，
/// 不是调用方的错误
async fn receive_push(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let push: PushPayload = serde_json::from_value(payload.clone())
        .map_err(|e| ApiError::bad_request(format!("Invalid push payload: {}", e)))?;

    info!(
        repo = %push.repository.name,
        git_ref = %push.git_ref,
        "Received push event"
    );

    let repo = push.repository.name.clone();
    let event = PushEvent::new(push.repository.name, push.git_ref, payload);
    tokio::spawn(services::pipeline::execute(state.clone(), event));

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true, "repo": repo })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_github_style_payload() {
        let payload = json!({
            "ref": "refs/heads/main",
            "before": "abc123",
            "after": "def456",
            "repository": { "name": "api", "full_name": "acme/api" },
            "pusher": { "name": "alice" }
        });

        let push: PushPayload = serde_json::from_value(payload).unwrap();
        assert_eq!(push.git_ref, "refs/heads/main");
        assert_eq!(push.repository.name, "api");
    }

    #[test]
    fn test_payload_missing_repository_is_rejected() {
        let payload = json!({ "ref": "refs/heads/main" });
        assert!(serde_json::from_value::<PushPayload>(payload).is_err());
    }
}
