//! 部署上下文
//!
//! 统一的 pipeline 执行上下文，封装事件发射

use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::deploy::RunningDeployment;
use crate::domain::event::{DeployEvent, EventKind};
use crate::state::AppState;

use super::PipelineError;

/// 部署执行上下文
///
/// 每次准入的 run 一个实例，所有事件经由它进入 broadcaster
#[derive(Clone)]
pub struct PipelineContext {
    /// 仓库名
    pub repo: String,
    /// 本次 run 的标识
    pub run_id: Uuid,
    /// 应用状态
    pub state: Arc<AppState>,
    /// 取消令牌（关闭时终止在跑的钩子命令）
    pub cancel_token: CancellationToken,
}

impl PipelineContext {
    /// 从准入记录创建上下文
    pub fn new(state: Arc<AppState>, record: &RunningDeployment) -> Self {
        let cancel_token = state.shutdown.child_token();
        Self {
            repo: record.repo.clone(),
            run_id: record.run_id,
            state,
            cancel_token,
        }
    }

    /// 发射任意事件
    pub async fn emit(&self, kind: EventKind, payload: Value) {
        self.state
            .broadcaster
            .publish(DeployEvent::new(kind, &self.repo, payload))
            .await;
    }

    /// 发射一行 deploy-log
    pub async fn log(&self, message: &str) {
        self.state
            .broadcaster
            .publish(DeployEvent::log(&self.repo, message))
            .await;
    }

    /// 发射起始 status 事件
    pub async fn status_started(&self) {
        self.emit(EventKind::Status, json!({ "inprogress": true })).await;
    }

    /// 发射终态 status 事件
    pub async fn status_finished(&self, success: bool) {
        self.emit(
            EventKind::Status,
            json!({ "inprogress": false, "success": success }),
        )
        .await;
    }

    /// 发射失败详情事件
    pub async fn error(&self, err: &PipelineError) {
        self.emit(
            EventKind::Error,
            json!({
                "reason": err.reason(),
                "stage": err.stage(),
                "detail": err.to_string(),
            }),
        )
        .await;
    }
}
