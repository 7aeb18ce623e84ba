//! 部署 pipeline
//!
//! 每个 push 事件驱动一条固定顺序的状态机：
//! Match → Admit → BranchCheck → LocateProcess → Sync → PostHooks →
//! Restart → Finalize。任何一步失败直接短路到 Finalize；
//! Finalize 对每次准入的 run 恰好执行一次

pub mod context;
pub mod hooks;

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::deployment::DeploymentDefinition;
use crate::domain::deploy::PushEvent;
use crate::domain::event::{DeployEvent, EventKind};
use crate::infra::git::SyncError;
use crate::infra::supervisor::SupervisorError;
use crate::state::AppState;

pub use context::PipelineContext;

/// pipeline 终止条件
///
/// busy 不在其中：准入被拒的 push 从未进入状态机，
/// 只产生一条信息性 status 事件
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("push is for branch '{actual}', expected '{expected}'")]
    WrongBranch { expected: String, actual: String },

    #[error("no supervised process named '{name}': {detail}")]
    UnmanagedProcess { name: String, detail: String },

    #[error("repository sync failed: {0}")]
    SyncFailed(#[from] SyncError),

    #[error("hook '{command}' exited with status {code}")]
    HookFailed { command: String, code: i32 },

    #[error("process restart failed: {0}")]
    RestartFailed(SupervisorError),
}

impl PipelineError {
    /// 对外报告的失败原因
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::WrongBranch { .. } => "wrong-branch",
            PipelineError::UnmanagedProcess { .. } => "unmanaged-process",
            PipelineError::SyncFailed(_) => "sync-failed",
            PipelineError::HookFailed { .. } => "hook-failed",
            PipelineError::RestartFailed(_) => "restart-failed",
        }
    }

    /// 失败发生的阶段
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::WrongBranch { .. } => "branch-check",
            PipelineError::UnmanagedProcess { .. } => "locate-process",
            PipelineError::SyncFailed(_) => "sync",
            PipelineError::HookFailed { .. } => "post-hooks",
            PipelineError::RestartFailed(_) => "restart",
        }
    }
}

/// 执行一次部署
///
/// webhook/trigger handler 把 push 事件交到这里后即可返回；
/// 不同仓库的 run 并发执行，同一仓库由注册表准入串行化
pub async fn execute(state: Arc<AppState>, push: PushEvent) {
    // Match：未配置的仓库静默忽略，不产生事件也不动注册表
    let Some(definition) = state.config.definition_for(&push.repo) else {
        debug!(repo = %push.repo, "Push for unmanaged repository, ignoring");
        return;
    };

    // Admit：已有在途部署时拒绝本次 push，事件被丢弃而不是排队
    let Some(record) = state.registry.try_admit(&push.repo).await else {
        info!(repo = %push.repo, "Deployment already in flight, refusing push");
        state
            .broadcaster
            .publish(DeployEvent::new(
                EventKind::Status,
                &push.repo,
                json!({ "busy": true }),
            ))
            .await;
        return;
    };

    let ctx = PipelineContext::new(state.clone(), &record);
    info!(repo = %ctx.repo, run_id = %ctx.run_id, "Deployment admitted");
    ctx.status_started().await;

    let outcome = run(&ctx, definition, &push).await;
    finalize(&ctx, outcome).await;
}

/// 准入之后的各阶段
async fn run(
    ctx: &PipelineContext,
    definition: &DeploymentDefinition,
    push: &PushEvent,
) -> Result<(), PipelineError> {
    // BranchCheck
    let actual = push.branch();
    if actual != definition.branch {
        return Err(PipelineError::WrongBranch {
            expected: definition.branch.clone(),
            actual: actual.to_string(),
        });
    }

    // LocateProcess：配置存在但进程不在管理器里，属于需要上报的运维错误
    let process = match ctx.state.supervisor.find(&definition.name).await {
        Ok(Some(process)) => process,
        Ok(None) => {
            return Err(PipelineError::UnmanagedProcess {
                name: definition.name.clone(),
                detail: "not registered with the supervisor".to_string(),
            })
        }
        Err(e) => {
            return Err(PipelineError::UnmanagedProcess {
                name: definition.name.clone(),
                detail: e.to_string(),
            })
        }
    };
    ctx.log("found process").await;

    // Sync
    let path = Path::new(&definition.path);
    ctx.log("pulling...").await;
    ctx.state.sync.fetch_all(path).await?;
    ctx.state
        .sync
        .merge_branches(
            path,
            &definition.branch,
            &format!("origin/{}", definition.branch),
        )
        .await?;
    ctx.log("finished pulling").await;

    // PostHooks
    hooks::run_all(ctx, definition).await?;

    // Restart
    ctx.log("restart...").await;
    ctx.state
        .supervisor
        .restart(&process.name)
        .await
        .map_err(PipelineError::RestartFailed)?;

    Ok(())
}

/// 收尾：释放注册表、发终态事件
///
/// 无论哪个阶段失败都会走到这里，且每次准入只走一次
async fn finalize(ctx: &PipelineContext, outcome: Result<(), PipelineError>) {
    ctx.state.registry.release(&ctx.repo).await;

    match outcome {
        Ok(()) => {
            ctx.status_finished(true).await;
            info!(repo = %ctx.repo, run_id = %ctx.run_id, "Deployed successfully");
        }
        Err(err) => {
            ctx.status_finished(false).await;
            ctx.error(&err).await;
            warn!(
                repo = %ctx.repo,
                run_id = %ctx.run_id,
                reason = err.reason(),
                stage = err.stage(),
                error = %err,
                "Deployment failed"
            );
        }
    }
}
