//! 部署钩子执行
//!
//! 同步完成后、重启之前，按声明顺序逐条执行钩子命令。
//! 输出逐行转发成 deploy-log 事件，订阅者能实时看到进度

use std::path::Path;

use tokio::sync::mpsc;

use crate::config::deployment::DeploymentDefinition;
use crate::infra::command::CommandRunner;

use super::context::PipelineContext;
use super::PipelineError;

/// 执行一个部署的全部钩子
///
/// 部署自己的钩子在前，全局钩子在后；任何一条失败即中止剩余钩子
pub(super) async fn run_all(
    ctx: &PipelineContext,
    definition: &DeploymentDefinition,
) -> Result<(), PipelineError> {
    let commands: Vec<&String> = definition
        .post_deploy
        .iter()
        .chain(ctx.state.config.global_post_deploy().iter())
        .collect();

    for command in commands {
        run_hook(ctx, definition, command).await?;
    }
    Ok(())
}

/// 执行单条钩子命令
async fn run_hook(
    ctx: &PipelineContext,
    definition: &DeploymentDefinition,
    command: &str,
) -> Result<(), PipelineError> {
    ctx.log(&format!(">>> {}", command)).await;

    let (log_tx, mut log_rx) = mpsc::unbounded_channel::<crate::domain::event::LogLine>();

    // 命令还在跑时就把输出行转发出去，不等它结束
    let forward_ctx = ctx.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(line) = log_rx.recv().await {
            forward_ctx.log(&line.content).await;
        }
    });

    let result = CommandRunner::run_shell_with_streaming(
        command,
        Path::new(&definition.path),
        log_tx,
        ctx.cancel_token.clone(),
        ctx.state.env.timeouts.hook,
    )
    .await;

    let _ = forward_task.await;

    match result {
        Ok(r) if r.status.success() && !r.timed_out => Ok(()),
        Ok(r) => Err(PipelineError::HookFailed {
            command: command.to_string(),
            code: r.status.code().unwrap_or(-1),
        }),
        Err(e) => {
            tracing::warn!(
                repo = %ctx.repo,
                command = %command,
                error = %e,
                "Hook command did not run to completion"
            );
            Err(PipelineError::HookFailed {
                command: command.to_string(),
                code: -1,
            })
        }
    }
}
