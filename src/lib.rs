//! Push Deploy Agent - 推送触发的部署代理
//!
//! 接收代码仓库的 push 通知，同步工作副本、执行部署钩子、
//! 重启被托管的进程，并向订阅者广播部署事件

pub mod error;
pub mod middleware;
pub mod infra;
pub mod domain;
pub mod config;
pub mod state;
pub mod api;
pub mod services;

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::deployment::DeployConfig;
use crate::config::env::EnvConfig;
use crate::state::AppState;

/// 启动阶段错误
///
/// 启动失败是唯一允许进程非零退出的路径，运行期的部署失败全部被
/// pipeline 内部消化
#[derive(Debug, Error)]
pub enum BootError {
    #[error("failed to load deploy config: {0}")]
    Config(#[from] crate::config::deployment::ConfigError),

    #[error("process supervisor unreachable at boot: {0}")]
    Supervisor(#[from] crate::infra::supervisor::SupervisorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 启动并运行 agent，直到收到关闭信号
pub async fn run() -> Result<(), BootError> {
    let env = EnvConfig::from_env();
    let config = DeployConfig::load(std::path::Path::new(&env.config_path))?;

    info!(
        port = env.port,
        config_path = %env.config_path,
        deployments = config.deployment_count(),
        listeners = config.listeners().len(),
        "Loaded configuration"
    );

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(env, config, shutdown.clone()));

    // 启动时必须能连上进程管理器，连不上视为不可恢复的启动失败
    let managed = state.supervisor.list().await?;
    info!(processes = managed.len(), "Connected to process supervisor");

    reconcile_processes(&state).await;

    let listener =
        tokio::net::TcpListener::bind(("0.0.0.0", state.env.port)).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "Listening");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Shut down");
    Ok(())
}

/// 启动对账：配置里的每个部署都应有对应的被托管进程，缺失的补启动
///
/// 单个部署启动失败只记录日志，不阻止 agent 启动
async fn reconcile_processes(state: &Arc<AppState>) {
    for definition in state.config.definitions() {
        match state.supervisor.find(&definition.name).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!(repo = %definition.name, "Managed process missing, starting");
                if let Err(e) = state.supervisor.start(definition).await {
                    error!(repo = %definition.name, error = %e, "Failed to start managed process");
                }
            }
            Err(e) => {
                warn!(repo = %definition.name, error = %e, "Failed to query supervisor");
            }
        }
    }
}
