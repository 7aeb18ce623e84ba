//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::deployment::DeployConfig;
use crate::config::env::EnvConfig;
use crate::infra::git::{GitCli, RepoSync};
use crate::infra::supervisor::{Pm2Supervisor, ProcessSupervisor};

use super::broadcaster::EventBroadcaster;
use super::registry::RunningRegistry;

/// 应用状态
///
/// 所有共享组件的聚合点，handler 与 pipeline 通过 `Arc<AppState>` 访问
pub struct AppState {
    /// 环境配置
    pub env: EnvConfig,
    /// 部署目录（只读）
    pub config: DeployConfig,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,
    /// 运行中部署注册表
    pub registry: RunningRegistry,
    /// 事件广播器
    pub broadcaster: EventBroadcaster,
    /// 进程管理器适配
    pub supervisor: Arc<dyn ProcessSupervisor>,
    /// 仓库同步适配
    pub sync: Arc<dyn RepoSync>,
    /// 全局关闭令牌
    pub shutdown: CancellationToken,
}

impl AppState {
    /// 创建应用状态（生产适配器：pm2 + git CLI）
    pub fn new(env: EnvConfig, config: DeployConfig, shutdown: CancellationToken) -> Self {
        let supervisor = Arc::new(Pm2Supervisor::new(env.timeouts.supervisor));
        let sync = Arc::new(GitCli::new(env.timeouts.sync));
        Self::with_adapters(env, config, supervisor, sync, shutdown)
    }

    /// 注入自定义适配器创建应用状态
    pub fn with_adapters(
        env: EnvConfig,
        config: DeployConfig,
        supervisor: Arc<dyn ProcessSupervisor>,
        sync: Arc<dyn RepoSync>,
        shutdown: CancellationToken,
    ) -> Self {
        let broadcaster = EventBroadcaster::new(config.listeners().to_vec(), env.retry);

        for definition in config.definitions() {
            tracing::info!(
                repo = %definition.name,
                path = %definition.path,
                branch = %definition.branch,
                hooks = definition.post_deploy.len(),
                "Registered deployment"
            );
        }

        Self {
            env,
            config,
            started_at: Utc::now(),
            registry: RunningRegistry::new(),
            broadcaster,
            supervisor,
            sync,
            shutdown,
        }
    }
}
