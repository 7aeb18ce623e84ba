//! 部署相关领域模型

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// 一次 push 通知
///
/// 由 webhook/trigger handler 构造，被 pipeline 消费一次后丢弃
#[derive(Clone, Debug)]
pub struct PushEvent {
    /// 仓库名
    pub repo: String,
    /// 完整引用（如 refs/heads/main）
    pub git_ref: String,
    /// 原始 payload，pipeline 不解析
    pub payload: Value,
}

impl PushEvent {
    /// 创建 push 事件
    pub fn new(repo: impl Into<String>, git_ref: impl Into<String>, payload: Value) -> Self {
        Self {
            repo: repo.into(),
            git_ref: git_ref.into(),
            payload,
        }
    }

    /// 从引用中提取分支名
    ///
    /// 非 refs/heads/ 前缀的引用原样返回
    pub fn branch(&self) -> &str {
        self.git_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.git_ref)
    }
}

/// 运行中的部署记录
///
/// 由 registry 独占管理：admit 时创建，Finalize 时销毁
#[derive(Clone, Debug, Serialize)]
pub struct RunningDeployment {
    pub repo: String,
    pub run_id: Uuid,
    pub status: &'static str,
    pub started_at: DateTime<Utc>,
}

impl RunningDeployment {
    /// 创建新记录
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            run_id: Uuid::new_v4(),
            status: "running",
            started_at: Utc::now(),
        }
    }
}

/// 进程级部署状态
///
/// 只随 status 事件更新，状态查询接口读取；读者容忍短暂滞后
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployState {
    Idle,
    Running,
}

impl DeployState {
    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployState::Idle => "idle",
            DeployState::Running => "running",
        }
    }
}
