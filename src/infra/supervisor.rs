//! 进程管理器适配层
//!
//! pipeline 只依赖 `ProcessSupervisor` trait；生产实现 `Pm2Supervisor`
//! 通过 pm2 CLI 查询和操作被托管进程

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::deployment::DeploymentDefinition;
use crate::infra::command::CommandRunner;

/// 进程管理器错误
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to run pm2 {command}: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("pm2 {command} exited with status {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("invalid pm2 output: {0}")]
    InvalidOutput(#[from] serde_json::Error),
}

/// 被托管进程句柄
///
/// 进程归管理器所有，这里只保留名字和存活状态
#[derive(Clone, Debug)]
pub struct ManagedProcess {
    pub name: String,
    pub status: String,
}

/// 进程管理器能力
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// 列出所有被托管进程
    async fn list(&self) -> Result<Vec<ManagedProcess>, SupervisorError>;

    /// 按名字查找进程
    async fn find(&self, name: &str) -> Result<Option<ManagedProcess>, SupervisorError> {
        let processes = self.list().await?;
        Ok(processes.into_iter().find(|p| p.name == name))
    }

    /// 按部署定义启动进程
    async fn start(&self, definition: &DeploymentDefinition) -> Result<(), SupervisorError>;

    /// 重启进程
    async fn restart(&self, name: &str) -> Result<(), SupervisorError>;
}

/// pm2 CLI 实现
pub struct Pm2Supervisor {
    timeout: Duration,
}

impl Pm2Supervisor {
    /// 创建 pm2 适配器
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 执行 pm2 子命令并校验退出状态
    async fn run_pm2(&self, args: &[&str]) -> Result<std::process::Output, SupervisorError> {
        let command = args.join(" ");
        let output = CommandRunner::run_simple("pm2", args, Path::new("."), self.timeout)
            .await
            .map_err(|e| SupervisorError::CommandFailed {
                command: command.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SupervisorError::NonZeroExit {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl ProcessSupervisor for Pm2Supervisor {
    async fn list(&self) -> Result<Vec<ManagedProcess>, SupervisorError> {
        let output = self.run_pm2(&["jlist"]).await?;
        parse_jlist(&String::from_utf8_lossy(&output.stdout))
    }

    async fn start(&self, definition: &DeploymentDefinition) -> Result<(), SupervisorError> {
        let script = format!("{}/{}", definition.path, definition.main);
        let mut args: Vec<String> = vec![
            "start".to_string(),
            script,
            "--name".to_string(),
            definition.name.clone(),
            "--cwd".to_string(),
            definition.path.clone(),
        ];

        let overrides = &definition.pm2;
        if let Some(ref mode) = overrides.exec_mode {
            if mode == "cluster" {
                args.push("-i".to_string());
                args.push(overrides.instances.unwrap_or(1).to_string());
            }
        }
        if let Some(ref interpreter) = overrides.interpreter {
            args.push("--interpreter".to_string());
            args.push(interpreter.clone());
        }
        if !overrides.args.is_empty() {
            args.push("--".to_string());
            args.extend(overrides.args.iter().cloned());
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_pm2(&arg_refs).await?;

        tracing::info!(repo = %definition.name, "Started managed process");
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<(), SupervisorError> {
        self.run_pm2(&["restart", name]).await?;
        tracing::info!(process = %name, "Restarted managed process");
        Ok(())
    }
}

/// pm2 jlist 输出中每个进程的字段（只取用到的）
#[derive(Debug, Deserialize)]
struct JlistEntry {
    name: String,
    pm2_env: JlistEnv,
}

#[derive(Debug, Deserialize)]
struct JlistEnv {
    status: String,
}

/// 解析 pm2 jlist 的 JSON 输出
fn parse_jlist(raw: &str) -> Result<Vec<ManagedProcess>, SupervisorError> {
    let entries: Vec<JlistEntry> = serde_json::from_str(raw.trim())?;
    Ok(entries
        .into_iter()
        .map(|e| ManagedProcess {
            name: e.name,
            status: e.pm2_env.status,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const JLIST_SAMPLE: &str = r#"[
        { "name": "api", "pm_id": 0, "pm2_env": { "status": "online", "exec_mode": "fork_mode" } },
        { "name": "worker", "pm_id": 1, "pm2_env": { "status": "stopped", "exec_mode": "cluster_mode" } }
    ]"#;

    #[test]
    fn test_parse_jlist() {
        let processes = parse_jlist(JLIST_SAMPLE).unwrap();
        assert_eq!(processes.len(), 2);
        assert_eq!(processes[0].name, "api");
        assert_eq!(processes[0].status, "online");
        assert_eq!(processes[1].name, "worker");
        assert_eq!(processes[1].status, "stopped");
    }

    #[test]
    fn test_parse_jlist_empty() {
        let processes = parse_jlist("[]").unwrap();
        assert!(processes.is_empty());
    }

    #[test]
    fn test_parse_jlist_garbage() {
        let result = parse_jlist("not json at all");
        assert!(matches!(result, Err(SupervisorError::InvalidOutput(_))));
    }
}
