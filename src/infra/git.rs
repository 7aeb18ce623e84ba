//! 仓库同步适配层
//!
//! pipeline 只依赖 `RepoSync` trait；生产实现 `GitCli` 在工作副本目录
//! 调用 git CLI 完成 fetch 与 merge

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::infra::command::CommandRunner;

/// 仓库同步错误
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to run git {command}: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("git {command} exited with status {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("git {command} timed out")]
    TimedOut { command: String },
}

/// 仓库同步能力
///
/// fetch 与 merge 分开暴露：fetch 失败时不应该尝试 merge
#[async_trait]
pub trait RepoSync: Send + Sync {
    /// 抓取所有 remote
    async fn fetch_all(&self, path: &Path) -> Result<(), SyncError>;

    /// 将远端跟踪分支合并进本地分支
    async fn merge_branches(&self, path: &Path, local: &str, remote: &str)
        -> Result<(), SyncError>;
}

/// git CLI 实现
pub struct GitCli {
    timeout: Duration,
}

impl GitCli {
    /// 创建 git 适配器
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 执行 git 子命令并校验退出状态
    async fn run_git(&self, args: &[&str], path: &Path) -> Result<(), SyncError> {
        let command = args.join(" ");
        let output = CommandRunner::run_simple("git", args, path, self.timeout)
            .await
            .map_err(|e| match e {
                crate::infra::command::CommandError::Timeout => SyncError::TimedOut {
                    command: command.clone(),
                },
                other => SyncError::CommandFailed {
                    command: command.clone(),
                    detail: other.to_string(),
                },
            })?;

        if !output.status.success() {
            return Err(SyncError::NonZeroExit {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RepoSync for GitCli {
    async fn fetch_all(&self, path: &Path) -> Result<(), SyncError> {
        self.run_git(&["fetch", "--all", "--prune"], path).await
    }

    async fn merge_branches(
        &self,
        path: &Path,
        local: &str,
        remote: &str,
    ) -> Result<(), SyncError> {
        // 工作副本应已检出 local 分支；merge 在其上进行
        self.run_git(&["checkout", local], path).await?;
        self.run_git(&["merge", remote], path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_outside_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new(Duration::from_secs(10));

        // 普通目录不是 git 仓库，fetch 必须报非零退出
        let result = git.fetch_all(dir.path()).await;
        assert!(matches!(result, Err(SyncError::NonZeroExit { .. })));
    }

    #[tokio::test]
    async fn test_missing_work_dir_fails_at_spawn() {
        let git = GitCli::new(Duration::from_secs(10));

        let result = git.fetch_all(Path::new("/nonexistent/repo/path")).await;
        assert!(matches!(result, Err(SyncError::CommandFailed { .. })));
    }

    #[test]
    fn test_error_display_names_command() {
        let err = SyncError::NonZeroExit {
            command: "merge origin/main".to_string(),
            code: 1,
            stderr: "CONFLICT".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("merge origin/main"));
        assert!(message.contains("CONFLICT"));
    }
}
