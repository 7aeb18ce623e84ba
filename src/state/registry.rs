//! 运行中部署注册表
//!
//! 同一仓库同一时刻最多一个在途部署。检查与插入在同一把写锁内完成，
//! 并发 push 不可能对同一工作副本跑出两个 sync/restart

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

use crate::domain::deploy::RunningDeployment;

/// 运行中部署注册表
///
/// 注册表内容在任意时刻都等于「已被准入、尚未终结」的仓库集合
pub struct RunningRegistry {
    records: RwLock<HashMap<String, RunningDeployment>>,
}

impl RunningRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// 尝试准入一次部署
    ///
    /// 原子地检查并插入记录；该仓库已有在途部署时返回 None（拒绝准入）
    pub async fn try_admit(&self, repo: &str) -> Option<RunningDeployment> {
        let mut records = self.records.write().await;
        if records.contains_key(repo) {
            return None;
        }
        let record = RunningDeployment::new(repo);
        records.insert(repo.to_string(), record.clone());
        Some(record)
    }

    /// 释放一条记录
    ///
    /// 终结必须幂等：记录不存在时只记日志，不报错
    pub async fn release(&self, repo: &str) {
        let mut records = self.records.write().await;
        if records.remove(repo).is_none() {
            warn!(repo = %repo, "Released a deployment that was not registered");
        }
    }

    /// 仓库是否有在途部署
    pub async fn is_running(&self, repo: &str) -> bool {
        let records = self.records.read().await;
        records.contains_key(repo)
    }

    /// 当前在途部署快照（按仓库名排序）
    pub async fn snapshot(&self) -> Vec<RunningDeployment> {
        let records = self.records.read().await;
        let mut running: Vec<RunningDeployment> = records.values().cloned().collect();
        running.sort_by(|a, b| a.repo.cmp(&b.repo));
        running
    }

    /// 在途部署数量
    pub async fn count(&self) -> usize {
        let records = self.records.read().await;
        records.len()
    }
}

impl Default for RunningRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_admit_and_release() {
        let registry = RunningRegistry::new();

        let record = registry.try_admit("api").await;
        assert!(record.is_some());
        assert!(registry.is_running("api").await);

        // 在途期间第二次准入被拒绝
        assert!(registry.try_admit("api").await.is_none());

        registry.release("api").await;
        assert!(!registry.is_running("api").await);

        // 释放后可以再次准入
        assert!(registry.try_admit("api").await.is_some());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let registry = RunningRegistry::new();

        registry.try_admit("api").await.unwrap();
        registry.release("api").await;
        // 重复释放不报错、不破坏记录集
        registry.release("api").await;
        registry.release("never-admitted").await;

        assert_eq!(registry.count().await, 0);
        assert!(registry.try_admit("api").await.is_some());
    }

    #[tokio::test]
    async fn test_different_repos_are_independent() {
        let registry = RunningRegistry::new();

        assert!(registry.try_admit("api").await.is_some());
        assert!(registry.try_admit("worker").await.is_some());
        assert_eq!(registry.count().await, 2);

        registry.release("api").await;
        assert!(!registry.is_running("api").await);
        assert!(registry.is_running("worker").await);
    }

    #[tokio::test]
    async fn test_snapshot_ordered_by_repo() {
        let registry = RunningRegistry::new();

        registry.try_admit("worker").await.unwrap();
        registry.try_admit("api").await.unwrap();

        let snapshot = registry.snapshot().await;
        let names: Vec<&str> = snapshot.iter().map(|r| r.repo.as_str()).collect();
        assert_eq!(names, vec!["api", "worker"]);
    }

    #[tokio::test]
    async fn test_concurrent_admission_single_winner() {
        let registry = Arc::new(RunningRegistry::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.try_admit("api").await.is_some()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        // 只有一个任务能赢得准入
        assert_eq!(admitted, 1);
        assert_eq!(registry.count().await, 1);
    }
}
