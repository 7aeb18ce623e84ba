//! 部署目录配置
//!
//! 启动时从 JSON 文件加载一次，之后只读。
//! 文件结构沿用部署中心下发的格式：部署列表、全局钩子、listener 地址、默认分支

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("deployment '{0}' has no branch and no global branch is set")]
    MissingBranch(String),

    #[error("duplicate deployment name '{0}'")]
    DuplicateDeployment(String),
}

/// 进程管理器覆盖项
///
/// 启动被托管进程时附加到默认参数上
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Pm2Overrides {
    /// 执行模式（默认 fork）
    pub exec_mode: Option<String>,
    /// 实例数（cluster 模式）
    pub instances: Option<u32>,
    /// 解释器（如 python3）
    pub interpreter: Option<String>,
    /// 传给进程本身的额外参数
    #[serde(default)]
    pub args: Vec<String>,
}

/// 单个部署定义
///
/// 配置加载后不可变，仓库名即唯一键
#[derive(Clone, Debug)]
pub struct DeploymentDefinition {
    /// 仓库名，同时是被托管进程的名字
    pub name: String,
    /// 工作副本路径
    pub path: String,
    /// 进程入口脚本（相对于 path）
    pub main: String,
    /// 部署分支，push 到其它分支的事件会被拒绝
    pub branch: String,
    /// 进程管理器覆盖项
    pub pm2: Pm2Overrides,
    /// 同步完成后执行的钩子命令
    pub post_deploy: Vec<String>,
}

/// 远端事件 listener 地址
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ListenerEndpoint {
    pub url: String,
}

/// 配置文件原始结构
#[derive(Debug, Deserialize)]
struct DeployConfigFile {
    /// 全局默认分支，部署未指定 branch 时使用
    branch: Option<String>,
    #[serde(default)]
    deployments: Vec<DeploymentEntry>,
    /// 所有部署共用的钩子，追加在各自钩子之后
    #[serde(default)]
    post_deploy: Vec<String>,
    #[serde(default)]
    listeners: Vec<ListenerEndpoint>,
}

#[derive(Debug, Deserialize)]
struct DeploymentEntry {
    name: String,
    path: String,
    main: String,
    branch: Option<String>,
    #[serde(default)]
    pm2: Pm2Overrides,
    #[serde(default)]
    post_deploy: Vec<String>,
}

/// 部署目录
///
/// repo 名到部署定义的只读映射，外加全局钩子与 listener 列表
#[derive(Debug)]
pub struct DeployConfig {
    deployments: HashMap<String, DeploymentDefinition>,
    global_post_deploy: Vec<String>,
    listeners: Vec<ListenerEndpoint>,
    expected_branch: String,
}

impl DeployConfig {
    /// 从 JSON 文件加载配置
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// 从 JSON 字符串加载配置
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let file: DeployConfigFile = serde_json::from_str(raw)?;
        Self::from_file(file)
    }

    fn from_file(file: DeployConfigFile) -> Result<Self, ConfigError> {
        let global_branch = file.branch;

        let mut deployments = HashMap::new();
        for entry in file.deployments {
            // 单个部署可以省略 branch，回退到全局分支；两者都没有则拒绝加载
            let branch = match entry.branch.or_else(|| global_branch.clone()) {
                Some(branch) if !branch.is_empty() => branch,
                _ => return Err(ConfigError::MissingBranch(entry.name)),
            };

            let definition = DeploymentDefinition {
                name: entry.name.clone(),
                path: entry.path,
                main: entry.main,
                branch,
                pm2: entry.pm2,
                post_deploy: entry.post_deploy,
            };
            if deployments.insert(entry.name.clone(), definition).is_some() {
                return Err(ConfigError::DuplicateDeployment(entry.name));
            }
        }

        Ok(Self {
            deployments,
            global_post_deploy: file.post_deploy,
            listeners: file.listeners,
            expected_branch: global_branch.unwrap_or_else(|| "main".to_string()),
        })
    }

    /// 查找部署定义，未配置的仓库返回 None
    pub fn definition_for(&self, repo: &str) -> Option<&DeploymentDefinition> {
        self.deployments.get(repo)
    }

    /// 遍历所有部署定义
    pub fn definitions(&self) -> impl Iterator<Item = &DeploymentDefinition> {
        self.deployments.values()
    }

    /// 配置的仓库名列表（排序后）
    pub fn repo_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.deployments.keys().cloned().collect();
        names.sort();
        names
    }

    /// 部署数量
    pub fn deployment_count(&self) -> usize {
        self.deployments.len()
    }

    /// 全局钩子命令
    pub fn global_post_deploy(&self) -> &[String] {
        &self.global_post_deploy
    }

    /// 远端 listener 地址
    pub fn listeners(&self) -> &[ListenerEndpoint] {
        &self.listeners
    }

    /// 全局默认分支
    pub fn expected_branch(&self) -> &str {
        &self.expected_branch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "branch": "main",
        "deployments": [
            {
                "name": "api",
                "path": "/srv/api",
                "main": "server.js",
                "post_deploy": ["npm install --production"]
            },
            {
                "name": "worker",
                "path": "/srv/worker",
                "main": "worker.js",
                "branch": "production",
                "pm2": { "instances": 2, "exec_mode": "cluster" }
            }
        ],
        "post_deploy": ["./notify.sh"],
        "listeners": [{ "url": "http://hooks.internal:9000/deploy" }]
    }"#;

    fn load_sample() -> DeployConfig {
        DeployConfig::from_json(SAMPLE).unwrap()
    }

    #[test]
    fn test_load_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(SAMPLE.as_bytes()).unwrap();

        let config = DeployConfig::load(tmp.path()).unwrap();
        assert_eq!(config.deployment_count(), 2);
        assert_eq!(config.expected_branch(), "main");
    }

    #[test]
    fn test_missing_file() {
        let result = DeployConfig::load(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_branch_fallback() {
        let config = load_sample();

        // api 未指定 branch，继承全局
        assert_eq!(config.definition_for("api").unwrap().branch, "main");
        // worker 自己指定了 production
        assert_eq!(config.definition_for("worker").unwrap().branch, "production");
    }

    #[test]
    fn test_definition_lookup() {
        let config = load_sample();

        assert!(config.definition_for("api").is_some());
        assert!(config.definition_for("unknown").is_none());

        let worker = config.definition_for("worker").unwrap();
        assert_eq!(worker.pm2.instances, Some(2));
        assert_eq!(worker.pm2.exec_mode.as_deref(), Some("cluster"));
    }

    #[test]
    fn test_global_hooks_and_listeners() {
        let config = load_sample();

        assert_eq!(config.global_post_deploy(), &["./notify.sh".to_string()]);
        assert_eq!(config.listeners().len(), 1);
        assert_eq!(config.listeners()[0].url, "http://hooks.internal:9000/deploy");
    }

    #[test]
    fn test_duplicate_deployment_rejected() {
        let raw = r#"{
            "branch": "main",
            "deployments": [
                { "name": "api", "path": "/a", "main": "a.js" },
                { "name": "api", "path": "/b", "main": "b.js" }
            ]
        }"#;
        let result = DeployConfig::from_json(raw);
        assert!(matches!(result, Err(ConfigError::DuplicateDeployment(name)) if name == "api"));
    }

    #[test]
    fn test_missing_branch_rejected() {
        let raw = r#"{
            "deployments": [
                { "name": "api", "path": "/a", "main": "a.js" }
            ]
        }"#;
        let result = DeployConfig::from_json(raw);
        assert!(matches!(result, Err(ConfigError::MissingBranch(name)) if name == "api"));
    }

    #[test]
    fn test_repo_names_sorted() {
        let config = load_sample();
        assert_eq!(config.repo_names(), vec!["api".to_string(), "worker".to_string()]);
    }
}
