//! 部署事件模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 事件类型
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// 部署过程中的一行日志
    DeployLog,
    /// 生命周期状态变化
    Status,
    /// 部署失败详情
    Error,
}

impl EventKind {
    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DeployLog => "deploy-log",
            EventKind::Status => "status",
            EventKind::Error => "error",
        }
    }
}

/// 部署事件
///
/// pipeline 每次状态迁移都会产生一个事件，经 broadcaster 分发给
/// 本地订阅者和远端 listener，从不落盘
#[derive(Clone, Debug, Serialize)]
pub struct DeployEvent {
    pub kind: EventKind,
    pub repo: String,
    pub payload: Value,
    pub at: DateTime<Utc>,
}

impl DeployEvent {
    /// 创建新事件
    pub fn new(kind: EventKind, repo: impl Into<String>, payload: Value) -> Self {
        Self {
            kind,
            repo: repo.into(),
            payload,
            at: Utc::now(),
        }
    }

    /// 创建 deploy-log 事件
    pub fn log(repo: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EventKind::DeployLog, repo, Value::String(message.into()))
    }
}

/// 日志行
///
/// 钩子命令输出的流式单位，stream 为 stdout | stderr
#[derive(Clone, Debug, Serialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub stream: String,
    pub content: String,
}

impl LogLine {
    /// 创建新日志行
    pub fn new(stream: &str, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream: stream.to_string(),
            content: content.into(),
        }
    }

    /// 创建 stdout 日志行
    pub fn stdout(content: impl Into<String>) -> Self {
        Self::new("stdout", content)
    }

    /// 创建 stderr 日志行
    pub fn stderr(content: impl Into<String>) -> Self {
        Self::new("stderr", content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_as_str() {
        assert_eq!(EventKind::DeployLog.as_str(), "deploy-log");
        assert_eq!(EventKind::Status.as_str(), "status");
        assert_eq!(EventKind::Error.as_str(), "error");
    }

    #[test]
    fn test_event_kind_serde_matches_as_str() {
        for kind in [EventKind::DeployLog, EventKind::Status, EventKind::Error] {
            let serialized = serde_json::to_value(kind).unwrap();
            assert_eq!(serialized, json!(kind.as_str()));
        }
    }

    #[test]
    fn test_log_event_payload() {
        let event = DeployEvent::log("api", "pulling...");
        assert_eq!(event.kind, EventKind::DeployLog);
        assert_eq!(event.repo, "api");
        assert_eq!(event.payload, json!("pulling..."));
    }

    #[test]
    fn test_log_line_creation() {
        let line = LogLine::stdout("Hello");
        assert_eq!(line.stream, "stdout");
        assert_eq!(line.content, "Hello");

        let line = LogLine::stderr("Error");
        assert_eq!(line.stream, "stderr");
        assert_eq!(line.content, "Error");
    }
}
