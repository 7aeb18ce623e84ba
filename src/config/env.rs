//! 环境变量配置加载

use std::env;
use std::time::Duration;

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// API 密钥（手动触发接口用）
    pub api_key: String,
    /// 服务监听端口
    pub port: u16,
    /// 部署目录配置文件路径
    pub config_path: String,
    /// 各阻塞步骤的超时配置
    pub timeouts: StepTimeouts,
    /// 远端 listener 投递重试策略
    pub retry: ListenerRetryConfig,
}

/// 阻塞步骤超时配置
///
/// 外部操作挂死时按该步骤的失败条件处理，进入 Finalize
#[derive(Clone, Copy, Debug)]
pub struct StepTimeouts {
    /// 进程管理器命令（查询/启动/重启）
    pub supervisor: Duration,
    /// fetch + merge
    pub sync: Duration,
    /// 单条部署钩子
    pub hook: Duration,
}

/// Listener 投递重试策略
///
/// 每次失败后延迟乘以 factor，封顶 max_delay，超过 max_attempts 放弃
#[derive(Clone, Copy, Debug)]
pub struct ListenerRetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
}

impl Default for ListenerRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            factor: 3,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let api_key = env::var("DEPLOY_AGENT_API_KEY")
            .unwrap_or_else(|_| "change-me-in-production".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9876);

        let config_path =
            env::var("DEPLOY_CONFIG_PATH").unwrap_or_else(|_| "config.json".to_string());

        let timeouts = StepTimeouts {
            supervisor: duration_from_env("SUPERVISOR_TIMEOUT_SECS", 60),
            sync: duration_from_env("SYNC_TIMEOUT_SECS", 600),
            hook: duration_from_env("HOOK_TIMEOUT_SECS", constants::HOOK_TIMEOUT_SECS),
        };

        let defaults = ListenerRetryConfig::default();
        let retry = ListenerRetryConfig {
            max_attempts: parse_from_env("LISTENER_MAX_ATTEMPTS", defaults.max_attempts),
            initial_delay: Duration::from_millis(parse_from_env(
                "LISTENER_INITIAL_DELAY_MS",
                defaults.initial_delay.as_millis() as u64,
            )),
            factor: parse_from_env("LISTENER_BACKOFF_FACTOR", defaults.factor),
            max_delay: duration_from_env("LISTENER_MAX_DELAY_SECS", 60),
        };

        Self {
            api_key,
            port,
            config_path,
            timeouts,
            retry,
        }
    }
}

/// 解析环境变量中的秒数，缺失或非法时回退到默认值
fn duration_from_env(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(parse_from_env(key, default_secs))
}

fn parse_from_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// 常量
pub mod constants {
    /// 单条钩子超时（秒）
    pub const HOOK_TIMEOUT_SECS: u64 = 1800; // 30 分钟

    /// 事件广播通道容量
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_env_fallback() {
        env::remove_var("TEST_MISSING_KEY");
        assert_eq!(parse_from_env("TEST_MISSING_KEY", 42u64), 42);

        env::set_var("TEST_PRESENT_KEY", "7");
        assert_eq!(parse_from_env("TEST_PRESENT_KEY", 42u64), 7);

        env::set_var("TEST_GARBAGE_KEY", "not-a-number");
        assert_eq!(parse_from_env("TEST_GARBAGE_KEY", 42u64), 42);

        env::remove_var("TEST_PRESENT_KEY");
        env::remove_var("TEST_GARBAGE_KEY");
    }

    #[test]
    fn test_retry_defaults() {
        let retry = ListenerRetryConfig::default();
        assert_eq!(retry.max_attempts, 10);
        assert_eq!(retry.factor, 3);
        assert_eq!(retry.initial_delay, Duration::from_millis(500));
    }
}
