//! 远端 listener HTTP 投递
//!
//! 将部署事件 POST 给配置的 listener，失败按指数退避重试，
//! 重试耗尽后静默放弃（记日志）。投递永远不会反向影响 pipeline

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::deployment::ListenerEndpoint;
use crate::config::env::ListenerRetryConfig;
use crate::domain::event::DeployEvent;

/// Listener 投递客户端
///
/// 复用连接池，可被每个投递任务 clone
#[derive(Clone)]
pub struct ListenerClient {
    client: Client,
    retry: ListenerRetryConfig,
}

impl ListenerClient {
    /// 创建投递客户端
    pub fn new(retry: ListenerRetryConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, retry }
    }

    /// 投递一个事件到一个 listener，带重试
    ///
    /// 每个 (listener, event) 组合独立调用，互不阻塞
    pub async fn deliver(&self, endpoint: &ListenerEndpoint, event: &DeployEvent) {
        let body = serde_json::json!({
            "event": "deploy",
            "data": {
                "event": event.kind.as_str(),
                "repo": event.repo,
                "data": event.payload,
            }
        });

        for attempt in 1..=self.retry.max_attempts {
            match self
                .client
                .post(&endpoint.url)
                .timeout(Duration::from_secs(10))
                .json(&body)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    debug!(
                        listener = %endpoint.url,
                        repo = %event.repo,
                        kind = %event.kind.as_str(),
                        attempt = attempt,
                        "Delivered event to listener"
                    );
                    return;
                }
                Ok(resp) => {
                    warn!(
                        listener = %endpoint.url,
                        repo = %event.repo,
                        status = %resp.status(),
                        attempt = attempt,
                        "Listener returned non-success status"
                    );
                }
                Err(e) => {
                    warn!(
                        listener = %endpoint.url,
                        repo = %event.repo,
                        error = %e,
                        attempt = attempt,
                        "Failed to deliver event, will retry"
                    );
                }
            }

            if attempt < self.retry.max_attempts {
                tokio::time::sleep(delay_for(&self.retry, attempt)).await;
            }
        }

        // 重试耗尽，事件丢弃
        warn!(
            listener = %endpoint.url,
            repo = %event.repo,
            attempts = self.retry.max_attempts,
            "Giving up on listener delivery"
        );
    }
}

/// 第 attempt 次失败后的等待时间（attempt 从 1 开始）
///
/// initial * factor^(attempt-1)，封顶 max_delay
pub fn delay_for(retry: &ListenerRetryConfig, attempt: u32) -> Duration {
    let mut delay = retry.initial_delay;
    for _ in 1..attempt {
        delay = delay.saturating_mul(retry.factor);
        if delay >= retry.max_delay {
            return retry.max_delay;
        }
    }
    delay.min(retry.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_schedule() {
        let retry = ListenerRetryConfig::default();

        assert_eq!(delay_for(&retry, 1), Duration::from_millis(500));
        assert_eq!(delay_for(&retry, 2), Duration::from_millis(1500));
        assert_eq!(delay_for(&retry, 3), Duration::from_millis(4500));
        assert_eq!(delay_for(&retry, 4), Duration::from_millis(13500));
        assert_eq!(delay_for(&retry, 5), Duration::from_millis(40500));
        // 之后封顶在 max_delay
        assert_eq!(delay_for(&retry, 6), Duration::from_secs(60));
        assert_eq!(delay_for(&retry, 10), Duration::from_secs(60));
    }

    /// 启动一个本地 listener：前 failures 次返回 500，之后 200
    async fn spawn_listener(failures: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/deploy",
            post({
                let hits = hits.clone();
                move || {
                    let hits = hits.clone();
                    async move {
                        let n = hits.fetch_add(1, Ordering::SeqCst);
                        if n < failures {
                            StatusCode::INTERNAL_SERVER_ERROR
                        } else {
                            StatusCode::OK
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/deploy", addr), hits)
    }

    fn fast_retry(max_attempts: u32) -> ListenerRetryConfig {
        ListenerRetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            factor: 2,
            max_delay: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_delivery_retries_until_success() {
        let (url, hits) = spawn_listener(2).await;
        let client = ListenerClient::new(fast_retry(5));
        let endpoint = ListenerEndpoint { url };

        client.deliver(&endpoint, &DeployEvent::log("api", "hello")).await;

        // 两次 500 后第三次成功
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_delivery_gives_up_after_max_attempts() {
        let (url, hits) = spawn_listener(usize::MAX).await;
        let client = ListenerClient::new(fast_retry(3));
        let endpoint = ListenerEndpoint { url };

        client.deliver(&endpoint, &DeployEvent::log("api", "hello")).await;

        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
