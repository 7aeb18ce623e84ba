//! 事件广播
//!
//! 每个部署事件同时走两条路：本地 broadcast 通道（SSE 订阅者）和
//! 远端 listener 投递任务。两条路都是尽力而为，互不影响，
//! 也不影响 pipeline 本身

use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use crate::config::deployment::ListenerEndpoint;
use crate::config::env::constants::EVENT_CHANNEL_CAPACITY;
use crate::config::env::ListenerRetryConfig;
use crate::domain::deploy::DeployState;
use crate::domain::event::{DeployEvent, EventKind};
use crate::infra::listener::ListenerClient;

/// 事件广播器
///
/// 进程级部署状态也归它所有：只有 status 事件会更新，
/// 状态查询接口通过 `current_state` 读取
pub struct EventBroadcaster {
    local: broadcast::Sender<DeployEvent>,
    listeners: Vec<ListenerEndpoint>,
    client: ListenerClient,
    state: RwLock<DeployState>,
}

impl EventBroadcaster {
    /// 创建广播器
    pub fn new(listeners: Vec<ListenerEndpoint>, retry: ListenerRetryConfig) -> Self {
        let (local, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            local,
            listeners,
            client: ListenerClient::new(retry),
            state: RwLock::new(DeployState::Idle),
        }
    }

    /// 订阅本地事件流
    ///
    /// 订阅前发布的事件不会回放
    pub fn subscribe(&self) -> broadcast::Receiver<DeployEvent> {
        self.local.subscribe()
    }

    /// 当前进程级部署状态
    pub async fn current_state(&self) -> DeployState {
        *self.state.read().await
    }

    /// 发布一个事件
    ///
    /// 本地投递立即完成；远端投递每个 listener 一个独立任务，
    /// 某个 listener 的退避不会拖慢其它 listener 或后续事件
    pub async fn publish(&self, event: DeployEvent) {
        if event.kind == EventKind::Status {
            self.apply_status(&event.payload).await;
        }

        // 没有订阅者时 send 返回 Err，忽略即可
        let _ = self.local.send(event.clone());

        for endpoint in &self.listeners {
            let client = self.client.clone();
            let endpoint = endpoint.clone();
            let event = event.clone();
            tokio::spawn(async move {
                client.deliver(&endpoint, &event).await;
            });
        }
    }

    /// 根据 status 事件的 payload 更新进程级状态
    ///
    /// 只认 inprogress 字段；busy 之类的信息性 status 不改状态
    async fn apply_status(&self, payload: &Value) {
        let Some(inprogress) = payload.get("inprogress").and_then(Value::as_bool) else {
            return;
        };
        let mut state = self.state.write().await;
        *state = if inprogress {
            DeployState::Running
        } else {
            DeployState::Idle
        };
    }
}
