//! 运行时状态模块
//!
//! 管理应用状态、运行中部署注册表和事件广播

pub mod app_state;
pub mod broadcaster;
pub mod registry;

pub use app_state::AppState;
pub use broadcaster::EventBroadcaster;
pub use registry::RunningRegistry;
