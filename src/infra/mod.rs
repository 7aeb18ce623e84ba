//! 基础设施模块
//!
//! 封装外部依赖（进程管理器、git、HTTP client、命令执行）

pub mod command;
pub mod git;
pub mod listener;
pub mod supervisor;

pub use command::CommandRunner;
pub use git::{GitCli, RepoSync};
pub use listener::ListenerClient;
pub use supervisor::{Pm2Supervisor, ProcessSupervisor};
