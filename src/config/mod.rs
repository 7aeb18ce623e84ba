//! 配置模块
//!
//! 环境变量解析与部署目录加载

pub mod env;
pub mod deployment;

pub use deployment::{DeployConfig, DeploymentDefinition, ListenerEndpoint};
pub use env::EnvConfig;
