//! Push Deploy Agent - 推送触发的部署代理
//!
//! Usage:
//! - `push-deploy-agent`                   # 默认读取 ./config.json
//! - `DEPLOY_CONFIG_PATH=/etc/deploy.json push-deploy-agent`
//! - `PORT=9876 push-deploy-agent`

use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    if let Err(e) = rt.block_on(push_deploy_agent::run()) {
        tracing::error!(error = %e, "Agent failed to start");
        std::process::exit(1);
    }
}
