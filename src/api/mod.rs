//! API 模块
//!
//! HTTP handlers 和路由组装

pub mod events;
pub mod status;
pub mod trigger;
pub mod webhook;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// 构建完整的 API 路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health & Status
        .merge(status::router())
        // Push intake
        .merge(webhook::router())
        // Manual trigger
        .merge(trigger::router())
        // Realtime subscription
        .merge(events::router())
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
