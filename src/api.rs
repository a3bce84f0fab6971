//! HTTP API for the gateway
//!
//! Receives chat platform webhooks and exposes liveness endpoints.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::channel::RecentMessageIds;
use crate::runtime::SenderQueues;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub queues: SenderQueues,
    pub recent: Arc<RecentMessageIds>,
    pub verify_token: String,
    /// Key for webhook body signatures
    pub app_secret: String,
    pub app_name: String,
    pub client_id: String,
}
