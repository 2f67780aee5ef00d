use std::sync::Arc;

use crate::auth::config::AuthConfig;
use crate::engine::connection_registry::ConnectionRegistry;
use crate::engine::directory::RoomDirectory;

/// Shared state for all HTTP and WebSocket handlers.
pub struct AppState {
    pub directory: Arc<RoomDirectory>,
    pub registry: Arc<ConnectionRegistry>,
    pub auth_config: AuthConfig,
}
