//! Application state management

use std::sync::Arc;

use crate::auth::{AuthService, SessionStore, UserRepository};
use crate::prediction::ModelContext;

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    /// Trained once before the listener binds; read-only afterwards
    pub context: Arc<ModelContext>,
    pub auth: AuthService,
    pub sessions: Arc<SessionStore>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig, context: Arc<ModelContext>, users: Arc<dyn UserRepository>) -> Self {
        let sessions = Arc::new(SessionStore::new(config.secure_cookies));
        Self {
            config,
            context,
            auth: AuthService::new(users),
            sessions,
            started_at: chrono::Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}
