//! Application state management

use crate::auth::{AuthService, MemoryUserRepository, UserRepository};
use keyhold_core::AppConfig;
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Registration, login and token lifecycle
    pub auth: AuthService,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create application state over the given credential store
    pub fn new(config: AppConfig, users: Arc<dyn UserRepository>) -> Self {
        let auth = AuthService::new(users, &config.auth);
        Self {
            config,
            auth,
            start_time: Instant::now(),
        }
    }

    /// Create application state backed by an in-memory store
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Arc::new(MemoryUserRepository::new()))
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory(AppConfig::default())
    }
}
