//! Test app state builder for HTTP-level testing.
//!
//! `TestAppStateBuilder` creates an `AppState` backed by `InMemoryAuthStore`
//! and a `ManualClock`, or by no store at all.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    infra::config::{AppConfig, RuntimeEnv},
    test_utils::{InMemoryAuthStore, ManualClock},
    use_cases::auth::{AuthUseCases, MagicLinkSettings},
};

pub const TEST_NOW: &str = "2026-03-01T12:00:00Z";

/// Dev-mode settings with the default 15 minute TTL.
pub fn test_settings() -> MagicLinkSettings {
    MagicLinkSettings {
        ttl: chrono::Duration::minutes(15),
        base_url: Url::parse("http://localhost:3000/auth/verify").unwrap(),
        expose_dev_link: true,
        request_timeout: StdDuration::from_secs(5),
    }
}

pub fn test_config(env: RuntimeEnv) -> AppConfig {
    let env = match env {
        RuntimeEnv::Dev => "dev",
        RuntimeEnv::Production => "prod",
    };
    AppConfig::from_lookup(|key| (key == "ENV").then(|| env.to_string())).unwrap()
}

pub struct TestAppStateBuilder {
    env: RuntimeEnv,
    with_store: bool,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            env: RuntimeEnv::Dev,
            with_store: true,
        }
    }

    pub fn production(mut self) -> Self {
        self.env = RuntimeEnv::Production;
        self
    }

    /// Behave as if DATABASE_URL were unset.
    pub fn without_store(mut self) -> Self {
        self.with_store = false;
        self
    }

    pub fn build(self) -> AppState {
        let with_store = self.with_store;
        let (app_state, _store, _clock) = self.assemble(with_store);
        app_state
    }

    /// Returns (AppState, Arc<InMemoryAuthStore>, Arc<ManualClock>) for test assertions.
    pub fn build_with_store(self) -> (AppState, Arc<InMemoryAuthStore>, Arc<ManualClock>) {
        self.assemble(true)
    }

    fn assemble(self, with_store: bool) -> (AppState, Arc<InMemoryAuthStore>, Arc<ManualClock>) {
        let config = test_config(self.env);
        let store = Arc::new(InMemoryAuthStore::new());
        let clock = Arc::new(ManualClock::at(TEST_NOW));

        let auth_use_cases = AuthUseCases::new(
            with_store.then(|| store.as_auth_store()),
            clock.clone(),
            config.magic_link_settings(),
        );

        let app_state = AppState {
            config: Arc::new(config),
            auth_use_cases: Arc::new(auth_use_cases),
        };
        (app_state, store, clock)
    }
}
