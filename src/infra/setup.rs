use crate::{
    adapters::http::app_state::AppState,
    application::clock::SystemClock,
    infra::{InfraError, config::AppConfig, postgres_persistence},
    use_cases::auth::{AuthStore, AuthUseCases},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> Result<AppState, InfraError> {
    let config = AppConfig::from_env()?;

    let store = match &config.database_url {
        Some(database_url) => {
            let postgres_arc = Arc::new(
                postgres_persistence(
                    database_url,
                    config.database_max_connections,
                    config.request_timeout,
                )
                .await?,
            );
            Some(AuthStore {
                users: postgres_arc.clone(),
                magic_links: postgres_arc,
            })
        }
        None => {
            warn!("DATABASE_URL not set; starting without database");
            None
        }
    };

    let auth_use_cases = AuthUseCases::new(
        store,
        Arc::new(SystemClock),
        config.magic_link_settings(),
    );

    info!(
        env = ?config.env,
        ttl_minutes = config.magic_link_ttl.num_minutes(),
        "auth configured"
    );

    Ok(AppState {
        config: Arc::new(config),
        auth_use_cases: Arc::new(auth_use_cases),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "amiglot_api=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        // Structured JSON lines for log shipping
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
            .ok();
    } else {
        // Console (pretty logs)
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false) // don't show target (module path)
                    .with_level(true)
                    .pretty(),
            )
            .try_init()
            .ok();
    }
}
