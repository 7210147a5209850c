use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use user_gate::config::AppConfig;
use user_gate::db::InMemoryUserStore;
use user_gate::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_gate=info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let state = AppState::from_config(Arc::new(InMemoryUserStore::new()), &config)
        .context("failed to initialise token service")?;
    let state = web::Data::new(state);

    let origins = config.cors_allowed_origins.clone();
    let addr = config.addr();
    info!(
        "Listening on: {} (token backend: {:?}, ttl: {}h)",
        addr,
        config.token_backend,
        config.token_ttl.num_hours()
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(user_gate::cors(&origins))
            .wrap(Logger::default())
            .configure(user_gate::configure)
    })
    .bind(&addr)?
    .run()
    .await?;

    Ok(())
}
