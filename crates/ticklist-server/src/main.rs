mod auth;
mod config;
mod error;
mod push;
mod routes;
mod scheduler;

use std::sync::Arc;

use config::AppConfig;
use push::{HttpPushTransport, NotificationDispatcher};
use routes::{app_router, AppState};
use scheduler::ReminderScheduler;
use ticklist_core::db::{Database, SubscriptionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ticklist_server=info".parse().expect("valid directive"))
                .add_directive("ticklist_core=info".parse().expect("valid directive")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting ticklist-server with config: {:?}", config);

    let database = Database::open(&config.db_path).await?;
    let transport = Arc::new(HttpPushTransport::new(
        config.push_timeout,
        config.push_ttl_secs,
    )?);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        SubscriptionStore::new(database.connection().clone()),
        transport,
    ));

    let state = AppState::new(config.clone(), &database, dispatcher.clone());

    let scheduler = ReminderScheduler::new(
        state.snapshots(),
        dispatcher,
        config.scan_interval,
        config.reminder_window,
    );
    tokio::spawn(scheduler.run());

    let bind_addr = config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("ticklist-server listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
