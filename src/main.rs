use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use folio_api::api;
use folio_api::config::AppConfig;
use folio_api::database::PgStore;
use folio_api::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, API_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.repository_timeout)
        .connect(&config.database_url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to database: {}", e));

    sqlx::migrate!()
        .run(&pool)
        .await
        .unwrap_or_else(|e| panic!("failed to run migrations: {}", e));

    let store = Arc::new(PgStore::new(pool));
    let state = AppState::new(store, &config);
    let app = api::app(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("folio-api listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
