use actix_web::{middleware, web, App, HttpServer};
use cdn_refresh_service::handlers::{self, AppState};
use cdn_refresh_service::jobs::RefreshRunner;
use cdn_refresh_service::services::{Notifier, SourceResolver, UrlProber};
use cdn_refresh_service::{metrics, models, Config};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // The kind -> (table, column) map feeds SQL identifiers; refuse to
    // start with a broken map.
    models::validate_schema_map()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Successfully connected to database");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            return Err(io::Error::new(io::ErrorKind::Other, "Database connection failed"));
        }
    };

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!("Database migration failed: {}", e);
        return Err(io::Error::new(io::ErrorKind::Other, "Migration failed"));
    }

    let to_io = |e: reqwest::Error| io::Error::new(io::ErrorKind::Other, e);
    let prober = UrlProber::new().map_err(to_io)?;
    let resolver = SourceResolver::new(&config.provider).map_err(to_io)?;
    let notifier = Notifier::new(&config.notifier).map_err(to_io)?;

    let runner = Arc::new(RefreshRunner::new(
        pool.clone(),
        prober,
        resolver,
        notifier.clone(),
        config.provider.call_budget,
    ));

    let state = AppState {
        pool,
        runner,
        notifier,
        trigger_secret: config.refresh.trigger_secret.clone(),
        admin_sender_id: config.refresh.admin_sender_id,
    };

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(
        budget_ceiling = config.provider.call_budget,
        "Starting CDN refresh service on {}",
        bind_address
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(handlers::health))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(handlers::register)
    })
    .bind(&bind_address)?
    .run()
    .await
}
