use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use std::sync::Arc;

mod api;
mod attendance;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::routes::RateLimiters;
use crate::service::AttendanceService;
use crate::store::mysql::MySqlAttendanceStore;
use crate::utils::email_index::EmailIndex;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config).await?;
    info!("Database ready, migrations applied");

    let service = Data::new(
        AttendanceService::new(
            Arc::new(MySqlAttendanceStore::new(pool.clone())),
            config.max_bulk_items,
        )
        .with_max_summary_buckets(config.max_summary_buckets),
    );
    let email_index = Data::new(EmailIndex::default());
    let limiters = RateLimiters::from_config(&config)?;

    let pool_for_warmup = pool.clone();
    let index_for_warmup = email_index.clone();
    actix_web::rt::spawn(async move {
        // every email into the filter, last 30 days of logins into the cache, batches of 250
        if let Err(e) = index_for_warmup.warmup(&pool_for_warmup, 30, 250).await {
            error!(error = %e, "Failed to warm up email index");
        }
    });

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(service.clone())
            .app_data(email_index.clone())
            .app_data(routes::json_config())
            .app_data(routes::query_config())
            .app_data(routes::path_config())
            // auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config, limiters.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
