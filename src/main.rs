use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use std::sync::Arc;
use std::time::Duration;

use hrm_attendance::config::StorageBackend;
use hrm_attendance::db::{init_db, run_migrations};
use hrm_attendance::docs::ApiDoc;
use hrm_attendance::routes::{self, RateLimiters};
use hrm_attendance::store::{MemoryStore, MySqlStore, Store};
use hrm_attendance::utils::tag_cache::TagCache;
use hrm_attendance::Config;

use tracing::{error, info, warn};
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

    info!(addr = %config.server_addr, storage = ?config.storage, "Server starting...");

    let store: Arc<dyn Store> = match config.storage {
        StorageBackend::MySql => {
            let pool = init_db(&config.database_url, config.db_max_connections).await?;
            run_migrations(&pool).await?;
            Arc::new(MySqlStore::new(pool))
        }
        StorageBackend::Memory => {
            warn!("STORAGE=memory: data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let tag_cache = TagCache::new(Duration::from_secs(config.tag_cache_ttl_secs));
    let limiters = RateLimiters::new(&config);

    // Preload active badges so the first scans of the day skip the database.
    let store_for_warmup = store.clone();
    let cache_for_warmup = tag_cache.clone();
    actix_web::rt::spawn(async move {
        match cache_for_warmup.warmup(store_for_warmup.as_ref(), 250).await {
            Ok(count) => info!(count, "Tag cache warmed up"),
            Err(e) => error!(error = %e, "Failed to warm up tag cache"),
        }
    });

    let server_addr = config.server_addr.clone();
    let store_data: Data<dyn Store> = Data::from(store);
    let cache_data = Data::new(tag_cache);
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(store_data.clone())
            .app_data(cache_data.clone())
            .app_data(config_data.clone())
            .configure(|cfg| routes::configure(cfg, &config_data, &limiters))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
