mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod repository;
mod store;
mod utils;

use std::io;
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::{info, warn};

use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::repository::FolderRepository;
use crate::store::{KvStore, MemoryKvStore, MemoryObjectStore, ObjectStore, PgKvStore, S3ObjectStore};
use crate::utils::password_cache::PasswordCache;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().map_err(io::Error::other)?;

    let kv: Arc<dyn KvStore> = match &config.database_url {
        Some(database_url) => {
            let pool = db::create_pool(database_url).await.map_err(io::Error::other)?;
            Arc::new(PgKvStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, folder metadata is kept in memory");
            Arc::new(MemoryKvStore::new())
        }
    };

    let objects: Arc<dyn ObjectStore> = match &config.s3_bucket {
        Some(bucket) => {
            let client = utils::s3::create_s3_client(config.aws_region.clone(), config.aws_endpoint_url.clone()).await;
            info!("Storing file contents in bucket {}", bucket);
            Arc::new(S3ObjectStore::new(client, bucket.clone()))
        }
        None => {
            warn!("AWS_S3_BUCKET not set, file contents are kept in memory");
            Arc::new(MemoryObjectStore::new())
        }
    };

    let state = web::Data::new(AppState {
        folders: FolderRepository::new(kv),
        objects,
        password_cache: PasswordCache::new(config.password_cache_ttl, config.password_cache_prune_threshold),
        max_upload_bytes: config.max_upload_bytes,
    });

    info!("Starting server at {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
