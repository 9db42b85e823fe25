use std::net::SocketAddr;
use std::sync::Arc;

use common::storage::ObjectStore;
use common::storage::memory::InMemoryObjectStore;
use common::storage::s3::{S3ObjectStore, S3Settings};
use tracing::{Level, info};

use server::config::AppConfig;
use server::database::init_db;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load()?;
    let db = init_db(&config.database.url).await?;
    let store = build_store(&config)?;

    let state = AppState {
        db,
        store,
        bucket: config.storage.bucket.clone(),
        config: Arc::new(config),
    };

    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    )
    .parse()?;
    let app = server::build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.storage.backend.as_str() {
        // In-memory backend for local development without MinIO.
        "memory" => Ok(Arc::new(InMemoryObjectStore::new())),
        "s3" => {
            let store = S3ObjectStore::new(&S3Settings {
                bucket: config.storage.bucket.clone(),
                region: config.storage.region.clone(),
                endpoint: config.storage.endpoint.clone(),
                access_key: config.storage.access_key.clone(),
                secret_key: config.storage.secret_key.clone(),
                path_style: config.storage.path_style,
            })?;
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("unknown storage backend '{other}'"),
    }
}
