mod config;
mod embedding_client;
mod errors;
mod extraction;
mod matching;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::embedding_client::cache::{EmbeddingCache, InMemoryEmbeddingCache, RedisEmbeddingCache};
use crate::embedding_client::{EmbeddingClient, EmbeddingProvider, OpenAiEmbeddingProvider};
use crate::extraction::taxonomy::TaxonomyStore;
use crate::matching::scoring_config::ScoringConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Matchgate API v{}", env!("CARGO_PKG_VERSION"));

    // Taxonomy: file if configured, built-in table otherwise
    let taxonomy = match &config.taxonomy_path {
        Some(path) => TaxonomyStore::from_path(path)?,
        None => TaxonomyStore::builtin()?,
    };
    info!(
        "Taxonomy v{} active ({} skills)",
        taxonomy.current().version(),
        taxonomy.current().skills().len()
    );

    let scoring = ScoringConfig::load(config.scoring_config_path.as_deref())?;

    let embedder = EmbeddingClient::new(
        build_provider(&config)?,
        build_cache(&config),
        Duration::from_millis(config.embedding_timeout_ms),
    );

    let state = AppState::new(
        config.clone(),
        Arc::new(taxonomy),
        Arc::new(scoring),
        embedder,
    );

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_provider(config: &Config) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    let Some(api_key) = &config.embedding_api_key else {
        info!("EMBEDDING_API_KEY not set, scoring keyword-only");
        return Ok(None);
    };

    let provider = OpenAiEmbeddingProvider::new(
        config.embedding_api_url.clone(),
        api_key.clone(),
        config.embedding_model.clone(),
    )?;
    info!("Embedding provider initialized (model: {})", config.embedding_model);
    Ok(Some(Arc::new(provider)))
}

fn build_cache(config: &Config) -> Arc<dyn EmbeddingCache> {
    if let Some(url) = &config.redis_url {
        let op_timeout = Duration::from_millis(config.embedding_cache_timeout_ms);
        match RedisEmbeddingCache::new(url, config.embedding_cache_ttl_secs, op_timeout) {
            Ok(cache) => {
                info!("Embedding cache: Redis (ttl {}s)", config.embedding_cache_ttl_secs);
                return Arc::new(cache);
            }
            Err(e) => warn!("Invalid REDIS_URL, falling back to in-memory cache: {e}"),
        }
    }

    info!(
        "Embedding cache: in-memory ({} entries)",
        config.embedding_cache_capacity
    );
    Arc::new(InMemoryEmbeddingCache::new(config.embedding_cache_capacity))
}
