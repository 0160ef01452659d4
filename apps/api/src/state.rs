use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding_client::EmbeddingClient;
use crate::extraction::taxonomy::{Taxonomy, TaxonomyStore};
use crate::matching::engine::MatchEngine;
use crate::matching::scoring_config::ScoringConfig;
use crate::matching::similarity::SkillEmbeddingTable;

/// A failed skill-table build is not retried before this much time passes.
const SKILL_TABLE_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Hot-reloadable taxonomy. Each request scores against one snapshot.
    pub taxonomy: Arc<TaxonomyStore>,
    pub scoring: Arc<ScoringConfig>,
    pub embedder: EmbeddingClient,
    skill_table: Arc<Mutex<Option<SkillTableSlot>>>,
}

/// Skill-name embeddings for one taxonomy version. Built at most once; the
/// build runs without holding the slot lock.
struct SkillTableSlot {
    version: String,
    table: Arc<OnceCell<Arc<SkillEmbeddingTable>>>,
    failed_at: Option<Instant>,
}

impl SkillTableSlot {
    fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            table: Arc::new(OnceCell::new()),
            failed_at: None,
        }
    }
}

impl AppState {
    pub fn new(
        config: Config,
        taxonomy: Arc<TaxonomyStore>,
        scoring: Arc<ScoringConfig>,
        embedder: EmbeddingClient,
    ) -> Self {
        Self {
            config,
            taxonomy,
            scoring,
            embedder,
            skill_table: Arc::new(Mutex::new(None)),
        }
    }

    /// Engine bound to the taxonomy snapshot current at call time.
    pub fn engine(&self) -> MatchEngine {
        MatchEngine::new(self.taxonomy.current(), self.scoring.clone())
    }

    /// The skill-embedding table for `taxonomy`, built on first use.
    ///
    /// `None` when embeddings are unavailable or a recent build failed. The
    /// build itself runs in a detached task, so a caller that gives up on
    /// waiting does not cancel it for the next one.
    pub async fn skill_table(&self, taxonomy: Arc<Taxonomy>) -> Option<Arc<SkillEmbeddingTable>> {
        if !self.embedder.is_available() {
            return None;
        }

        let cell = {
            let mut slot = self
                .skill_table
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if slot.as_ref().map_or(true, |s| s.version != taxonomy.version()) {
                *slot = Some(SkillTableSlot::new(taxonomy.version()));
            }
            let current = slot.as_mut()?;
            if let Some(table) = current.table.get() {
                return Some(table.clone());
            }
            if current
                .failed_at
                .is_some_and(|at| at.elapsed() < SKILL_TABLE_RETRY_AFTER)
            {
                return None;
            }
            current.failed_at = None;
            current.table.clone()
        };

        let embedder = self.embedder.clone();
        let slots = self.skill_table.clone();
        let build = tokio::spawn(async move {
            let built = cell
                .get_or_try_init(|| async {
                    let table = embedder.build_skill_table(&taxonomy).await?;
                    info!(
                        "Skill embedding table ready: {} skills (taxonomy v{})",
                        table.entries.len(),
                        table.taxonomy_version
                    );
                    Ok::<_, crate::embedding_client::EmbeddingError>(Arc::new(table))
                })
                .await
                .cloned();

            match built {
                Ok(table) => Some(table),
                Err(e) => {
                    warn!("Skill embedding table unavailable, skipping semantic discovery: {e}");
                    let mut slot = slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    if let Some(s) = slot.as_mut().filter(|s| s.version == taxonomy.version()) {
                        s.failed_at = Some(Instant::now());
                    }
                    None
                }
            }
        });

        build.await.unwrap_or_else(|e| {
            warn!("Skill embedding table task failed: {e}");
            None
        })
    }

    /// State over the built-in taxonomy with default scoring and an
    /// in-memory cache.
    #[cfg(test)]
    pub fn for_tests(
        provider: Option<Arc<dyn crate::embedding_client::EmbeddingProvider>>,
    ) -> Self {
        use crate::embedding_client::cache::InMemoryEmbeddingCache;

        let config = Config {
            port: 0,
            rust_log: "debug".to_string(),
            embedding_api_key: None,
            embedding_api_url: String::new(),
            embedding_model: "test".to_string(),
            embedding_timeout_ms: 100,
            redis_url: None,
            embedding_cache_ttl_secs: 60,
            embedding_cache_capacity: 512,
            embedding_cache_timeout_ms: 50,
            skill_discovery_timeout_ms: 150,
            taxonomy_path: None,
            scoring_config_path: None,
        };
        let embedder = EmbeddingClient::new(
            provider,
            Arc::new(InMemoryEmbeddingCache::new(config.embedding_cache_capacity)),
            Duration::from_millis(config.embedding_timeout_ms),
        );
        AppState::new(
            config,
            Arc::new(TaxonomyStore::builtin().expect("built-in taxonomy compiles")),
            Arc::new(ScoringConfig::default()),
            embedder,
        )
    }
}
