//! Embedding Client: the only I/O boundary of the matching engine.
//!
//! Every failure (missing key, network, provider error, timeout) degrades to
//! `Embedding::Unavailable`; callers fall back to keyword-only scoring.
//! Identical inputs are served from the cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::extraction::taxonomy::Taxonomy;
use crate::matching::similarity::SkillEmbeddingTable;

pub mod cache;

use cache::{cache_key, EmbeddingCache};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/embeddings";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
/// Inputs are cut to this many characters before embedding and hashing.
pub const MAX_INPUT_CHARS: usize = 8000;
const MAX_RETRIES: u32 = 3;
const BATCH_SIZE: usize = 96;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Provider returned an empty embedding")]
    EmptyEmbedding,

    #[error("Embedding provider not configured")]
    NotConfigured,

    #[error("Embedding call timed out after {0}ms")]
    Timeout(u64),
}

/// Outbound contract: text in, one vector per input out. Nothing else about
/// the provider's response shape leaks past this trait.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model(&self) -> &str;
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAI-compatible provider
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct OpenAiEmbeddingProvider {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_url: String, api_key: String, model: String) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            api_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn model(&self) -> &str {
        &self.model
    }

    /// Retries on 429 and 5xx with exponential backoff.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request_body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let mut last_error: Option<EmbeddingError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 500ms, 1s
                let delay = Duration::from_millis(500 * (1 << (attempt - 1)));
                warn!(
                    "Embedding call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.api_url)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(EmbeddingError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Embedding API returned {}: {}", status, body);
                last_error = Some(EmbeddingError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ProviderError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(EmbeddingError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let body = response.text().await?;
            let mut parsed: EmbeddingResponse = serde_json::from_str(&body)?;
            parsed.data.sort_by_key(|d| d.index);

            debug!("Embedding call succeeded: {} vectors", parsed.data.len());
            return Ok(parsed.data.into_iter().map(|d| d.embedding).collect());
        }

        Err(last_error.unwrap_or(EmbeddingError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Available(Vec<f32>),
    Unavailable { reason: String },
}

impl Embedding {
    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Embedding::Available(v) => Some(v),
            Embedding::Unavailable { .. } => None,
        }
    }
}

/// Cached, time-bounded front for an optional provider.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    cache: Arc<dyn EmbeddingCache>,
    timeout: Duration,
}

impl EmbeddingClient {
    pub fn new(
        provider: Option<Arc<dyn EmbeddingProvider>>,
        cache: Arc<dyn EmbeddingCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            timeout,
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    pub fn model(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.model())
    }

    /// One document → vector, or the reason there is none. The configured
    /// timeout covers the whole call: cache lookup, provider and cache write.
    pub async fn embed(&self, text: &str) -> Embedding {
        let outcome = tokio::time::timeout(self.timeout, self.embed_inner(text))
            .await
            .unwrap_or_else(|_| Err(EmbeddingError::Timeout(self.timeout.as_millis() as u64)));
        match outcome {
            Ok(v) => Embedding::Available(v),
            Err(e @ EmbeddingError::NotConfigured) => Embedding::Unavailable {
                reason: e.to_string(),
            },
            Err(e) => {
                warn!("Embedding unavailable: {e}");
                Embedding::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn embed_inner(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let provider = self.provider.as_deref().ok_or(EmbeddingError::NotConfigured)?;
        let text = truncate_chars(text.trim(), MAX_INPUT_CHARS);
        if text.is_empty() {
            return Err(EmbeddingError::EmptyEmbedding);
        }

        let key = cache_key(provider.model(), text);
        if let Some(hit) = self.cache.get(&key).await {
            debug!("Embedding cache hit");
            return Ok(hit);
        }

        let inputs = vec![text.to_string()];
        let vector = provider
            .embed(&inputs)
            .await?
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(EmbeddingError::EmptyEmbedding)?;

        self.cache.put(&key, &vector).await;
        Ok(vector)
    }

    /// Many texts → vectors in input order. Cached entries are not re-sent.
    /// Unlike `embed`, failures are returned so a caller building a table can
    /// decide to skip it entirely.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let provider = self.provider.as_deref().ok_or(EmbeddingError::NotConfigured)?;

        let prepared: Vec<String> = texts
            .iter()
            .map(|t| truncate_chars(t.trim(), MAX_INPUT_CHARS).to_string())
            .collect();
        let keys: Vec<String> = prepared
            .iter()
            .map(|t| cache_key(provider.model(), t))
            .collect();

        let mut out: Vec<Option<Vec<f32>>> = Vec::with_capacity(prepared.len());
        let mut misses = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            let hit = self.cache.get(key).await;
            if hit.is_none() {
                misses.push(i);
            }
            out.push(hit);
        }

        for chunk in misses.chunks(BATCH_SIZE) {
            let inputs: Vec<String> = chunk.iter().map(|&i| prepared[i].clone()).collect();
            let vectors = self.call_with_timeout(provider, &inputs).await?;
            if vectors.len() != inputs.len() {
                return Err(EmbeddingError::Api {
                    status: 200,
                    message: format!("expected {} vectors, got {}", inputs.len(), vectors.len()),
                });
            }
            for (&i, vector) in chunk.iter().zip(vectors) {
                if vector.is_empty() {
                    return Err(EmbeddingError::EmptyEmbedding);
                }
                self.cache.put(&keys[i], &vector).await;
                out[i] = Some(vector);
            }
        }

        out.into_iter()
            .map(|v| v.ok_or(EmbeddingError::EmptyEmbedding))
            .collect()
    }

    /// Embeds every canonical skill name for semantic skill discovery.
    pub async fn build_skill_table(&self, taxonomy: &Taxonomy) -> Result<SkillEmbeddingTable, EmbeddingError> {
        let names: Vec<String> = taxonomy.skills().iter().map(|s| s.skill.clone()).collect();
        let vectors = self.embed_batch(&names).await?;
        debug!("Built skill embedding table: {} entries", names.len());
        Ok(SkillEmbeddingTable {
            taxonomy_version: taxonomy.version().to_string(),
            entries: names.into_iter().zip(vectors).collect(),
        })
    }

    async fn call_with_timeout(
        &self,
        provider: &dyn EmbeddingProvider,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        tokio::time::timeout(self.timeout, provider.embed(inputs))
            .await
            .map_err(|_| EmbeddingError::Timeout(self.timeout.as_millis() as u64))?
    }
}

/// Longest prefix of at most `max_chars` characters, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
