use std::time::Duration;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::embedding_client::{Embedding, EmbeddingClient};
use crate::errors::AppError;
use crate::extraction::domain::{
    classify_domain, extract_domains, extract_titles, DomainClassification, SocGroup,
};
use crate::extraction::seniority::{extract_seniority, SenioritySignals};
use crate::extraction::skills::{extract_skills, is_low_signal, top_skills_by_weight, SkillEntry};
use crate::matching::banding::ScoreBand;
use crate::matching::engine::{MatchReport, MatchRequest};
use crate::matching::similarity::{chunk_text, discover_skills, InferredSkill};
use crate::state::AppState;

const DISCOVERY_CHUNK_CHARS: usize = 600;

// ────────────────────────────────────────────────────────────────────────────
// Match
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct MatchBody {
    pub resume_text: String,
    pub jd_text: String,
    pub resume_embedding: Option<Vec<f32>>,
    pub jd_embedding: Option<Vec<f32>>,
    /// Infer resume skills from chunk embeddings as well as literal mentions.
    #[serde(default)]
    pub discover_skills: bool,
}

#[derive(Serialize)]
pub struct MatchResponse {
    #[serde(flatten)]
    pub report: MatchReport,
    pub band_label: &'static str,
    /// Why the semantic sub-score is missing, when it is.
    pub semantic_unavailable: Option<String>,
}

/// POST /api/v1/match
pub async fn handle_match(
    State(state): State<AppState>,
    Json(body): Json<MatchBody>,
) -> Result<Json<MatchResponse>, AppError> {
    // reject before spending any embedding calls
    if body.resume_text.trim().is_empty() {
        return Err(AppError::Validation("resume_text must not be empty".to_string()));
    }
    if body.jd_text.trim().is_empty() {
        return Err(AppError::Validation("jd_text must not be empty".to_string()));
    }

    let engine = state.engine();

    let (resume_embedding, jd_embedding) = tokio::join!(
        resolve_embedding(&state.embedder, body.resume_embedding, &body.resume_text),
        resolve_embedding(&state.embedder, body.jd_embedding, &body.jd_text),
    );
    let semantic_unavailable = match (&resume_embedding, &jd_embedding) {
        (Embedding::Unavailable { reason }, _) | (_, Embedding::Unavailable { reason }) => {
            Some(reason.clone())
        }
        _ => None,
    };
    let resume_vec = resume_embedding.into_vector();
    let jd_vec = jd_embedding.into_vector();

    let inferred = if body.discover_skills {
        infer_resume_skills(&state, &body.resume_text).await
    } else {
        Vec::new()
    };

    let report = tokio::task::spawn_blocking(move || {
        engine.evaluate(&MatchRequest {
            resume_text: &body.resume_text,
            jd_text: &body.jd_text,
            resume_embedding: resume_vec.as_deref(),
            jd_embedding: jd_vec.as_deref(),
            inferred_skills: &inferred,
        })
    })
    .await
    .map_err(|e| anyhow::anyhow!("match task failed: {e}"))??;

    Ok(Json(MatchResponse {
        band_label: ScoreBand::label(report.band),
        report,
        semantic_unavailable,
    }))
}

async fn resolve_embedding(
    embedder: &EmbeddingClient,
    supplied: Option<Vec<f32>>,
    text: &str,
) -> Embedding {
    match supplied {
        Some(v) if !v.is_empty() => Embedding::Available(v),
        _ => embedder.embed(text).await,
    }
}

/// Semantic skill discovery over resume chunks, bounded by one overall
/// deadline. Any failure or timeout yields no inferred skills; the literal
/// extraction still stands.
async fn infer_resume_skills(state: &AppState, resume_text: &str) -> Vec<InferredSkill> {
    let deadline = Duration::from_millis(state.config.skill_discovery_timeout_ms);
    match tokio::time::timeout(deadline, discover_resume_skills(state, resume_text)).await {
        Ok(inferred) => inferred,
        Err(_) => {
            warn!(
                "Skill discovery exceeded {}ms, scoring with literal skills only",
                deadline.as_millis()
            );
            Vec::new()
        }
    }
}

async fn discover_resume_skills(state: &AppState, resume_text: &str) -> Vec<InferredSkill> {
    let taxonomy = state.taxonomy.current();
    let Some(table) = state.skill_table(taxonomy.clone()).await else {
        return Vec::new();
    };

    let chunks = chunk_text(resume_text, DISCOVERY_CHUNK_CHARS);
    let vectors = match state.embedder.embed_batch(&chunks).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Resume chunk embedding failed, skipping skill discovery: {e}");
            return Vec::new();
        }
    };

    let literal = extract_skills(&taxonomy, resume_text);
    discover_skills(
        &vectors,
        &table,
        state.scoring.engine.discovery_threshold,
        &literal,
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Standalone utilities
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TextBody {
    pub text: String,
}

#[derive(Serialize)]
pub struct SkillsResponse {
    pub skills: Vec<SkillEntry>,
    /// Text too short to trust the map.
    pub low_signal: bool,
    pub taxonomy_version: String,
}

/// POST /api/v1/skills/extract
pub async fn handle_extract_skills(
    State(state): State<AppState>,
    Json(body): Json<TextBody>,
) -> Json<SkillsResponse> {
    let taxonomy = state.taxonomy.current();
    let map = extract_skills(&taxonomy, &body.text);
    let skills = top_skills_by_weight(&map, map.len())
        .into_iter()
        .filter_map(|name| map.get(&name).cloned())
        .collect();
    Json(SkillsResponse {
        skills,
        low_signal: is_low_signal(&body.text),
        taxonomy_version: taxonomy.version().to_string(),
    })
}

/// POST /api/v1/seniority/extract
pub async fn handle_extract_seniority(
    State(state): State<AppState>,
    Json(body): Json<TextBody>,
) -> Json<SenioritySignals> {
    let taxonomy = state.taxonomy.current();
    Json(extract_seniority(&taxonomy, &body.text))
}

#[derive(Deserialize)]
pub struct ClassifyBody {
    pub text: String,
    /// Extracted from `text` when omitted.
    pub domains: Option<Vec<String>>,
    pub titles: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct ClassifyResponse {
    pub group: SocGroup,
    pub label: &'static str,
    pub classification: DomainClassification,
    pub domains: Vec<String>,
    pub titles: Vec<String>,
}

/// POST /api/v1/domain/classify
pub async fn handle_classify_domain(
    State(state): State<AppState>,
    Json(body): Json<ClassifyBody>,
) -> Json<ClassifyResponse> {
    let taxonomy = state.taxonomy.current();
    let domains = body
        .domains
        .unwrap_or_else(|| extract_domains(&taxonomy, &body.text));
    let titles = body
        .titles
        .unwrap_or_else(|| extract_titles(&taxonomy, &body.text));

    let classification = classify_domain(
        &taxonomy,
        &state.scoring.classifier,
        &body.text,
        &domains,
        &titles,
    );
    Json(ClassifyResponse {
        group: classification.group,
        label: classification.group.label(),
        classification,
        domains,
        titles,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Taxonomy
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct TaxonomyInfo {
    pub version: String,
    pub skills: usize,
    pub soc_groups: usize,
    pub level_terms: usize,
    /// `None` when serving the built-in table.
    pub source: Option<String>,
}

fn taxonomy_info(state: &AppState) -> TaxonomyInfo {
    let taxonomy = state.taxonomy.current();
    TaxonomyInfo {
        version: taxonomy.version().to_string(),
        skills: taxonomy.skills().len(),
        soc_groups: taxonomy.groups().len(),
        level_terms: taxonomy.level_terms().len(),
        source: state.taxonomy.source().map(|p| p.display().to_string()),
    }
}

/// GET /api/v1/taxonomy
pub async fn handle_taxonomy_info(State(state): State<AppState>) -> Json<TaxonomyInfo> {
    Json(taxonomy_info(&state))
}

/// POST /api/v1/taxonomy/reload
pub async fn handle_taxonomy_reload(
    State(state): State<AppState>,
) -> Result<Json<TaxonomyInfo>, AppError> {
    state.taxonomy.reload()?;
    Ok(Json(taxonomy_info(&state)))
}
