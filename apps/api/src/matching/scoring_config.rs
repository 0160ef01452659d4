//! Scoring configuration: every product-tuned constant in one place.
//!
//! Loaded from `SCORING_CONFIG_PATH` when set; any field the file omits falls
//! back to its default, so a file can override a single cap.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::extraction::domain::SocGroup;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub blend: BlendWeights,
    pub classifier: ClassifierConfig,
    pub alignment: AlignmentConfig,
    pub gate: GateConfig,
    pub bands: BandThresholds,
    pub engine: EngineConfig,
}

/// Keyword/semantic blend used when both sub-scores exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub keyword: f64,
    pub semantic: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            keyword: 0.6,
            semantic: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub keyword_weight: f64,
    /// Hits per keyword beyond this are ignored.
    pub keyword_hit_cap: u32,
    pub title_weight: f64,
    pub domain_weight: f64,
    /// Winning group must reach this aggregate score.
    pub min_score: f64,
    /// Winner must lead the runner-up by this fraction of its own score.
    pub margin_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keyword_weight: 1.0,
            keyword_hit_cap: 3,
            title_weight: 3.0,
            domain_weight: 2.0,
            min_score: 4.0,
            margin_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub match_score: f64,
    pub adjacent_score: f64,
    pub unrelated_score: f64,
    /// Unordered pairs of distinct groups considered neighbouring occupations.
    pub adjacent_pairs: Vec<(SocGroup, SocGroup)>,
    /// Domain-overlap fallback, used when either side is `Unknown`.
    pub fallback_match_jaccard: f64,
    /// Each side must declare at least this many domains for a fallback "match".
    pub fallback_match_min_domains: usize,
    pub fallback_adjacent_jaccard: f64,
    /// Alignment when one side declares no domains at all.
    pub fallback_no_evidence_score: f64,
    /// Share of `match_score` granted to a fallback match; below 1 so a
    /// domain-only match never equals a classified one.
    pub fallback_match_discount: f64,
    /// Alignment gained per unit of Jaccard overlap in the adjacent band.
    pub fallback_adjacent_slope: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            match_score: 1.0,
            adjacent_score: 0.55,
            unrelated_score: 0.1,
            adjacent_pairs: vec![
                (SocGroup::Recruiting, SocGroup::HrBenefits),
                (SocGroup::HrBenefits, SocGroup::FinanceAccounting),
                (SocGroup::Recruiting, SocGroup::SalesMarketing),
            ],
            fallback_match_jaccard: 0.6,
            fallback_match_min_domains: 2,
            fallback_adjacent_jaccard: 0.2,
            fallback_no_evidence_score: 0.4,
            fallback_match_discount: 0.9,
            fallback_adjacent_slope: 0.25,
        }
    }
}

impl AlignmentConfig {
    pub fn is_adjacent(&self, a: SocGroup, b: SocGroup) -> bool {
        a != b
            && self
                .adjacent_pairs
                .iter()
                .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub match_cap: f64,
    pub adjacent_cap: f64,
    pub unrelated_cap: f64,
    /// Coverage (0–100) at or above which the must-have cap is lifted entirely.
    pub must_have_full_threshold: f64,
    /// Must-have cap below the threshold: `floor + coverage * slope`.
    pub must_have_floor_cap: f64,
    pub must_have_slope: f64,
    pub hard_missing_cap: f64,
    pub low_confidence_cap: f64,
    pub medium_confidence_cap: f64,
    pub high_confidence_cap: f64,
    pub high_confidence_ratio: f64,
    pub high_confidence_min_skills: usize,
    pub medium_confidence_ratio: f64,
    pub medium_confidence_min_skills: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            match_cap: 100.0,
            adjacent_cap: 65.0,
            unrelated_cap: 15.0,
            must_have_full_threshold: 70.0,
            must_have_floor_cap: 10.0,
            must_have_slope: 0.6,
            hard_missing_cap: 5.0,
            low_confidence_cap: 85.0,
            medium_confidence_cap: 100.0,
            high_confidence_cap: 100.0,
            high_confidence_ratio: 0.6,
            high_confidence_min_skills: 5,
            medium_confidence_ratio: 0.3,
            medium_confidence_min_skills: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandThresholds {
    pub strong: f64,
    pub solid: f64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            strong: 85.0,
            solid: 70.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many missing skills are rendered as human-readable gaps.
    pub top_gaps_limit: usize,
    /// Must-haves taken from top JD skills when the JD states no requirements.
    pub fallback_must_have_count: usize,
    /// Keyword strength of a semantically inferred (not literal) resume skill.
    pub inferred_skill_strength: f64,
    pub underqualified_tolerance_years: f64,
    pub overqualified_margin_years: f64,
    /// Minimum chunk-to-skill cosine for semantic skill discovery.
    pub discovery_threshold: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_gaps_limit: 5,
            fallback_must_have_count: 5,
            inferred_skill_strength: 0.6,
            underqualified_tolerance_years: 1.0,
            overqualified_margin_years: 8.0,
            discovery_threshold: 0.82,
        }
    }
}

impl ScoringConfig {
    /// Defaults, or the file at `path` layered over them.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read scoring config {}", path.display()))?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(raw).context("Scoring config is not valid JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.blend.keyword < 0.0 || self.blend.semantic < 0.0 {
            bail!("blend weights must be non-negative");
        }
        if self.blend.keyword + self.blend.semantic <= 0.0 {
            bail!("blend weights must not both be zero");
        }

        let g = &self.gate;
        for (name, cap) in [
            ("match_cap", g.match_cap),
            ("adjacent_cap", g.adjacent_cap),
            ("unrelated_cap", g.unrelated_cap),
            ("must_have_floor_cap", g.must_have_floor_cap),
            ("hard_missing_cap", g.hard_missing_cap),
            ("low_confidence_cap", g.low_confidence_cap),
            ("medium_confidence_cap", g.medium_confidence_cap),
            ("high_confidence_cap", g.high_confidence_cap),
        ] {
            if !(0.0..=100.0).contains(&cap) {
                bail!("gate.{name} must be within 0–100, got {cap}");
            }
        }
        if g.unrelated_cap > g.adjacent_cap || g.adjacent_cap > g.match_cap {
            bail!("role caps must satisfy unrelated ≤ adjacent ≤ match");
        }

        let a = &self.alignment;
        if !(a.unrelated_score <= a.adjacent_score && a.adjacent_score <= a.match_score) {
            bail!("alignment scores must satisfy unrelated ≤ adjacent ≤ match");
        }
        if !(0.0..1.0).contains(&a.fallback_match_discount) {
            bail!("alignment.fallback_match_discount must be within 0–1 (exclusive)");
        }
        if a.fallback_adjacent_slope < 0.0 {
            bail!("alignment.fallback_adjacent_slope must not be negative");
        }
        if a.adjacent_pairs.iter().any(|&(x, y)| x == y || !x.is_known() || !y.is_known()) {
            bail!("adjacent pairs must join two distinct, known groups");
        }

        if self.bands.solid > self.bands.strong {
            bail!("bands.solid must not exceed bands.strong");
        }
        if !(0.0..=1.0).contains(&self.classifier.margin_ratio) {
            bail!("classifier.margin_ratio must be within 0–1");
        }
        Ok(())
    }
}
