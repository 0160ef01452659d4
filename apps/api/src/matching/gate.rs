//! Domain Gate: three independent ceilings on the raw score.
//!
//! `effective_cap = min(role_alignment_cap, must_have_cap, coverage_confidence_cap)`.
//! The gate is a value object rebuilt on every scoring call; each cap records
//! why it was set in `explanations`.

use serde::{Deserialize, Serialize};

use crate::extraction::domain::SocGroup;
use crate::extraction::skills::{is_low_signal, RequirementProfile};
use crate::matching::alignment::{AlignmentBand, RoleAlignment};
use crate::matching::scoring_config::GateConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageConfidence {
    Low,
    Medium,
    High,
}

/// One JD must-have and whether the resume satisfies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MustHaveStatus {
    pub skill: String,
    pub hard: bool,
    pub met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainGate {
    pub role_alignment: f64,
    pub role_alignment_band: AlignmentBand,
    pub role_alignment_cap: f64,
    /// 0 – 100. Vacuously 100 when there are no must-haves.
    pub must_have_coverage: f64,
    pub must_have_met: usize,
    pub must_have_total: usize,
    pub must_have_cap: f64,
    pub hard_must_haves_missing: Vec<String>,
    pub coverage_confidence: CoverageConfidence,
    pub coverage_confidence_cap: f64,
    pub effective_cap: f64,
    pub resume_soc: SocGroup,
    pub jd_soc: SocGroup,
    pub explanations: Vec<String>,
}

/// How much of the JD's requirement language the extractor could evaluate.
pub fn coverage_confidence(
    config: &GateConfig,
    profile: &RequirementProfile,
    jd_skill_count: usize,
    jd_text: &str,
) -> CoverageConfidence {
    if is_low_signal(jd_text) {
        return CoverageConfidence::Low;
    }

    let ratio = if profile.requirement_lines > 0 {
        profile.evaluable_lines as f64 / profile.requirement_lines as f64
    } else {
        0.0
    };

    if ratio >= config.high_confidence_ratio && jd_skill_count >= config.high_confidence_min_skills {
        CoverageConfidence::High
    } else if ratio >= config.medium_confidence_ratio
        || jd_skill_count >= config.medium_confidence_min_skills
    {
        CoverageConfidence::Medium
    } else {
        CoverageConfidence::Low
    }
}

/// Combines alignment, must-have coverage and confidence into one ceiling.
pub fn compute_gate(
    config: &GateConfig,
    alignment: &RoleAlignment,
    resume_soc: SocGroup,
    jd_soc: SocGroup,
    must_haves: &[MustHaveStatus],
    confidence: CoverageConfidence,
) -> DomainGate {
    let mut explanations = Vec::new();

    // ── role alignment ──────────────────────────────────────────────────────
    let role_alignment_cap = match alignment.band {
        AlignmentBand::Match => config.match_cap,
        AlignmentBand::Adjacent => config.adjacent_cap,
        AlignmentBand::Unrelated => config.unrelated_cap,
    };
    if alignment.from_domain_overlap {
        explanations.push(format!(
            "Occupational group unclear (resume: {}, job: {}); role alignment taken from declared-domain overlap.",
            resume_soc.label(),
            jd_soc.label()
        ));
    }
    explanations.push(format!(
        "Role alignment {} (resume: {}, job: {}, alignment {:.2}) caps the score at {}.",
        alignment.band.as_str(),
        resume_soc.label(),
        jd_soc.label(),
        alignment.alignment,
        fmt_cap(role_alignment_cap)
    ));

    // ── must-haves ──────────────────────────────────────────────────────────
    let must_have_total = must_haves.len();
    let must_have_met = must_haves.iter().filter(|m| m.met).count();
    let must_have_coverage = if must_have_total == 0 {
        100.0
    } else {
        100.0 * must_have_met as f64 / must_have_total as f64
    };
    let hard_must_haves_missing: Vec<String> = must_haves
        .iter()
        .filter(|m| m.hard && !m.met)
        .map(|m| m.skill.clone())
        .collect();

    let mut must_have_cap = if must_have_coverage >= config.must_have_full_threshold {
        100.0
    } else {
        (config.must_have_floor_cap + must_have_coverage * config.must_have_slope).min(100.0)
    };

    if must_have_total == 0 {
        explanations.push("No must-have requirements extracted; coverage treated as 100%.".to_string());
    } else if must_have_cap >= 100.0 {
        explanations.push(format!(
            "Must-have coverage {must_have_coverage:.0}% ({must_have_met}/{must_have_total}) does not cap the score."
        ));
    } else {
        explanations.push(format!(
            "Must-have coverage {must_have_coverage:.0}% ({must_have_met}/{must_have_total}) is below {:.0}%, capping the score at {}.",
            config.must_have_full_threshold,
            fmt_cap(must_have_cap)
        ));
    }

    if !hard_must_haves_missing.is_empty() {
        must_have_cap = must_have_cap.min(config.hard_missing_cap);
        explanations.push(format!(
            "Hard requirement missing: {}; capping the score at {}.",
            hard_must_haves_missing.join(", "),
            fmt_cap(config.hard_missing_cap)
        ));
    }

    // ── coverage confidence ─────────────────────────────────────────────────
    let coverage_confidence_cap = match confidence {
        CoverageConfidence::Low => config.low_confidence_cap,
        CoverageConfidence::Medium => config.medium_confidence_cap,
        CoverageConfidence::High => config.high_confidence_cap,
    };
    if coverage_confidence_cap < 100.0 {
        explanations.push(format!(
            "Coverage confidence is {} (few job requirements could be evaluated), capping the score at {}.",
            confidence_label(confidence),
            fmt_cap(coverage_confidence_cap)
        ));
    }

    let effective_cap = role_alignment_cap
        .min(must_have_cap)
        .min(coverage_confidence_cap);
    let binding = if effective_cap >= 100.0 {
        "none"
    } else if effective_cap == must_have_cap {
        "must-have requirements"
    } else if effective_cap == role_alignment_cap {
        "role alignment"
    } else {
        "coverage confidence"
    };
    explanations.push(format!(
        "Effective cap {} (binding: {binding}).",
        fmt_cap(effective_cap)
    ));

    DomainGate {
        role_alignment: alignment.alignment,
        role_alignment_band: alignment.band,
        role_alignment_cap,
        must_have_coverage,
        must_have_met,
        must_have_total,
        must_have_cap,
        hard_must_haves_missing,
        coverage_confidence: confidence,
        coverage_confidence_cap,
        effective_cap,
        resume_soc,
        jd_soc,
        explanations,
    }
}

/// Clamp to 0–100, round, never above the cap.
pub fn apply_gate(raw_score: f64, gate: &DomainGate) -> f64 {
    if raw_score.is_nan() {
        return 0.0;
    }
    raw_score.clamp(0.0, 100.0).round().min(gate.effective_cap).max(0.0)
}

fn confidence_label(confidence: CoverageConfidence) -> &'static str {
    match confidence {
        CoverageConfidence::Low => "low",
        CoverageConfidence::Medium => "medium",
        CoverageConfidence::High => "high",
    }
}

fn fmt_cap(cap: f64) -> String {
    format!("{:.0}", cap)
}
