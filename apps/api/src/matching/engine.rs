//! Hybrid Match Engine: resume text + JD text → one gated, explainable score.
//!
//! Pipeline per call (no state shared between calls):
//! 1. extract skills and seniority from both documents
//! 2. keyword score: JD skills weighted by JD importance, resume strength
//!    1.0 for a literal hit, partial for a semantically inferred one
//! 3. semantic score from the two embeddings, when both are present
//! 4. blend into the raw score
//! 5. classify both domains, align them, evaluate must-haves, build the gate
//! 6. gate the raw score and band the result

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::extraction::domain::{
    classify_domain, extract_domains, extract_titles, DomainClassification,
};
use crate::extraction::seniority::{extract_seniority, implied_years, SenioritySignals};
use crate::extraction::skills::{extract_requirements, extract_skills, SkillEntry, SkillMap};
use crate::extraction::taxonomy::Taxonomy;
use crate::matching::alignment::{alignment, RoleAlignment};
use crate::matching::banding::{score_band, ScoreBand};
use crate::matching::gate::{
    apply_gate, compute_gate, coverage_confidence, DomainGate, MustHaveStatus,
};
use crate::matching::scoring_config::ScoringConfig;
use crate::matching::similarity::{semantic_score, InferredSkill};

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeniorityFlag {
    Underqualified,
    Overqualified,
}

/// The terminal artifact handed to callers. Built in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score: f64,
    pub keyword_score: f64,
    pub semantic_score: Option<f64>,
    /// JD skills the resume covers, by JD weight.
    pub matched_skills: Vec<String>,
    /// Every JD skill the resume lacks, by JD weight.
    pub missing_skills: Vec<String>,
    pub top_gaps: Vec<String>,
    pub seniority_flag: Option<SeniorityFlag>,
}

/// `MatchResult` plus the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    #[serde(flatten)]
    pub result: MatchResult,
    pub raw_score: f64,
    pub band: ScoreBand,
    pub gate: DomainGate,
    pub role_alignment: RoleAlignment,
    pub must_haves: Vec<MustHaveStatus>,
    pub resume_seniority: SenioritySignals,
    pub jd_seniority: SenioritySignals,
    pub required_years: Option<f64>,
    pub resume_years: Option<f64>,
    pub resume_domain: DomainClassification,
    pub jd_domain: DomainClassification,
    pub inferred_skills: Vec<InferredSkill>,
    pub taxonomy_version: String,
}

/// Inputs to one scoring call. Embeddings and inferred skills are optional enrichment.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchRequest<'a> {
    pub resume_text: &'a str,
    pub jd_text: &'a str,
    pub resume_embedding: Option<&'a [f32]>,
    pub jd_embedding: Option<&'a [f32]>,
    pub inferred_skills: &'a [InferredSkill],
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

/// Pure orchestrator over an immutable taxonomy snapshot and scoring config.
#[derive(Clone)]
pub struct MatchEngine {
    taxonomy: Arc<Taxonomy>,
    config: Arc<ScoringConfig>,
}

/// One document run through every extractor.
struct DocumentSignals {
    skills: SkillMap,
    seniority: SenioritySignals,
    titles: Vec<String>,
    domains: Vec<String>,
    classification: DomainClassification,
}

impl MatchEngine {
    pub fn new(taxonomy: Arc<Taxonomy>, config: Arc<ScoringConfig>) -> Self {
        Self { taxonomy, config }
    }

    /// Scores one resume against one JD. The flattened `result` is the
    /// public match result; the rest is the evidence behind it.
    pub fn evaluate(&self, req: &MatchRequest<'_>) -> Result<MatchReport, AppError> {
        if req.resume_text.trim().is_empty() {
            return Err(AppError::Validation("resume_text must not be empty".to_string()));
        }
        if req.jd_text.trim().is_empty() {
            return Err(AppError::Validation("jd_text must not be empty".to_string()));
        }

        let tax = &*self.taxonomy;
        let cfg = &*self.config;

        // 1. extraction
        let resume = self.document_signals(req.resume_text);
        let jd = self.document_signals(req.jd_text);

        let inferred: Vec<InferredSkill> = req
            .inferred_skills
            .iter()
            .filter(|s| !resume.skills.contains_key(&s.skill) && tax.entry(&s.skill).is_some())
            .cloned()
            .collect();
        let inferred_names: BTreeSet<&str> = inferred.iter().map(|s| s.skill.as_str()).collect();
        let has_skill =
            |skill: &str| resume.skills.contains_key(skill) || inferred_names.contains(skill);

        // 2. keyword overlap, weighted by JD importance
        let mut ranked_jd: Vec<&SkillEntry> = jd.skills.values().collect();
        ranked_jd.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.skill.cmp(&b.skill)));

        let mut total_weight = 0.0_f64;
        let mut covered_weight = 0.0_f64;
        let mut matched_skills = Vec::new();
        let mut missing_skills = Vec::new();
        for entry in &ranked_jd {
            let weight = entry.weight as f64;
            total_weight += weight;
            let strength = if resume.skills.contains_key(&entry.skill) {
                1.0
            } else if inferred_names.contains(entry.skill.as_str()) {
                cfg.engine.inferred_skill_strength
            } else {
                0.0
            };
            covered_weight += strength * weight;
            if strength > 0.0 {
                matched_skills.push(entry.skill.clone());
            } else {
                missing_skills.push(entry.skill.clone());
            }
        }
        let keyword_score = if total_weight > 0.0 {
            round1(covered_weight / total_weight * 100.0)
        } else {
            0.0
        };

        // 3. semantic similarity, only when both vectors are usable
        let semantic = match (req.resume_embedding, req.jd_embedding) {
            (Some(r), Some(j)) if !r.is_empty() && r.len() == j.len() => Some(round1(semantic_score(r, j))),
            (Some(r), Some(j)) => {
                warn!(
                    resume_dim = r.len(),
                    jd_dim = j.len(),
                    "Unusable embeddings; scoring keyword-only"
                );
                None
            }
            _ => None,
        };

        // 4. blend
        let raw_score = match semantic {
            Some(s) => {
                let (wk, ws) = (cfg.blend.keyword, cfg.blend.semantic);
                round1((wk * keyword_score + ws * s) / (wk + ws))
            }
            None => keyword_score,
        };

        // 5. domain gate
        let role_alignment = alignment(
            &cfg.alignment,
            resume.classification.group,
            jd.classification.group,
            &resume.domains,
            &jd.domains,
        );

        let profile = extract_requirements(
            tax,
            req.jd_text,
            &jd.skills,
            cfg.engine.fallback_must_have_count,
        );
        let must_haves: Vec<MustHaveStatus> = profile
            .must_haves
            .iter()
            .map(|m| MustHaveStatus {
                skill: m.skill.clone(),
                hard: m.hard,
                met: has_skill(&m.skill),
            })
            .collect();
        let confidence = coverage_confidence(&cfg.gate, &profile, jd.skills.len(), req.jd_text);

        let gate = compute_gate(
            &cfg.gate,
            &role_alignment,
            resume.classification.group,
            jd.classification.group,
            &must_haves,
            confidence,
        );

        // 6. final score
        let score = apply_gate(raw_score, &gate);
        let band = score_band(&cfg.bands, score);

        // 7. evidence
        let top_gaps = self.top_gaps(&missing_skills, &must_haves, &jd.skills);

        let resume_years = resume
            .seniority
            .years_estimate
            .or_else(|| implied_years(tax, &resume.seniority.level_hints));
        let required_years = jd.seniority.years_estimate.or_else(|| {
            let title_hints = extract_seniority(tax, &jd.titles.join("\n")).level_hints;
            implied_years(tax, &title_hints)
        });
        let seniority_flag = self.seniority_flag(resume_years, required_years);

        debug!(
            resume_skills = resume.skills.len(),
            jd_skills = jd.skills.len(),
            resume_soc = ?resume.classification.group,
            jd_soc = ?jd.classification.group,
            band = role_alignment.band.as_str(),
            keyword_score,
            semantic_score = ?semantic,
            raw_score,
            effective_cap = gate.effective_cap,
            score,
            "Match scored"
        );

        Ok(MatchReport {
            result: MatchResult {
                score,
                keyword_score,
                semantic_score: semantic,
                matched_skills,
                missing_skills,
                top_gaps,
                seniority_flag,
            },
            raw_score,
            band,
            gate,
            role_alignment,
            must_haves,
            resume_seniority: resume.seniority,
            jd_seniority: jd.seniority,
            required_years,
            resume_years,
            resume_domain: resume.classification,
            jd_domain: jd.classification,
            inferred_skills: inferred,
            taxonomy_version: tax.version().to_string(),
        })
    }

    fn document_signals(&self, text: &str) -> DocumentSignals {
        let tax = &*self.taxonomy;
        let titles = extract_titles(tax, text);
        let domains = extract_domains(tax, text);
        let classification =
            classify_domain(tax, &self.config.classifier, text, &domains, &titles);
        DocumentSignals {
            skills: extract_skills(tax, text),
            seniority: extract_seniority(tax, text),
            titles,
            domains,
            classification,
        }
    }

    /// Human-readable gaps: missing hard requirements first, then missing
    /// must-haves, then the remaining missing skills by JD weight.
    fn top_gaps(
        &self,
        missing_skills: &[String],
        must_haves: &[MustHaveStatus],
        jd_skills: &SkillMap,
    ) -> Vec<String> {
        let rank = |skill: &str| match must_haves.iter().find(|m| m.skill == skill) {
            Some(m) if m.hard => 0,
            Some(_) => 1,
            None => 2,
        };

        let mut ordered: Vec<&String> = missing_skills.iter().collect();
        // stable: keeps JD-weight order inside each rank
        ordered.sort_by_key(|s| rank(s));

        ordered
            .into_iter()
            .take(self.config.engine.top_gaps_limit)
            .map(|skill| {
                let mentions = jd_skills.get(skill).map(|e| e.weight).unwrap_or(0);
                match rank(skill) {
                    0 => format!("Missing required credential: {skill}"),
                    1 => format!("Missing must-have skill: {skill}"),
                    _ if mentions > 1 => format!(
                        "Missing skill: {skill} (mentioned {mentions} times in the job description)"
                    ),
                    _ => format!("Missing skill: {skill}"),
                }
            })
            .collect()
    }

    fn seniority_flag(&self, resume_years: Option<f64>, required_years: Option<f64>) -> Option<SeniorityFlag> {
        let (have, need) = (resume_years?, required_years?);
        let engine = &self.config.engine;
        if have + engine.underqualified_tolerance_years < need {
            Some(SeniorityFlag::Underqualified)
        } else if have > need + engine.overqualified_margin_years {
            Some(SeniorityFlag::Overqualified)
        } else {
            None
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::domain::SocGroup;
    use crate::extraction::fixtures::{
        taxonomy, BENEFITS_JD, DRYWALL_JD, RECRUITER_RESUME, RECRUITING_MANAGER_JD, VAGUE_JD,
    };
    use crate::matching::alignment::AlignmentBand;

    fn engine() -> MatchEngine {
        MatchEngine::new(taxonomy(), Arc::new(ScoringConfig::default()))
    }

    fn report(resume: &str, jd: &str) -> MatchReport {
        engine()
            .evaluate(&MatchRequest {
                resume_text: resume,
                jd_text: jd,
                ..Default::default()
            })
            .unwrap()
    }

    const SIMULATED_RAW: f64 = 80.0;

    fn score(
        e: &MatchEngine,
        resume_text: &str,
        jd_text: &str,
        resume_embedding: Option<&[f32]>,
        jd_embedding: Option<&[f32]>,
    ) -> Result<MatchResult, AppError> {
        e.evaluate(&MatchRequest {
            resume_text,
            jd_text,
            resume_embedding,
            jd_embedding,
            inferred_skills: &[],
        })
        .map(|report| report.result)
    }

    #[test]
    fn test_empty_input_is_a_hard_error() {
        let e = engine();
        assert!(matches!(
            score(&e, "", RECRUITING_MANAGER_JD, None, None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            score(&e, RECRUITER_RESUME, "   \n", None, None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_idempotent_without_embeddings() {
        let e = engine();
        let a = score(&e, RECRUITER_RESUME, BENEFITS_JD, None, None).unwrap();
        let b = score(&e, RECRUITER_RESUME, BENEFITS_JD, None, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_full_report_is_reproducible() {
        let e = engine();
        let req = MatchRequest {
            resume_text: RECRUITER_RESUME,
            jd_text: BENEFITS_JD,
            ..Default::default()
        };
        let first = e.evaluate(&req).unwrap();
        let second = e.evaluate(&req).unwrap();
        assert_eq!(first.resume_domain, second.resume_domain);
        assert_eq!(first, second);
    }

    #[test]
    fn test_keyword_only_fallback() {
        let r = report(RECRUITER_RESUME, BENEFITS_JD);
        assert_eq!(r.result.semantic_score, None);
        assert_eq!(r.raw_score, r.result.keyword_score);
        assert_eq!(r.result.score, apply_gate(r.result.keyword_score, &r.gate));
    }

    #[test]
    fn test_partition_invariant() {
        let tax = taxonomy();
        for jd in [BENEFITS_JD, DRYWALL_JD, RECRUITING_MANAGER_JD, VAGUE_JD] {
            let r = report(RECRUITER_RESUME, jd);
            let matched: BTreeSet<&String> = r.result.matched_skills.iter().collect();
            let missing: BTreeSet<&String> = r.result.missing_skills.iter().collect();
            assert!(matched.is_disjoint(&missing));

            let union: BTreeSet<String> = matched.union(&missing).map(|s| s.to_string()).collect();
            let jd_skills: BTreeSet<String> = extract_skills(&tax, jd).into_keys().collect();
            assert_eq!(union, jd_skills);
        }
    }

    #[test]
    fn test_cap_enforced() {
        for jd in [BENEFITS_JD, DRYWALL_JD, RECRUITING_MANAGER_JD, VAGUE_JD] {
            let r = report(RECRUITER_RESUME, jd);
            assert!(r.result.score <= r.gate.effective_cap);
            assert!(r.result.score >= 0.0);
            for raw in [0.0, 33.3, 80.0, 100.0, 250.0] {
                assert!(apply_gate(raw, &r.gate) <= r.gate.effective_cap);
            }
        }
    }

    #[test]
    fn test_unrelated_domain_suppressed() {
        let r = report(RECRUITER_RESUME, DRYWALL_JD);
        assert_eq!(r.gate.resume_soc, SocGroup::Recruiting);
        assert_eq!(r.gate.jd_soc, SocGroup::ConstructionTrades);
        assert_eq!(r.gate.role_alignment_band, AlignmentBand::Unrelated);
        assert!(apply_gate(SIMULATED_RAW, &r.gate) < 15.0);
        assert!(r.result.score < 15.0);
        assert_eq!(
            r.gate.hard_must_haves_missing,
            vec!["OSHA 10".to_string(), "Driver's License".to_string()]
        );
        assert!(r.result.top_gaps[0].starts_with("Missing required credential"));
    }

    #[test]
    fn test_adjacent_domain_partially_suppressed() {
        let r = report(RECRUITER_RESUME, BENEFITS_JD);
        assert_eq!(r.gate.jd_soc, SocGroup::HrBenefits);
        assert_eq!(r.gate.role_alignment_band, AlignmentBand::Adjacent);
        let gated = apply_gate(SIMULATED_RAW, &r.gate);
        assert!((25.0..=40.0).contains(&gated), "gated {gated}");
    }

    #[test]
    fn test_matched_domain_passes_through() {
        let r = report(RECRUITER_RESUME, RECRUITING_MANAGER_JD);
        assert_eq!(r.gate.role_alignment_band, AlignmentBand::Match);
        assert_eq!(r.gate.effective_cap, 100.0);
        assert_eq!(apply_gate(SIMULATED_RAW, &r.gate), SIMULATED_RAW);
        assert!(r.result.score >= 75.0, "score {}", r.result.score);
        assert_eq!(r.band, ScoreBand::Strong);
        assert!(r.result.missing_skills.is_empty());
        assert_eq!(r.result.seniority_flag, None);
    }

    #[test]
    fn test_vacuous_must_haves() {
        let r = report(RECRUITER_RESUME, VAGUE_JD);
        assert_eq!(r.gate.must_have_total, 0);
        assert_eq!(r.gate.must_have_coverage, 100.0);
        assert_eq!(r.gate.must_have_cap, 100.0);
    }

    #[test]
    fn test_gate_monotonic_in_band() {
        // same documents, adjacency table emptied: adjacent pair becomes unrelated
        let mut strict = ScoringConfig::default();
        strict.alignment.adjacent_pairs.clear();
        let strict = MatchEngine::new(taxonomy(), Arc::new(strict));
        let req = MatchRequest {
            resume_text: RECRUITER_RESUME,
            jd_text: BENEFITS_JD,
            ..Default::default()
        };
        let loose = engine().evaluate(&req).unwrap();
        let tight = strict.evaluate(&req).unwrap();
        assert_eq!(tight.gate.role_alignment_band, AlignmentBand::Unrelated);
        assert!(apply_gate(SIMULATED_RAW, &tight.gate) <= apply_gate(SIMULATED_RAW, &loose.gate));
        assert!(tight.result.score <= loose.result.score);
    }

    #[test]
    fn test_semantic_blend() {
        let v = vec![0.5_f32, 0.5, 0.0];
        let e = engine();
        let r = e
            .evaluate(&MatchRequest {
                resume_text: RECRUITER_RESUME,
                jd_text: RECRUITING_MANAGER_JD,
                resume_embedding: Some(&v),
                jd_embedding: Some(&v),
                inferred_skills: &[],
            })
            .unwrap();
        assert_eq!(r.result.semantic_score, Some(100.0));
        // 0.6 * keyword + 0.4 * 100
        let expected = 0.6 * r.result.keyword_score + 40.0;
        assert!((r.raw_score - expected).abs() < 0.11);
    }

    #[test]
    fn test_mismatched_embeddings_fall_back() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![1.0_f32, 0.0, 0.0];
        let result = score(&engine(), RECRUITER_RESUME, BENEFITS_JD, Some(&a), Some(&b)).unwrap();
        assert_eq!(result.semantic_score, None);
    }

    #[test]
    fn test_inferred_skills_count_partially() {
        let jd = "Requirements\n- Payroll processing experience required.\n- Workday experience required.";
        let resume = "Recruiter using Workday daily and handling compensation questions for new hires in our staffing firm.";
        let inferred = vec![InferredSkill {
            skill: "Payroll".to_string(),
            similarity: 0.9,
        }];

        let e = engine();
        let plain = e
            .evaluate(&MatchRequest {
                resume_text: resume,
                jd_text: jd,
                ..Default::default()
            })
            .unwrap();
        let enriched = e
            .evaluate(&MatchRequest {
                resume_text: resume,
                jd_text: jd,
                inferred_skills: &inferred,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(plain.result.keyword_score, 50.0);
        assert_eq!(enriched.result.keyword_score, 80.0);
        assert!(enriched.result.matched_skills.contains(&"Payroll".to_string()));
        assert!(enriched.must_haves.iter().all(|m| m.met));
        assert_eq!(enriched.inferred_skills.len(), 1);
    }

    #[test]
    fn test_unknown_inferred_skill_ignored() {
        let inferred = vec![InferredSkill {
            skill: "Basket Weaving".to_string(),
            similarity: 0.99,
        }];
        let r = engine()
            .evaluate(&MatchRequest {
                resume_text: RECRUITER_RESUME,
                jd_text: BENEFITS_JD,
                inferred_skills: &inferred,
                ..Default::default()
            })
            .unwrap();
        assert!(r.inferred_skills.is_empty());
    }

    #[test]
    fn test_seniority_flags() {
        let e = engine();
        assert_eq!(e.seniority_flag(Some(2.0), Some(5.0)), Some(SeniorityFlag::Underqualified));
        assert_eq!(e.seniority_flag(Some(4.0), Some(5.0)), None);
        assert_eq!(e.seniority_flag(Some(20.0), Some(5.0)), Some(SeniorityFlag::Overqualified));
        assert_eq!(e.seniority_flag(None, Some(5.0)), None);
        assert_eq!(e.seniority_flag(Some(5.0), None), None);
    }

    #[test]
    fn test_required_years_from_title_when_unstated() {
        let jd = "Job Title: Director of Talent Acquisition\nLead our recruiting organization and talent acquisition strategy.";
        let resume = "Recruiter with 3 years of full-cycle recruiting and candidate sourcing experience at a staffing agency.";
        let r = report(resume, jd);
        assert_eq!(r.required_years, Some(10.0));
        assert_eq!(r.result.seniority_flag, Some(SeniorityFlag::Underqualified));
    }

    #[test]
    fn test_top_gaps_limited_and_ordered() {
        let r = report(RECRUITER_RESUME, DRYWALL_JD);
        assert!(r.result.top_gaps.len() <= ScoringConfig::default().engine.top_gaps_limit);
        assert!(r.result.missing_skills.len() >= r.result.top_gaps.len());
        assert!(r.result.top_gaps[1].contains("Driver's License") || r.result.top_gaps[1].contains("OSHA 10"));
    }
}
