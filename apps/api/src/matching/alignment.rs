//! Role Alignment: resume group vs JD group, banded match / adjacent / unrelated.
//!
//! Known groups compare through the adjacency table. When either side is
//! `Unknown` the comparison falls back to declared-domain overlap, and thin
//! evidence resolves to "adjacent" rather than "match".

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::extraction::domain::SocGroup;
use crate::extraction::taxonomy::normalize_term;
use crate::matching::scoring_config::AlignmentConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentBand {
    Unrelated,
    Adjacent,
    Match,
}

impl AlignmentBand {
    pub fn as_str(self) -> &'static str {
        match self {
            AlignmentBand::Match => "match",
            AlignmentBand::Adjacent => "adjacent",
            AlignmentBand::Unrelated => "unrelated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAlignment {
    /// 0.0 – 1.0
    pub alignment: f64,
    pub band: AlignmentBand,
    /// True when the band came from domain overlap rather than SOC groups.
    pub from_domain_overlap: bool,
}

/// `alignment(resumeSOC, jdSOC, resumeDomains, jdDomains)`.
pub fn alignment(
    config: &AlignmentConfig,
    resume_soc: SocGroup,
    jd_soc: SocGroup,
    resume_domains: &[String],
    jd_domains: &[String],
) -> RoleAlignment {
    if resume_soc.is_known() && jd_soc.is_known() {
        let (alignment, band) = if resume_soc == jd_soc {
            (config.match_score, AlignmentBand::Match)
        } else if config.is_adjacent(resume_soc, jd_soc) {
            (config.adjacent_score, AlignmentBand::Adjacent)
        } else {
            (config.unrelated_score, AlignmentBand::Unrelated)
        };
        return RoleAlignment {
            alignment,
            band,
            from_domain_overlap: false,
        };
    }

    domain_overlap_alignment(config, resume_domains, jd_domains)
}

fn domain_overlap_alignment(
    config: &AlignmentConfig,
    resume_domains: &[String],
    jd_domains: &[String],
) -> RoleAlignment {
    let resume: BTreeSet<String> = resume_domains.iter().map(|d| normalize_term(d)).collect();
    let jd: BTreeSet<String> = jd_domains.iter().map(|d| normalize_term(d)).collect();

    // nothing to compare: neither evidence of fit nor of mismatch
    if resume.is_empty() || jd.is_empty() {
        return RoleAlignment {
            alignment: config.fallback_no_evidence_score,
            band: AlignmentBand::Adjacent,
            from_domain_overlap: true,
        };
    }

    let jaccard = jaccard(&resume, &jd);
    let enough_evidence = resume.len() >= config.fallback_match_min_domains
        && jd.len() >= config.fallback_match_min_domains;

    let (alignment, band) = if jaccard >= config.fallback_match_jaccard && enough_evidence {
        (config.match_score * config.fallback_match_discount, AlignmentBand::Match)
    } else if jaccard >= config.fallback_adjacent_jaccard {
        let scaled = config.fallback_no_evidence_score + jaccard * config.fallback_adjacent_slope;
        (scaled.min(config.adjacent_score.max(config.fallback_no_evidence_score)), AlignmentBand::Adjacent)
    } else {
        let scaled = config.unrelated_score * (jaccard / config.fallback_adjacent_jaccard.max(f64::EPSILON));
        (scaled.min(config.unrelated_score), AlignmentBand::Unrelated)
    };

    RoleAlignment {
        alignment,
        band,
        from_domain_overlap: true,
    }
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
