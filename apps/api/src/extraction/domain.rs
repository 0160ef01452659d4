//! Domain Classifier: buckets a document into one coarse occupational group.
//!
//! Weighted vote over three evidence sources: body keywords, extracted titles
//! and declared domain terms. A group only wins when it clears the minimum
//! score AND leads the runner-up by a clear margin; anything else is
//! `Unknown`. A confident wrong answer would loosen the gate, an honest
//! `Unknown` tightens it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extraction::taxonomy::{normalize_term, tokenize, Taxonomy};
use crate::matching::scoring_config::ClassifierConfig;

/// Coarse occupational cluster. `Unknown` is a real outcome, not a default match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocGroup {
    Recruiting,
    HrBenefits,
    ConstructionTrades,
    SoftwareEngineering,
    Healthcare,
    FinanceAccounting,
    SalesMarketing,
    #[default]
    Unknown,
}

impl SocGroup {
    pub fn is_known(self) -> bool {
        self != SocGroup::Unknown
    }

    pub fn label(self) -> &'static str {
        match self {
            SocGroup::Recruiting => "recruiting/talent acquisition",
            SocGroup::HrBenefits => "HR/benefits/compliance",
            SocGroup::ConstructionTrades => "construction trades",
            SocGroup::SoftwareEngineering => "software engineering",
            SocGroup::Healthcare => "healthcare",
            SocGroup::FinanceAccounting => "finance/accounting",
            SocGroup::SalesMarketing => "sales/marketing",
            SocGroup::Unknown => "unknown",
        }
    }
}

/// Classifier output with the per-group tallies kept for explanations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainClassification {
    pub group: SocGroup,
    pub scores: BTreeMap<SocGroup, f64>,
    pub reason: String,
}

pub fn classify_domain(
    taxonomy: &Taxonomy,
    config: &ClassifierConfig,
    text: &str,
    domains: &[String],
    titles: &[String],
) -> DomainClassification {
    let tokens = tokenize(text);
    let declared: Vec<String> = domains.iter().map(|d| normalize_term(d)).collect();
    let title_tokens: Vec<Vec<String>> = titles.iter().map(|t| tokenize(t)).collect();

    let mut scores = BTreeMap::new();
    for group in taxonomy.groups() {
        // keyword hits, each keyword capped so one repeated word cannot carry a group
        let mut per_keyword: BTreeMap<usize, u32> = BTreeMap::new();
        for hit in group.keyword_index.scan(&tokens) {
            *per_keyword.entry(hit.id).or_default() += 1;
        }
        let keyword_score: f64 = per_keyword
            .values()
            .map(|&n| n.min(config.keyword_hit_cap) as f64 * config.keyword_weight)
            .sum();

        let title_score = title_tokens
            .iter()
            .filter(|t| group.title_index.matches_any(t))
            .count() as f64
            * config.title_weight;

        let domain_score = declared
            .iter()
            .filter(|d| group.domains.contains(d.as_str()))
            .count() as f64
            * config.domain_weight;

        let total = keyword_score + title_score + domain_score;
        if total > 0.0 {
            scores.insert(group.group, total);
        }
    }

    let mut ranked: Vec<(SocGroup, f64)> = scores.iter().map(|(g, s)| (*g, *s)).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (group, reason) = match ranked.as_slice() {
        [] => (SocGroup::Unknown, "no occupational evidence found".to_string()),
        [(top, top_score), rest @ ..] => {
            let runner_up = rest.first().map(|(_, s)| *s).unwrap_or(0.0);
            if *top_score < config.min_score {
                (
                    SocGroup::Unknown,
                    format!(
                        "strongest group {} scored {top_score:.1}, below the {:.1} minimum",
                        top.label(),
                        config.min_score
                    ),
                )
            } else if top_score - runner_up < config.margin_ratio * top_score {
                (
                    SocGroup::Unknown,
                    format!(
                        "{} ({top_score:.1}) too close to runner-up ({runner_up:.1})",
                        top.label()
                    ),
                )
            } else {
                (
                    *top,
                    format!("{} leads with {top_score:.1} vs {runner_up:.1}", top.label()),
                )
            }
        }
    };

    debug!(group = ?group, %reason, "domain classified");

    DomainClassification {
        group,
        scores,
        reason,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Title / domain keyword extraction
// ────────────────────────────────────────────────────────────────────────────

const TITLE_LABELS: &[&str] = &["title:", "job title:", "position:", "role:"];
const MAX_TITLE_WORDS: usize = 8;

/// Pulls title-like strings: labelled values (`Title: ...`) and short lines
/// containing a known title term from any group.
pub fn extract_titles(taxonomy: &Taxonomy, text: &str) -> Vec<String> {
    let mut titles = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim().trim_start_matches(['-', '*', '•']).trim();
        if line.is_empty() {
            continue;
        }

        let lower = line.to_lowercase();
        if let Some(label) = TITLE_LABELS.iter().find(|l| lower.starts_with(*l)) {
            let value = line.get(label.len()..).unwrap_or("").trim();
            if !value.is_empty() {
                push_unique(&mut titles, value);
            }
            continue;
        }

        // "Senior Recruiter | Acme Corp | 2019 - Present" → first segment
        let head = line.split(['|', ',', '(']).next().unwrap_or(line).trim();
        let tokens = tokenize(head);
        if tokens.is_empty() || tokens.len() > MAX_TITLE_WORDS {
            continue;
        }
        if taxonomy
            .groups()
            .iter()
            .any(|g| g.title_index.matches_any(&tokens))
        {
            push_unique(&mut titles, head);
        }
    }

    titles
}

/// Domain terms from the taxonomy that occur anywhere in the text.
pub fn extract_domains(taxonomy: &Taxonomy, text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut found: Vec<String> = Vec::new();
    for hit in taxonomy.domain_index().scan(&tokens) {
        let term = &taxonomy.domain_terms()[hit.id];
        if !found.contains(term) {
            found.push(term.clone());
        }
    }
    found.sort();
    found
}

fn push_unique(titles: &mut Vec<String>, value: &str) {
    if !titles.iter().any(|t| t.eq_ignore_ascii_case(value)) {
        titles.push(value.to_string());
    }
}
