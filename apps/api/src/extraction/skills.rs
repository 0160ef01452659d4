//! Skill Extractor: maps free text onto canonical taxonomy skills.
//!
//! Deterministic and side-effect free. Every occurrence of a recognized
//! surface form bumps that skill's weight (capped at 10); the category comes
//! from the taxonomy entry. Also extracts the JD's must-have requirements.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extraction::taxonomy::{tokenize, SkillCategory, Taxonomy};

pub const MAX_SKILL_WEIGHT: u8 = 10;

/// Below this many characters a document carries too little signal to trust
/// its skill map. Still extracted, never rejected.
pub const MIN_INFORMATIVE_CHARS: usize = 100;

/// One recognized skill in one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub skill: String,
    pub weight: u8,
    pub category: SkillCategory,
}

/// Canonical skill name → entry. Ordered so repeated calls serialize identically.
pub type SkillMap = BTreeMap<String, SkillEntry>;

/// Empty or whitespace-only text yields an empty map.
pub fn extract_skills(taxonomy: &Taxonomy, text: &str) -> SkillMap {
    let mut skills = SkillMap::new();
    if text.trim().is_empty() {
        return skills;
    }

    let tokens = tokenize(text);
    for hit in taxonomy.skill_index().scan(&tokens) {
        let entry = taxonomy.skill_entry(hit.id);
        skills
            .entry(entry.skill.clone())
            .and_modify(|e| e.weight = (e.weight + 1).min(MAX_SKILL_WEIGHT))
            .or_insert_with(|| SkillEntry {
                skill: entry.skill.clone(),
                weight: 1,
                category: entry.category,
            });
    }

    debug!(
        "Extracted {} skills from {} chars (taxonomy v{})",
        skills.len(),
        text.len(),
        taxonomy.version()
    );
    skills
}

pub fn is_low_signal(text: &str) -> bool {
    text.trim().chars().count() < MIN_INFORMATIVE_CHARS
}

// ────────────────────────────────────────────────────────────────────────────
// Must-have requirements
// ────────────────────────────────────────────────────────────────────────────

/// A JD requirement expressed as a taxonomy skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MustHave {
    pub skill: String,
    /// Credential demanded with a strict cue. Missing it nearly zeroes the gate.
    pub hard: bool,
}

/// Must-haves plus the bookkeeping the coverage-confidence signal needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementProfile {
    pub must_haves: Vec<MustHave>,
    /// Lines identified as stating a requirement.
    pub requirement_lines: usize,
    /// Requirement lines where at least one taxonomy skill was recognized.
    pub evaluable_lines: usize,
    /// True when no requirement line existed and must-haves were taken from
    /// the JD's highest-weight skills instead.
    pub inferred_from_weights: bool,
}

const REQUIREMENT_CUES: &[&str] = &[
    "required",
    "requirement",
    "requirements",
    "require",
    "requires",
    "must",
    "minimum",
    "qualifications",
    "qualification",
    "need",
    "mandatory",
    "essential",
    "proficiency",
    "proficient",
];

const STRICT_CUES: &[&str] = &["required", "must", "mandatory", "requires"];

const OPTIONAL_SECTION_CUES: &[&str] = &[
    "preferred",
    "nice",
    "bonus",
    "plus",
    "responsibilities",
    "about",
    "benefits",
    "perks",
    "duties",
];

/// Headings that close a requirements block without opening another.
const NEUTRAL_SECTION_CUES: &[&str] = &[
    "overview",
    "summary",
    "description",
    "company",
    "offer",
    "do",
    "role",
    "team",
    "culture",
    "apply",
    "schedule",
    "compensation",
    "salary",
    "pay",
    "location",
];

const MAX_HEADER_TOKENS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Neutral,
    Required,
    Optional,
}

/// Identifies requirement lines (by cue word or by sitting under a
/// requirements header) and maps their skills to must-haves.
///
/// A JD without any requirement line falls back to its top
/// `fallback_count` skills by weight. A JD with no recognized skills has no
/// must-haves at all.
pub fn extract_requirements(
    taxonomy: &Taxonomy,
    jd_text: &str,
    jd_skills: &SkillMap,
    fallback_count: usize,
) -> RequirementProfile {
    let mut profile = RequirementProfile::default();
    let mut section = Section::Neutral;

    for line in split_lines(jd_text) {
        let tokens = tokenize(line.text);
        if tokens.is_empty() {
            continue;
        }
        let hits = taxonomy.skill_index().scan(&tokens);

        if is_header(&line, &tokens, !hits.is_empty()) {
            // "Preferred Qualifications" is optional despite "qualifications"
            section = if has_cue(&tokens, OPTIONAL_SECTION_CUES) {
                Section::Optional
            } else if has_cue(&tokens, REQUIREMENT_CUES) {
                Section::Required
            } else {
                Section::Neutral
            };
            continue;
        }

        let cued = has_cue(&tokens, REQUIREMENT_CUES);
        let is_requirement = match section {
            Section::Required => true,
            // "Experience with X is a plus" under Preferred stays optional
            Section::Optional => false,
            Section::Neutral => cued,
        };
        if !is_requirement {
            continue;
        }

        profile.requirement_lines += 1;
        let strict = has_cue(&tokens, STRICT_CUES);
        if !hits.is_empty() {
            profile.evaluable_lines += 1;
        }

        for hit in hits {
            let entry = taxonomy.skill_entry(hit.id);
            let hard = entry.credential && strict;
            match profile
                .must_haves
                .iter_mut()
                .find(|m| m.skill == entry.skill)
            {
                Some(existing) => existing.hard |= hard,
                None => profile.must_haves.push(MustHave {
                    skill: entry.skill.clone(),
                    hard,
                }),
            }
        }
    }

    if profile.requirement_lines == 0 && !jd_skills.is_empty() {
        profile.inferred_from_weights = true;
        profile.must_haves = top_skills_by_weight(jd_skills, fallback_count)
            .into_iter()
            .map(|skill| MustHave { skill, hard: false })
            .collect();
    }

    profile
}

/// Skill names ordered by weight descending, name ascending on ties.
pub fn top_skills_by_weight(skills: &SkillMap, limit: usize) -> Vec<String> {
    let mut ranked: Vec<&SkillEntry> = skills.values().collect();
    ranked.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.skill.cmp(&b.skill)));
    ranked
        .into_iter()
        .take(limit)
        .map(|e| e.skill.clone())
        .collect()
}

struct JdLine<'a> {
    text: &'a str,
    bulleted: bool,
}

fn split_lines(text: &str) -> Vec<JdLine<'_>> {
    let mut lines = Vec::new();
    for raw in text.split(['\n', '\r', ';']) {
        for (i, piece) in raw.split('•').enumerate() {
            for sentence in piece.split(". ") {
                let trimmed = sentence.trim();
                let stripped = trimmed.trim_start_matches(['-', '*']).trim();
                if stripped.is_empty() {
                    continue;
                }
                lines.push(JdLine {
                    text: stripped,
                    bulleted: i > 0 || trimmed.starts_with(['-', '*']),
                });
            }
        }
    }
    lines
}

/// Short, unpunctuated, non-bullet lines carrying a section cue open a
/// section. Lines naming skills ("Python required") are always content, and
/// cue-less short lines ("Great attitude") never end the current section.
fn is_header(line: &JdLine<'_>, tokens: &[String], has_skills: bool) -> bool {
    if has_skills
        || line.bulleted
        || tokens.len() > MAX_HEADER_TOKENS
        || line.text.ends_with('.')
        || tokens.iter().any(|t| t.chars().any(|c| c.is_ascii_digit()))
    {
        return false;
    }
    has_cue(tokens, REQUIREMENT_CUES)
        || has_cue(tokens, OPTIONAL_SECTION_CUES)
        || has_cue(tokens, NEUTRAL_SECTION_CUES)
}

fn has_cue(tokens: &[String], cues: &[&str]) -> bool {
    tokens.iter().any(|t| cues.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::{taxonomy, BENEFITS_JD, DRYWALL_JD, RECRUITER_RESUME};

    #[test]
    fn test_empty_text_yields_empty_map() {
        let tax = taxonomy();
        assert!(extract_skills(&tax, "").is_empty());
        assert!(extract_skills(&tax, "   \n\t ").is_empty());
    }

    #[test]
    fn test_repeated_mentions_raise_weight_not_entries() {
        let tax = taxonomy();
        let skills = extract_skills(&tax, "Python, python3 and more Python. Also Docker.");
        assert_eq!(skills.len(), 2);
        assert_eq!(skills["Python"].weight, 3);
        assert_eq!(skills["Python"].category, SkillCategory::Technology);
        assert_eq!(skills["Docker"].weight, 1);
    }

    #[test]
    fn test_weight_capped_at_ten() {
        let tax = taxonomy();
        let text = "kafka ".repeat(25);
        assert_eq!(extract_skills(&tax, &text)["Kafka"].weight, MAX_SKILL_WEIGHT);
    }

    #[test]
    fn test_synonyms_map_to_canonical_name() {
        let tax = taxonomy();
        let skills = extract_skills(&tax, "Ran k8s clusters and reviewed Postgres schemas");
        assert!(skills.contains_key("Kubernetes"));
        assert!(skills.contains_key("PostgreSQL"));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let tax = taxonomy();
        assert_eq!(
            extract_skills(&tax, RECRUITER_RESUME),
            extract_skills(&tax, RECRUITER_RESUME)
        );
    }

    #[test]
    fn test_recruiter_resume_skills() {
        let tax = taxonomy();
        let skills = extract_skills(&tax, RECRUITER_RESUME);
        for expected in [
            "Full-Cycle Recruiting",
            "Talent Acquisition",
            "Candidate Sourcing",
            "Boolean Search",
            "Greenhouse",
            "Applicant Tracking Systems",
            "Offer Negotiation",
        ] {
            assert!(skills.contains_key(expected), "missing {expected}");
        }
        assert!(!skills.contains_key("Drywall Installation"));
    }

    #[test]
    fn test_malformed_text_does_not_panic() {
        let tax = taxonomy();
        let skills = extract_skills(&tax, "\u{0}\u{feff}####++//..--'' 😀 c++c++");
        assert!(skills.len() <= 1);
    }

    #[test]
    fn test_low_signal_threshold() {
        assert!(is_low_signal("Recruiter."));
        assert!(!is_low_signal(RECRUITER_RESUME));
    }

    #[test]
    fn test_requirements_section_and_hard_credentials() {
        let tax = taxonomy();
        let jd_skills = extract_skills(&tax, DRYWALL_JD);
        let profile = extract_requirements(&tax, DRYWALL_JD, &jd_skills, 5);

        let names: Vec<&str> = profile.must_haves.iter().map(|m| m.skill.as_str()).collect();
        assert!(names.contains(&"Drywall Installation"));
        assert!(names.contains(&"Framing"));
        assert!(names.contains(&"Blueprint Reading"));

        let hard: Vec<&str> = profile
            .must_haves
            .iter()
            .filter(|m| m.hard)
            .map(|m| m.skill.as_str())
            .collect();
        assert_eq!(hard, vec!["OSHA 10", "Driver's License"]);
        assert!(!profile.inferred_from_weights);
    }

    #[test]
    fn test_responsibilities_are_not_must_haves() {
        let tax = taxonomy();
        let jd_skills = extract_skills(&tax, BENEFITS_JD);
        let profile = extract_requirements(&tax, BENEFITS_JD, &jd_skills, 5);
        let names: Vec<&str> = profile.must_haves.iter().map(|m| m.skill.as_str()).collect();

        assert!(names.contains(&"Benefits Administration"));
        assert!(names.contains(&"ERISA"));
        // only mentioned under Responsibilities
        assert!(!names.contains(&"Open Enrollment"));
        assert!(!names.contains(&"Payroll"));
        assert_eq!(profile.requirement_lines, profile.evaluable_lines);
    }

    #[test]
    fn test_preferred_section_is_optional() {
        let tax = taxonomy();
        let jd = "Requirements\n- Python required.\n\nPreferred\n- Kafka experience is a plus.";
        let skills = extract_skills(&tax, jd);
        let profile = extract_requirements(&tax, jd, &skills, 5);
        assert_eq!(
            profile.must_haves,
            vec![MustHave {
                skill: "Python".to_string(),
                hard: false
            }]
        );
    }

    #[test]
    fn test_preferred_qualifications_header_is_optional() {
        let tax = taxonomy();
        let jd = "Minimum Qualifications\n- SQL\nPreferred Qualifications\n- Tableau";
        let skills = extract_skills(&tax, jd);
        let profile = extract_requirements(&tax, jd, &skills, 5);
        let names: Vec<&str> = profile.must_haves.iter().map(|m| m.skill.as_str()).collect();
        assert_eq!(names, vec!["SQL"]);
    }

    #[test]
    fn test_short_unbulleted_lines_stay_in_requirements_block() {
        let tax = taxonomy();
        let jd = "Requirements\nPython experience\nGreat attitude\nSQL experience\nDocker experience";
        let skills = extract_skills(&tax, jd);
        let profile = extract_requirements(&tax, jd, &skills, 5);
        let names: Vec<&str> = profile.must_haves.iter().map(|m| m.skill.as_str()).collect();
        assert_eq!(names, vec!["Python", "SQL", "Docker"]);
        assert!(!profile.inferred_from_weights);
    }

    #[test]
    fn test_cued_heading_closes_requirements_block() {
        let tax = taxonomy();
        let jd = "Requirements\n- Python\nWhat you'll do\n- Kafka pipelines\nRequired skills\n- SQL";
        let skills = extract_skills(&tax, jd);
        let profile = extract_requirements(&tax, jd, &skills, 5);
        let names: Vec<&str> = profile.must_haves.iter().map(|m| m.skill.as_str()).collect();
        assert_eq!(names, vec!["Python", "SQL"]);
    }

    #[test]
    fn test_short_skill_line_with_cue_is_a_requirement() {
        let tax = taxonomy();
        let jd = "Python required";
        let skills = extract_skills(&tax, jd);
        let profile = extract_requirements(&tax, jd, &skills, 5);
        assert_eq!(profile.requirement_lines, 1);
        assert_eq!(profile.must_haves.len(), 1);
        assert_eq!(profile.must_haves[0].skill, "Python");
    }

    #[test]
    fn test_no_requirement_lines_falls_back_to_top_weights() {
        let tax = taxonomy();
        let jd = "We build with Rust and Rust and Rust, plus Kafka and Docker and Redis.";
        let skills = extract_skills(&tax, jd);
        let profile = extract_requirements(&tax, jd, &skills, 2);
        assert!(profile.inferred_from_weights);
        let names: Vec<&str> = profile.must_haves.iter().map(|m| m.skill.as_str()).collect();
        assert_eq!(names, vec!["Rust", "Docker"]);
    }

    #[test]
    fn test_jd_without_skills_has_no_must_haves() {
        let tax = taxonomy();
        let jd = "Join a friendly team. Must be punctual and reliable.";
        let skills = extract_skills(&tax, jd);
        let profile = extract_requirements(&tax, jd, &skills, 5);
        assert!(profile.must_haves.is_empty());
        assert_eq!(profile.requirement_lines, 1);
        assert_eq!(profile.evaluable_lines, 0);
    }
}
