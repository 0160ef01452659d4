//! Semantic Similarity: cosine over embedding vectors, plus skill discovery
//! against a precomputed skill-embedding table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::extraction::skills::SkillMap;

/// Cosine similarity in [-1, 1]. 0 when either norm is 0 or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        tracing::warn!(
            a_len = a.len(),
            b_len = b.len(),
            "embedding dimension mismatch; returning zero similarity"
        );
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Whole-document similarity on the 0–100 scale. Negative cosine counts as no overlap.
pub fn semantic_score(resume: &[f32], jd: &[f32]) -> f64 {
    cosine_similarity(resume, jd).clamp(0.0, 1.0) * 100.0
}

// ────────────────────────────────────────────────────────────────────────────
// Semantic skill discovery
// ────────────────────────────────────────────────────────────────────────────

/// Canonical skill name → embedding of that name, built once per process.
#[derive(Debug, Clone, Default)]
pub struct SkillEmbeddingTable {
    pub taxonomy_version: String,
    pub entries: Vec<(String, Vec<f32>)>,
}

impl SkillEmbeddingTable {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A skill not named in the text but close enough to some chunk of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredSkill {
    pub skill: String,
    pub similarity: f64,
}

/// Skills whose embedding clears `threshold` against any chunk, minus the
/// ones already present in `literal`. Sorted by similarity, best first.
pub fn discover_skills(
    chunk_vectors: &[Vec<f32>],
    skill_table: &SkillEmbeddingTable,
    threshold: f32,
    literal: &SkillMap,
) -> Vec<InferredSkill> {
    if skill_table.is_empty() || chunk_vectors.is_empty() {
        return Vec::new();
    }

    let mut best: BTreeMap<&str, f64> = BTreeMap::new();
    for (skill, skill_vec) in &skill_table.entries {
        if literal.contains_key(skill) {
            continue;
        }
        for chunk in chunk_vectors {
            let sim = cosine_similarity(chunk, skill_vec);
            if sim >= threshold as f64 {
                let slot = best.entry(skill.as_str()).or_insert(sim);
                *slot = slot.max(sim);
            }
        }
    }

    let mut inferred: Vec<InferredSkill> = best
        .into_iter()
        .map(|(skill, similarity)| InferredSkill {
            skill: skill.to_string(),
            similarity,
        })
        .collect();
    inferred.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.skill.cmp(&b.skill))
    });
    inferred
}

/// Splits text into paragraph-sized chunks of at most `max_chars` characters
/// for chunk-level embedding. Lines are never split.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines().map(str::trim) {
        let paragraph_break = line.is_empty();
        let overflow = current.chars().count() + line.chars().count() + 1 > max_chars;
        if (paragraph_break || overflow) && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if paragraph_break {
            continue;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::skills::SkillEntry;
    use crate::extraction::taxonomy::SkillCategory;

    #[test]
    fn test_identical_vectors() {
        let a = vec![0.3, 0.4, 0.5];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_orthogonal_and_opposite() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_norm_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_semantic_score_scale() {
        assert!((semantic_score(&[1.0, 1.0], &[2.0, 2.0]) - 100.0).abs() < 1e-9);
        assert_eq!(semantic_score(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    fn table() -> SkillEmbeddingTable {
        SkillEmbeddingTable {
            taxonomy_version: "test".to_string(),
            entries: vec![
                ("Payroll".to_string(), vec![1.0, 0.0, 0.0]),
                ("Onboarding".to_string(), vec![0.0, 1.0, 0.0]),
                ("Framing".to_string(), vec![0.0, 0.0, 1.0]),
            ],
        }
    }

    #[test]
    fn test_discover_skills_above_threshold() {
        let chunks = vec![vec![0.9, 0.1, 0.0], vec![0.1, 0.95, 0.0]];
        let found = discover_skills(&chunks, &table(), 0.8, &SkillMap::new());
        let names: Vec<&str> = found.iter().map(|s| s.skill.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Payroll"));
        assert!(names.contains(&"Onboarding"));
        assert!(found[0].similarity >= found[1].similarity);
    }

    #[test]
    fn test_discover_skills_skips_literal_matches() {
        let mut literal = SkillMap::new();
        literal.insert(
            "Payroll".to_string(),
            SkillEntry {
                skill: "Payroll".to_string(),
                weight: 1,
                category: SkillCategory::Skill,
            },
        );
        let found = discover_skills(&[vec![1.0, 0.0, 0.0]], &table(), 0.8, &literal);
        assert!(found.is_empty());
    }

    #[test]
    fn test_chunk_text_splits_paragraphs_and_long_runs() {
        let text = "line one\nline two\n\nline three\n".to_string() + &"x".repeat(30);
        let chunks = chunk_text(&text, 20);
        assert_eq!(chunks[0], "line one\nline two");
        assert_eq!(chunks[1], "line three");
        assert_eq!(chunks[2].len(), 30);
    }
}
