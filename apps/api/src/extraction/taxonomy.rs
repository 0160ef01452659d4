//! Taxonomy: the static vocabulary the extractors match against.
//!
//! The table lives outside the code as a versioned JSON artifact
//! (`data/taxonomy.json`). The built-in copy is compiled in; `TAXONOMY_PATH`
//! points the store at an external file that can be reloaded without a restart.
//!
//! Matching is token-sequence based: text and aliases go through the same
//! tokenizer, and the longest alias wins at each position.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::extraction::domain::SocGroup;

pub const BUILTIN_TAXONOMY: &str = include_str!("../../data/taxonomy.json");

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("failed to read taxonomy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("taxonomy JSON is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("taxonomy is invalid: {0}")]
    Invalid(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Data table
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Skill,
    Technology,
    Other,
}

/// One canonical skill and the surface forms that map to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub skill: String,
    pub category: SkillCategory,
    pub aliases: Vec<String>,
    /// Licenses and certifications. A credential demanded with a strict cue
    /// ("required", "must") becomes a hard must-have.
    #[serde(default)]
    pub credential: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocGroupVocabulary {
    pub group: SocGroup,
    pub keywords: Vec<String>,
    pub title_terms: Vec<String>,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelTerm {
    pub level: String,
    pub aliases: Vec<String>,
    pub implied_years: f64,
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    version: String,
    skills: Vec<TaxonomyEntry>,
    soc_groups: Vec<SocGroupVocabulary>,
    #[serde(default)]
    level_terms: Vec<LevelTerm>,
}

// ────────────────────────────────────────────────────────────────────────────
// Tokenizer + phrase index
// ────────────────────────────────────────────────────────────────────────────

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-z0-9+#]+(?:['./&-][a-z0-9+#]+)*").expect("token regex is valid")
});

/// Lowercases and splits text into match tokens. Keeps `c++`, `node.js`,
/// `ci/cd`, `shrm-cp` and `driver's` as single tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A phrase occurrence found by [`PhraseIndex::scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseHit {
    pub id: usize,
    pub start: usize,
    pub len: usize,
}

/// Multi-token phrase lookup keyed on the first token.
#[derive(Debug, Clone, Default)]
pub struct PhraseIndex {
    by_first: HashMap<String, Vec<(Vec<String>, usize)>>,
}

impl PhraseIndex {
    pub fn insert(&mut self, phrase: &str, id: usize) {
        let tokens = tokenize(phrase);
        let Some(first) = tokens.first().cloned() else {
            return;
        };
        let bucket = self.by_first.entry(first).or_default();
        bucket.push((tokens, id));
        // longest phrase first so "spring boot" beats "spring"
        bucket.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Non-overlapping, longest-first scan over a token stream.
    pub fn scan(&self, tokens: &[String]) -> Vec<PhraseHit> {
        let mut hits = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let matched = self.by_first.get(&tokens[i]).and_then(|candidates| {
                candidates.iter().find(|(phrase, _)| {
                    tokens.len() - i >= phrase.len() && tokens[i..i + phrase.len()] == phrase[..]
                })
            });
            match matched {
                Some((phrase, id)) => {
                    hits.push(PhraseHit {
                        id: *id,
                        start: i,
                        len: phrase.len(),
                    });
                    i += phrase.len();
                }
                None => i += 1,
            }
        }
        hits
    }

    /// True when any indexed phrase occurs in `tokens`.
    pub fn matches_any(&self, tokens: &[String]) -> bool {
        !self.scan(tokens).is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Taxonomy
// ────────────────────────────────────────────────────────────────────────────

/// Compiled, immutable taxonomy snapshot. Shared across calls behind an `Arc`.
#[derive(Debug)]
pub struct Taxonomy {
    version: String,
    skills: Vec<TaxonomyEntry>,
    skill_by_name: HashMap<String, usize>,
    skill_index: PhraseIndex,
    groups: Vec<CompiledGroup>,
    domain_terms: Vec<String>,
    domain_index: PhraseIndex,
    level_terms: Vec<LevelTerm>,
    level_index: PhraseIndex,
}

#[derive(Debug)]
pub struct CompiledGroup {
    pub group: SocGroup,
    pub keyword_index: PhraseIndex,
    pub title_index: PhraseIndex,
    pub domains: HashSet<String>,
}

impl Taxonomy {
    pub fn builtin() -> Result<Self, TaxonomyError> {
        Self::from_json(BUILTIN_TAXONOMY)
    }

    pub fn from_path(path: &Path) -> Result<Self, TaxonomyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, TaxonomyError> {
        let file: TaxonomyFile = serde_json::from_str(raw)?;
        Self::compile(file)
    }

    fn compile(file: TaxonomyFile) -> Result<Self, TaxonomyError> {
        if file.skills.is_empty() {
            return Err(TaxonomyError::Invalid("skills table is empty".to_string()));
        }

        let mut skill_by_name = HashMap::new();
        let mut seen_aliases: HashMap<Vec<String>, String> = HashMap::new();
        let mut skill_index = PhraseIndex::default();

        for (idx, entry) in file.skills.iter().enumerate() {
            if entry.skill.trim().is_empty() {
                return Err(TaxonomyError::Invalid(format!("skill #{idx} has no name")));
            }
            if skill_by_name.insert(entry.skill.clone(), idx).is_some() {
                return Err(TaxonomyError::Invalid(format!(
                    "duplicate canonical skill '{}'",
                    entry.skill
                )));
            }
            if entry.aliases.is_empty() {
                return Err(TaxonomyError::Invalid(format!(
                    "skill '{}' has no aliases",
                    entry.skill
                )));
            }
            for alias in &entry.aliases {
                let tokens = tokenize(alias);
                if tokens.is_empty() {
                    return Err(TaxonomyError::Invalid(format!(
                        "skill '{}' has an empty alias",
                        entry.skill
                    )));
                }
                if let Some(owner) = seen_aliases.insert(tokens, entry.skill.clone()) {
                    if owner != entry.skill {
                        return Err(TaxonomyError::Invalid(format!(
                            "alias '{alias}' maps to both '{owner}' and '{}'",
                            entry.skill
                        )));
                    }
                }
                skill_index.insert(alias, idx);
            }
        }

        let mut domain_terms = Vec::new();
        let mut domain_index = PhraseIndex::default();
        let mut groups = Vec::with_capacity(file.soc_groups.len());

        for vocab in file.soc_groups {
            if vocab.group == SocGroup::Unknown {
                return Err(TaxonomyError::Invalid(
                    "'unknown' cannot carry a vocabulary".to_string(),
                ));
            }
            let mut keyword_index = PhraseIndex::default();
            for (i, kw) in vocab.keywords.iter().enumerate() {
                keyword_index.insert(kw, i);
            }
            let mut title_index = PhraseIndex::default();
            for (i, term) in vocab.title_terms.iter().enumerate() {
                title_index.insert(term, i);
            }
            let mut domains = HashSet::new();
            for domain in &vocab.domains {
                let normalized = normalize_term(domain);
                if !domain_terms.contains(&normalized) {
                    domain_index.insert(&normalized, domain_terms.len());
                    domain_terms.push(normalized.clone());
                }
                domains.insert(normalized);
            }
            groups.push(CompiledGroup {
                group: vocab.group,
                keyword_index,
                title_index,
                domains,
            });
        }

        let mut level_index = PhraseIndex::default();
        for (idx, term) in file.level_terms.iter().enumerate() {
            for alias in &term.aliases {
                level_index.insert(alias, idx);
            }
        }

        Ok(Self {
            version: file.version,
            skills: file.skills,
            skill_by_name,
            skill_index,
            groups,
            domain_terms,
            domain_index,
            level_terms: file.level_terms,
            level_index,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn skills(&self) -> &[TaxonomyEntry] {
        &self.skills
    }

    pub fn skill_entry(&self, idx: usize) -> &TaxonomyEntry {
        &self.skills[idx]
    }

    pub fn entry(&self, skill: &str) -> Option<&TaxonomyEntry> {
        self.skill_by_name.get(skill).map(|&idx| &self.skills[idx])
    }

    pub fn skill_index(&self) -> &PhraseIndex {
        &self.skill_index
    }

    pub fn groups(&self) -> &[CompiledGroup] {
        &self.groups
    }

    pub fn domain_terms(&self) -> &[String] {
        &self.domain_terms
    }

    pub fn domain_index(&self) -> &PhraseIndex {
        &self.domain_index
    }

    pub fn level_terms(&self) -> &[LevelTerm] {
        &self.level_terms
    }

    pub fn level_index(&self) -> &PhraseIndex {
        &self.level_index
    }
}

/// Canonical form for domain/title comparison: lowercase tokens joined by one space.
pub fn normalize_term(term: &str) -> String {
    tokenize(term).join(" ")
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

/// Process-wide holder of the current taxonomy snapshot.
///
/// Callers take a snapshot with [`TaxonomyStore::current`] at the start of a
/// scoring call; a concurrent reload never changes the table mid-call.
pub struct TaxonomyStore {
    current: RwLock<Arc<Taxonomy>>,
    source: Option<PathBuf>,
}

impl TaxonomyStore {
    pub fn builtin() -> Result<Self, TaxonomyError> {
        Ok(Self {
            current: RwLock::new(Arc::new(Taxonomy::builtin()?)),
            source: None,
        })
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, TaxonomyError> {
        let path = path.into();
        let taxonomy = Taxonomy::from_path(&path)?;
        info!(
            "Loaded taxonomy v{} from {} ({} skills)",
            taxonomy.version(),
            path.display(),
            taxonomy.skills().len()
        );
        Ok(Self {
            current: RwLock::new(Arc::new(taxonomy)),
            source: Some(path),
        })
    }

    /// File the store reloads from; `None` for the built-in table.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn current(&self) -> Arc<Taxonomy> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-reads the source file and swaps it in. On failure the previous
    /// table stays active. The built-in table has nothing to reload from.
    pub fn reload(&self) -> Result<Arc<Taxonomy>, TaxonomyError> {
        let Some(path) = &self.source else {
            return Ok(self.current());
        };

        let fresh = match Taxonomy::from_path(path) {
            Ok(t) => Arc::new(t),
            Err(e) => {
                warn!("Taxonomy reload from {} failed, keeping current table: {e}", path.display());
                return Err(e);
            }
        };

        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = fresh.clone();
        info!("Taxonomy reloaded: v{}", fresh.version());
        Ok(fresh)
    }
}
