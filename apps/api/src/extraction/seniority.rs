//! Seniority Extractor: years-of-experience estimate and leveling hints.
//!
//! Explicit claims ("8+ years") take precedence over summed date ranges.
//! Title-level hints are kept alongside the estimate and never override it;
//! the engine decides how the two combine.

use std::collections::BTreeSet;

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extraction::taxonomy::{tokenize, Taxonomy};

const MAX_PLAUSIBLE_YEARS: f64 = 50.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SenioritySignals {
    pub years_estimate: Option<f64>,
    pub level_hints: BTreeSet<String>,
}

static YEARS_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*(?:-|–|to)\s*(\d{1,2})\s*\+?\s*(?:years?|yrs?)\b")
        .expect("years range regex is valid")
});

static YEARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*\+?\s*(?:years?|yrs?)\b").expect("years regex is valid")
});

const MONTH: &str = r"(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+";

// groups: start month, start year, end month, end year
static DATE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:{MONTH})?((?:19|20)\d{{2}})\s*(?:-|–|—|to)\s*(?:{MONTH})?((?:19|20)\d{{2}}|present|current|now|today)\b"
    ))
    .expect("date range regex is valid")
});

/// Seniority signals as of the current calendar year.
pub fn extract_seniority(taxonomy: &Taxonomy, text: &str) -> SenioritySignals {
    extract_seniority_as_of(taxonomy, text, Utc::now().year())
}

pub fn extract_seniority_as_of(taxonomy: &Taxonomy, text: &str, current_year: i32) -> SenioritySignals {
    let years_estimate = explicit_years(text).or_else(|| summed_date_ranges(text, current_year));
    SenioritySignals {
        years_estimate,
        level_hints: level_hints(taxonomy, text),
    }
}

/// Largest explicit year count. Ranges ("3-5 years") contribute their lower bound.
fn explicit_years(text: &str) -> Option<f64> {
    let mut best: Option<f64> = None;
    let mut consider = |value: f64| {
        if value > 0.0 && value <= MAX_PLAUSIBLE_YEARS {
            best = Some(best.map_or(value, |b: f64| b.max(value)));
        }
    };

    let mut covered = Vec::new();
    for caps in YEARS_RANGE_RE.captures_iter(text) {
        if let (Some(whole), Some(low)) = (caps.get(0), caps.get(1)) {
            covered.push(whole.range());
            if let Ok(v) = low.as_str().parse::<f64>() {
                consider(v);
            }
        }
    }
    for caps in YEARS_RE.captures_iter(text) {
        let (Some(whole), Some(n)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        // the upper bound of "3-5 years" was already handled as a range
        if covered.iter().any(|r| r.contains(&whole.start())) {
            continue;
        }
        if let Ok(v) = n.as_str().parse::<f64>() {
            consider(v);
        }
    }
    best
}

/// Sum of date-range spans after merging overlaps, in years (one decimal).
///
/// Spans are counted in months. A start month counts from its first day and
/// an end month through its last, so "Jan 2019 - Dec 2019" is a full year.
/// Year-only bounds fall on January, keeping "2015 - 2020" at five years.
fn summed_date_ranges(text: &str, current_year: i32) -> Option<f64> {
    let mut spans: Vec<(i32, i32)> = DATE_RANGE_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let start_year: i32 = caps.get(2)?.as_str().parse().ok()?;
            let start_month = caps.get(1).and_then(|m| month_number(m.as_str()));
            let start = start_year * 12 + start_month.map_or(0, |m| m - 1);

            let end_year = caps.get(4)?.as_str().parse::<i32>().unwrap_or(current_year);
            let end_month = caps.get(3).and_then(|m| month_number(m.as_str()));
            let end = end_year * 12 + end_month.unwrap_or(0);

            let plausible = start <= end
                && end_year <= current_year
                && f64::from(end - start) <= MAX_PLAUSIBLE_YEARS * 12.0;
            plausible.then_some((start, end))
        })
        .collect();

    if spans.is_empty() {
        return None;
    }

    spans.sort_unstable();
    let mut months = 0;
    let (mut cur_start, mut cur_end) = spans[0];
    for &(start, end) in &spans[1..] {
        if start <= cur_end {
            cur_end = cur_end.max(end);
        } else {
            months += cur_end - cur_start;
            cur_start = start;
            cur_end = end;
        }
    }
    months += cur_end - cur_start;

    Some((f64::from(months) / 12.0 * 10.0).round() / 10.0)
}

fn month_number(name: &str) -> Option<i32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Scans the text as tokenized and again with hyphenated tokens split, so
/// "VP-track" finds `vp` while "mid-level" still matches as one alias.
fn level_hints(taxonomy: &Taxonomy, text: &str) -> BTreeSet<String> {
    let tokens = tokenize(text);
    let split: Vec<String> = tokens
        .iter()
        .flat_map(|t| t.split('-'))
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect();

    [tokens, split]
        .iter()
        .flat_map(|tokens| taxonomy.level_index().scan(tokens))
        .map(|hit| taxonomy.level_terms()[hit.id].level.clone())
        .collect()
}

/// Highest experience level implied by a set of hints, in years.
pub fn implied_years(taxonomy: &Taxonomy, hints: &BTreeSet<String>) -> Option<f64> {
    taxonomy
        .level_terms()
        .iter()
        .filter(|t| hints.contains(&t.level))
        .map(|t| t.implied_years)
        .fold(None, |acc: Option<f64>, y| Some(acc.map_or(y, |a| a.max(y))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::{taxonomy, RECRUITER_RESUME};

    #[test]
    fn test_explicit_years() {
        let s = extract_seniority_as_of(&taxonomy(), "Engineer with 8+ years of Rust", 2026);
        assert_eq!(s.years_estimate, Some(8.0));
    }

    #[test]
    fn test_explicit_range_uses_lower_bound() {
        let s = extract_seniority_as_of(&taxonomy(), "Looking for 3-5 years experience", 2026);
        assert_eq!(s.years_estimate, Some(3.0));
    }

    #[test]
    fn test_multiple_claims_take_largest() {
        let text = "5+ years of recruiting, including 2 years managing a team";
        let s = extract_seniority_as_of(&taxonomy(), text, 2026);
        assert_eq!(s.years_estimate, Some(5.0));
    }

    #[test]
    fn test_numbers_inside_larger_numbers_ignored() {
        let s = extract_seniority_as_of(&taxonomy(), "Placed 120 years-worth of hires", 2026);
        assert_eq!(s.years_estimate, None);
    }

    #[test]
    fn test_date_ranges_merged_and_summed() {
        let text = "Acme, Jan 2015 - Mar 2018\nGlobex, 2017 to 2020\nInitech, 2022 - Present";
        let s = extract_seniority_as_of(&taxonomy(), text, 2026);
        // [2015, 2020] + [2022, 2026]
        assert_eq!(s.years_estimate, Some(9.0));
    }

    #[test]
    fn test_explicit_claim_beats_ranges() {
        // resume says 8+, ranges 2016–2026 sum to 10
        let s = extract_seniority_as_of(&taxonomy(), RECRUITER_RESUME, 2026);
        assert_eq!(s.years_estimate, Some(8.0));
        assert!(s.level_hints.contains("senior"));
    }

    #[test]
    fn test_conflicting_signals_both_retained() {
        let s = extract_seniority_as_of(&taxonomy(), "Director of Talent. 5+ years experience.", 2026);
        assert_eq!(s.years_estimate, Some(5.0));
        assert!(s.level_hints.contains("director"));
    }

    #[test]
    fn test_level_hints_are_a_set() {
        let s = extract_seniority_as_of(&taxonomy(), "Senior engineer, senior mentor, senior-level IC", 2026);
        assert_eq!(
            s.level_hints.iter().cloned().collect::<Vec<_>>(),
            vec!["senior".to_string()]
        );
    }

    #[test]
    fn test_hyphenated_level_terms_detected() {
        let s = extract_seniority_as_of(&taxonomy(), "Senior manager on a VP-track, mid-level team", 2026);
        assert!(s.level_hints.contains("vp"));
        assert!(s.level_hints.contains("senior"));
        assert!(s.level_hints.contains("mid"));
    }

    #[test]
    fn test_month_bounds_count_within_a_year() {
        let s = extract_seniority_as_of(&taxonomy(), "Acme, Jan 2019 - Dec 2019", 2026);
        assert_eq!(s.years_estimate, Some(1.0));

        let s = extract_seniority_as_of(&taxonomy(), "Globex, Sept. 2020 to Feb 2021", 2026);
        assert_eq!(s.years_estimate, Some(0.5));
    }

    #[test]
    fn test_year_only_ranges_keep_whole_years() {
        let s = extract_seniority_as_of(&taxonomy(), "Initech 2015 - 2020", 2026);
        assert_eq!(s.years_estimate, Some(5.0));
    }

    #[test]
    fn test_no_signals() {
        let s = extract_seniority_as_of(&taxonomy(), "", 2026);
        assert_eq!(s, SenioritySignals::default());
    }

    #[test]
    fn test_future_ranges_ignored() {
        let s = extract_seniority_as_of(&taxonomy(), "Contract 2030 - 2032", 2026);
        assert_eq!(s.years_estimate, None);
    }

    #[test]
    fn test_implied_years_takes_highest_level() {
        let tax = taxonomy();
        let hints: BTreeSet<String> = ["senior", "director"].iter().map(|s| s.to_string()).collect();
        assert_eq!(implied_years(&tax, &hints), Some(10.0));
        assert_eq!(implied_years(&tax, &BTreeSet::new()), None);
    }
}
