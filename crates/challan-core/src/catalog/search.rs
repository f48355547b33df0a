//! Fuzzy search over catalog names.
//!
//! Scoring:
//! - Exact key: 1.0, key prefix: 0.99, other substring: 0.98
//! - Otherwise the best of whole-key and per-word similarity
//!   (Jaro-Winkler 60%, normalized Levenshtein 40%)
//!
//! Results below the index threshold are dropped.

use std::collections::{HashMap, HashSet};

use strsim::{jaro_winkler, normalized_levenshtein};

use crate::models::Procedure;

/// Default minimum similarity for a fuzzy hit.
pub const DEFAULT_THRESHOLD: f64 = 0.75;

/// Approximate-match index over arbitrary values.
#[derive(Debug, Clone)]
pub struct SearchIndex<T> {
    entries: Vec<(String, T)>,
    threshold: f64,
}

impl<T> SearchIndex<T> {
    /// Build an index, deriving each value's search key with `key_fn`.
    pub fn build<I, F>(items: I, key_fn: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> String,
    {
        let entries = items
            .into_iter()
            .map(|item| (key_fn(&item).to_lowercase(), item))
            .collect();
        Self {
            entries,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Override the similarity threshold (0.0 - 1.0).
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ranked matches for `text`, best first. Blank queries match nothing.
    pub fn query(&self, text: &str) -> Vec<&T> {
        self.query_scored(text)
            .into_iter()
            .map(|(item, _)| item)
            .collect()
    }

    /// Ranked matches with their similarity scores.
    pub fn query_scored(&self, text: &str) -> Vec<(&T, f64)> {
        let query = text.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(&T, f64)> = self
            .entries
            .iter()
            .map(|(key, item)| (item, score(&query, key)))
            .filter(|(_, s)| *s >= self.threshold)
            .collect();

        // Stable sort keeps insertion order among equal scores
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }
}

/// Score for an exact key match.
pub const EXACT_SCORE: f64 = 1.0;
/// Score when the key starts with the query.
pub const PREFIX_SCORE: f64 = 0.99;
/// Score when the query appears elsewhere in the key.
pub const SUBSTRING_SCORE: f64 = 0.98;

fn score(query: &str, key: &str) -> f64 {
    if key == query {
        return EXACT_SCORE;
    }
    if key.starts_with(query) {
        return PREFIX_SCORE;
    }
    if key.contains(query) {
        return SUBSTRING_SCORE;
    }

    let whole = fuzzy_match(query, key);
    let best_word = key
        .split_whitespace()
        .map(|word| fuzzy_match(query, word))
        .fold(0.0, f64::max);

    whole.max(best_word)
}

/// Compute fuzzy string similarity using combined metrics.
fn fuzzy_match(a: &str, b: &str) -> f64 {
    // Jaro-Winkler favours shared prefixes, Levenshtein overall similarity
    let jw = jaro_winkler(a, b);
    let lev = normalized_levenshtein(a, b);
    jw * 0.6 + lev * 0.4
}

/// The three search indices built over a decoded catalog.
#[derive(Debug, Clone)]
pub struct CatalogSearch {
    procedures: SearchIndex<String>,
    items: SearchIndex<String>,
    instruments: SearchIndex<String>,
    instrument_origins: HashMap<String, String>,
}

impl CatalogSearch {
    pub fn build(procedures: &[Procedure]) -> Self {
        let procedure_names = procedures.iter().map(|p| p.name.clone());

        let mut item_names = Vec::new();
        for procedure in procedures {
            for item in &procedure.items {
                item_names.push(item.raw.clone());
                item_names.push(item.name.clone());
            }
            for fixed in &procedure.fixed_items {
                item_names.push(fixed.name.clone());
            }
        }

        let mut instrument_origins = HashMap::new();
        let mut instrument_names = Vec::new();
        for procedure in procedures {
            for instrument in &procedure.instruments {
                if !instrument_origins.contains_key(instrument) {
                    instrument_origins.insert(instrument.clone(), procedure.name.clone());
                    instrument_names.push(instrument.clone());
                }
            }
        }

        Self {
            procedures: SearchIndex::build(procedure_names, String::clone),
            items: SearchIndex::build(dedup(item_names), String::clone),
            instruments: SearchIndex::build(instrument_names, String::clone),
            instrument_origins,
        }
    }

    pub fn with_threshold(self, threshold: f64) -> Self {
        Self {
            procedures: self.procedures.with_threshold(threshold),
            items: self.items.with_threshold(threshold),
            instruments: self.instruments.with_threshold(threshold),
            instrument_origins: self.instrument_origins,
        }
    }

    pub fn search_procedures(&self, text: &str) -> Vec<&String> {
        self.procedures.query(text)
    }

    pub fn search_items(&self, text: &str) -> Vec<&String> {
        self.items.query(text)
    }

    pub fn search_instruments(&self, text: &str) -> Vec<&String> {
        self.instruments.query(text)
    }

    /// First procedure in catalog order that lists `instrument`.
    pub fn instrument_origin(&self, instrument: &str) -> Option<&str> {
        self.instrument_origins.get(instrument).map(String::as_str)
    }
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_catalog_row;

    fn catalog() -> Vec<Procedure> {
        vec![
            parse_catalog_row(&[
                "Hip Replacement",
                "Screw {6mm:2, 8mm:1}|Plate",
                "Rod",
                "2",
                "Drill|Hammer",
            ]),
            parse_catalog_row(&[
                "Knee Arthroplasty",
                "Screw {4mm:1}",
                "Tibial Tray",
                "",
                "Hammer|Saw",
            ]),
        ]
    }

    #[test]
    fn test_empty_query() {
        let index = SearchIndex::build(vec!["Drill".to_string()], String::clone);
        assert!(index.query("").is_empty());
        assert!(index.query("   ").is_empty());
    }

    #[test]
    fn test_substring_match() {
        let search = CatalogSearch::build(&catalog());
        let hits = search.search_procedures("knee");
        assert_eq!(hits, vec!["Knee Arthroplasty"]);
    }

    #[test]
    fn test_typo_match() {
        let search = CatalogSearch::build(&catalog());
        let hits = search.search_instruments("hamer");
        assert_eq!(hits.first().map(|s| s.as_str()), Some("Hammer"));
        assert!(search.search_instruments("zzzz").is_empty());
    }

    #[test]
    fn test_ranking_exact_then_prefix_then_substring() {
        let index = SearchIndex::build(
            vec![
                "Bone Saw".to_string(),
                "Sawbones Kit".to_string(),
                "Saw".to_string(),
                "Awl".to_string(),
            ],
            String::clone,
        );
        let scored = index.query_scored("saw");
        assert_eq!(*scored[0].0, "Saw");
        assert_eq!(scored[0].1, EXACT_SCORE);
        assert_eq!(*scored[1].0, "Sawbones Kit");
        assert_eq!(scored[1].1, PREFIX_SCORE);
        assert_eq!(*scored[2].0, "Bone Saw");
        assert_eq!(scored[2].1, SUBSTRING_SCORE);
        assert!(scored.iter().all(|(_, s)| *s >= DEFAULT_THRESHOLD));
        assert!(scored.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_items_deduplicated_with_raw_and_base() {
        let search = CatalogSearch::build(&catalog());
        let hits = search.search_items("screw");
        let names: Vec<&str> = hits.iter().map(|s| s.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(names.iter().filter(|n| **n == "Screw").count(), 1);
        assert!(names.contains(&"Screw {6mm:2, 8mm:1}"));
        assert!(names.contains(&"Screw {4mm:1}"));
    }

    #[test]
    fn test_instrument_origin_first_wins() {
        let search = CatalogSearch::build(&catalog());
        assert_eq!(search.instrument_origin("Hammer"), Some("Hip Replacement"));
        assert_eq!(search.instrument_origin("Saw"), Some("Knee Arthroplasty"));
        assert_eq!(search.instrument_origin("Chisel"), None);
    }

    #[test]
    fn test_threshold_tunable() {
        let index = SearchIndex::build(vec!["Hammer".to_string()], String::clone);
        assert_eq!(index.query("hamer").len(), 1);

        let strict = index.with_threshold(0.99);
        assert!(strict.query("hamer").is_empty());
        assert_eq!(strict.query("ham").len(), 1);
    }
}
