//! Lexical matching of recognized text against target sentences.
//!
//! Two tiers: a Dice-coefficient bigram similarity over the whole target
//! set, then a literal substring fallback for utterances that embed a
//! target inside extra words ("i said hello there" still counts for
//! "hello").

use std::collections::HashMap;

use serde::Serialize;

/// The ordered, normalized target sentences of the active exercise.
///
/// Built wholesale whenever the learner switches exercises; sentences are
/// lower-cased on construction so matching never re-folds them.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    sentences: Vec<String>,
}

impl TargetSet {
    pub fn new<I, S>(sentences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            sentences: sentences
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.sentences.iter().map(String::as_str)
    }
}

/// Outcome of comparing one recognized text to the target set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Whether one of the targets was satisfied.
    #[serde(rename = "match")]
    pub matched: bool,
    /// Similarity in percent (0-100); 100 for substring-tier matches.
    pub score: u8,
    /// The target the score refers to, if any was scanned.
    pub target: Option<String>,
}

impl MatchResult {
    fn none() -> Self {
        Self { matched: false, score: 0, target: None }
    }
}

/// Compare `text` against `targets`.
///
/// Tier 1 scores every target with a bigram similarity and accepts the best
/// one at or above `threshold` percent (ties keep the first-encountered
/// target). Tier 2, only reached when tier 1 misses, accepts the first
/// target contained verbatim in the lower-cased text with a score of 100.
/// Otherwise the best tier-1 result is returned unmatched. Pure function,
/// aside from case folding.
pub fn match_hypothesis(text: &str, targets: &TargetSet, threshold: u8) -> MatchResult {
    if text.is_empty() || targets.is_empty() {
        return MatchResult::none();
    }

    let normalized = text.to_lowercase();

    let mut best_score = 0u8;
    let mut best_target: Option<&str> = None;
    for target in targets.iter() {
        let score = (dice_similarity(&normalized, target) * 100.0).round() as u8;
        // strictly greater: ties keep the first-encountered target
        if best_target.is_none() || score > best_score {
            best_score = score;
            best_target = Some(target);
        }
    }

    if best_score >= threshold {
        return MatchResult {
            matched: true,
            score: best_score,
            target: best_target.map(str::to_string),
        };
    }

    for target in targets.iter() {
        if normalized.contains(target) {
            return MatchResult {
                matched: true,
                score: 100,
                target: Some(target.to_string()),
            };
        }
    }

    MatchResult {
        matched: false,
        score: best_score,
        target: best_target.map(str::to_string),
    }
}

/// Dice coefficient over character bigrams, whitespace stripped.
///
/// Identical strings score 1.0; strings shorter than one bigram score 0.0.
/// Bigrams are counted as a multiset, so repeated pairs only match as often
/// as they occur in both strings.
fn dice_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().filter(|c| !c.is_whitespace()).collect();
    let b: Vec<char> = b.chars().filter(|c| !c.is_whitespace()).collect();

    if a == b {
        return if a.is_empty() { 0.0 } else { 1.0 };
    }
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let mut counts: HashMap<(char, char), usize> = HashMap::new();
    for pair in a.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }

    let mut shared = 0usize;
    for pair in b.windows(2) {
        if let Some(count) = counts.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                shared += 1;
            }
        }
    }

    2.0 * shared as f64 / (a.len() - 1 + b.len() - 1) as f64
}
