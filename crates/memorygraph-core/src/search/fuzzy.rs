//! Fuzzy text matcher.
//!
//! Turns a free-form query into an ordered list of `(pattern, weight)` pairs,
//! where each pattern is a LIKE/CONTAINS-compatible substring template and
//! the weight is in (0, 1]. Matching is lexical: a lightweight suffix stemmer
//! plus re-expansion of common morphological variants. No trigram similarity
//! yet; the `Fuzzy` mode is reserved for it and currently generates the same
//! patterns as `Normal`.

use serde::{Deserialize, Serialize};

/// Search tolerance modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tolerance {
    /// Exact substring match only
    Strict,
    /// Stemming plus variant expansion
    #[default]
    Normal,
    /// Same as `Normal`; room reserved for trigram similarity
    Fuzzy,
}

impl Tolerance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tolerance::Strict => "strict",
            Tolerance::Normal => "normal",
            Tolerance::Fuzzy => "fuzzy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Some(Tolerance::Strict),
            "normal" => Some(Tolerance::Normal),
            "fuzzy" => Some(Tolerance::Fuzzy),
            _ => None,
        }
    }
}

/// Minimum stem length; shorter results are rejected.
const MIN_STEM_LEN: usize = 3;

/// Stem a word by removing one common English suffix.
///
/// Handles plurals and verb tenses: `retries`/`retried` restore the `y`,
/// the remaining suffixes are stripped in order of specificity. Words of
/// three characters or fewer pass through unchanged.
pub fn stem(word: &str) -> String {
    let word = word.trim().to_lowercase();

    if word.len() <= MIN_STEM_LEN {
        return word;
    }

    // 'ied'/'ies' restore the y: retried -> retry, retries -> retry
    for suffix in ["ied", "ies"] {
        if word.ends_with(suffix) && word.len() > 4 {
            let mut candidate = word[..word.len() - 3].to_string();
            candidate.push('y');
            if candidate.len() >= MIN_STEM_LEN {
                return candidate;
            }
        }
    }

    // Remaining suffixes, ordered by specificity
    for suffix in ["es", "ing", "ed", "s"] {
        if let Some(candidate) = word.strip_suffix(suffix) {
            if candidate.len() >= MIN_STEM_LEN {
                return candidate.to_string();
            }
        }
    }

    word
}

/// Generate fuzzy search patterns for a query.
///
/// 1. The full lowercased query as `%query%` at weight 1.0.
/// 2. Each whitespace token of length >= 3 whose stem differs: `%stem%` at 0.8.
/// 3. For tokens of length >= 4, morphological variants whose stem matches
///    the token's stem: `%variant%` at 0.9.
///
/// Duplicates are removed preserving first occurrence. `Strict` mode stops
/// after rule 1.
pub fn patterns(query: &str, tolerance: Tolerance) -> Vec<(String, f64)> {
    let query_lower = query.trim().to_lowercase();
    let mut raw: Vec<(String, f64)> = vec![(format!("%{query_lower}%"), 1.0)];

    if tolerance != Tolerance::Strict {
        for word in query_lower.split_whitespace() {
            if word.len() <= 2 {
                continue;
            }

            let word_stem = stem(word);
            if word_stem != word && word_stem.len() >= MIN_STEM_LEN {
                raw.push((format!("%{word_stem}%"), 0.8));
                // 'es' removal is ambiguous (boxes -> box, caches -> cache);
                // emit the e-restored template as well
                if word.strip_suffix("es") == Some(word_stem.as_str()) {
                    raw.push((format!("%{word_stem}e%"), 0.8));
                }
            }

            if word.len() >= 4 {
                let variants: Vec<String> = if let Some(base) = word.strip_suffix('y') {
                    // retry -> retries / retrying / retried
                    vec![
                        format!("{base}ies"),
                        format!("{word}ing"),
                        format!("{base}ied"),
                    ]
                } else {
                    vec![
                        format!("{word}s"),
                        format!("{word}es"),
                        format!("{word}ing"),
                        format!("{word}ed"),
                    ]
                };

                for variant in variants {
                    let variant_stem = stem(&variant);
                    if variant_stem == word_stem && variant_stem.len() >= MIN_STEM_LEN {
                        raw.push((format!("%{variant}%"), 0.9));
                    }
                }
            }
        }
    }

    // Dedup preserving first occurrence
    let mut seen = std::collections::HashSet::new();
    raw.into_iter().filter(|(p, _)| seen.insert(p.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern_strings(query: &str, tolerance: Tolerance) -> Vec<String> {
        patterns(query, tolerance).into_iter().map(|(p, _)| p).collect()
    }

    #[test]
    fn test_stemming_rules() {
        assert_eq!(stem("retries"), "retry");
        assert_eq!(stem("retried"), "retry");
        assert_eq!(stem("retrying"), "retry");
        assert_eq!(stem("caches"), "cach");
        assert_eq!(stem("errors"), "error");
        assert_eq!(stem("timed"), "tim");
        assert_eq!(stem("cat"), "cat");
        assert_eq!(stem("Redis"), "redi");
    }

    #[test]
    fn test_retry_expands_to_variants() {
        let pats = pattern_strings("retry", Tolerance::Normal);
        assert!(pats.contains(&"%retry%".to_string()));
        assert!(pats.contains(&"%retries%".to_string()));
        assert!(pats.contains(&"%retried%".to_string()));
        assert!(pats.contains(&"%retrying%".to_string()));
    }

    #[test]
    fn test_caches_includes_stems() {
        let pats = pattern_strings("caches", Tolerance::Normal);
        assert!(pats.contains(&"%caches%".to_string()));
        assert!(pats.contains(&"%cach%".to_string()));
        assert!(pats.contains(&"%cache%".to_string()));
    }

    #[test]
    fn test_strict_mode_single_pattern() {
        let pats = patterns("retrying", Tolerance::Strict);
        assert_eq!(pats, vec![("%retrying%".to_string(), 1.0)]);
    }

    #[test]
    fn test_full_query_always_first_with_weight_one() {
        let pats = patterns("Redis timeout", Tolerance::Normal);
        assert_eq!(pats[0], ("%redis timeout%".to_string(), 1.0));
    }

    #[test]
    fn test_short_tokens_skipped() {
        let pats = pattern_strings("on 429", Tolerance::Normal);
        assert_eq!(pats, vec!["%on 429%".to_string()]);
    }

    #[test]
    fn test_no_duplicate_patterns() {
        let pats = pattern_strings("retry retry", Tolerance::Normal);
        let unique: std::collections::HashSet<_> = pats.iter().collect();
        assert_eq!(unique.len(), pats.len());
    }

    #[test]
    fn test_fuzzy_mode_matches_normal() {
        assert_eq!(
            patterns("retrying caches", Tolerance::Fuzzy),
            patterns("retrying caches", Tolerance::Normal)
        );
    }
}
