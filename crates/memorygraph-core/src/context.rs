//! Structured parsing of relationship context strings.
//!
//! A relationship's `context` is free-form text that may carry semi-structured
//! tags. The parser extracts:
//!
//! - `scope`: partial, full, or conditional
//! - `conditions`: when the relationship holds ("only when Redis enabled")
//! - `evidence`: how it was verified ("verified by integration tests")
//! - `components`: systems it touches ("affects: auth, cache")
//! - `temporal`: a version or time marker ("since v2.1.0")
//!
//! Two forms are recognized. The explicit form is `key: v1, v2` segments
//! separated by `;` or newlines, with keys scope/conditions/evidence/
//! components/temporal. The loose form scans for keyword markers
//! ("partially", "only when ...", "verified by ...", "since ...") so that
//! hand-written context lines still yield structure.

use serde::{Deserialize, Serialize};

/// How completely the relationship applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextScope {
    Partial,
    Full,
    Conditional,
}

impl ContextScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextScope::Partial => "partial",
            ContextScope::Full => "full",
            ContextScope::Conditional => "conditional",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "partial" => Some(ContextScope::Partial),
            "full" => Some(ContextScope::Full),
            "conditional" => Some(ContextScope::Conditional),
            _ => None,
        }
    }
}

/// Structure extracted from a relationship context string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ContextScope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<String>,
}

impl RelationshipContext {
    pub fn has_evidence(&self) -> bool {
        !self.evidence.is_empty()
    }
}

/// Parse a context string into its structured form.
///
/// `None` or empty input yields the empty structure.
pub fn parse_context(context: Option<&str>) -> RelationshipContext {
    let mut parsed = RelationshipContext::default();
    let Some(text) = context else {
        return parsed;
    };
    let text = text.trim();
    if text.is_empty() {
        return parsed;
    }

    for segment in text.split([';', '\n']) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        if let Some((key, value)) = segment.split_once(':') {
            let value = value.trim();
            match key.trim().to_lowercase().as_str() {
                "scope" => parsed.scope = ContextScope::parse(value).or(parsed.scope),
                "condition" | "conditions" | "when" => {
                    push_list(&mut parsed.conditions, value);
                    continue;
                }
                "evidence" | "verified" | "verified by" => {
                    push_list(&mut parsed.evidence, value);
                    continue;
                }
                "component" | "components" | "affects" => {
                    push_list(&mut parsed.components, value);
                    continue;
                }
                "temporal" | "since" | "as of" => {
                    if parsed.temporal.is_none() && !value.is_empty() {
                        parsed.temporal = Some(value.to_string());
                    }
                    continue;
                }
                _ => {}
            }
        }

        scan_loose_markers(segment, &mut parsed);
    }

    parsed
}

fn push_list(target: &mut Vec<String>, value: &str) {
    for item in value.split(',') {
        let item = item.trim();
        if !item.is_empty() && !target.iter().any(|existing| existing == item) {
            target.push(item.to_string());
        }
    }
}

/// Keyword detection for hand-written context lines.
fn scan_loose_markers(segment: &str, parsed: &mut RelationshipContext) {
    let lower = segment.to_lowercase();

    if parsed.scope.is_none() {
        if lower.contains("only when") || lower.contains("only if") || lower.contains("conditional")
        {
            parsed.scope = Some(ContextScope::Conditional);
        } else if lower.contains("partial") {
            parsed.scope = Some(ContextScope::Partial);
        } else if lower.contains("fully") || lower.contains("full fix") || lower.contains("completely") {
            parsed.scope = Some(ContextScope::Full);
        }
    }

    for marker in ["only when ", "only if "] {
        if let Some(phrase) = phrase_after(&lower, marker) {
            push_list(&mut parsed.conditions, &phrase);
        }
    }

    for marker in ["verified by ", "validated by ", "tested with ", "confirmed by "] {
        if let Some(phrase) = phrase_after(&lower, marker) {
            push_list(&mut parsed.evidence, &phrase);
        }
    }

    if parsed.temporal.is_none() {
        for marker in ["since ", "as of "] {
            if let Some(phrase) = phrase_after(&lower, marker) {
                parsed.temporal = Some(phrase);
                break;
            }
        }
    }
}

/// The phrase following `marker`, cut at the next sentence boundary.
fn phrase_after(text: &str, marker: &str) -> Option<String> {
    let idx = text.find(marker)?;
    let rest = &text[idx + marker.len()..];
    let end = rest.find(['.', ',', ';']).unwrap_or(rest.len());
    let phrase = rest[..end].trim();
    (!phrase.is_empty()).then(|| phrase.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_context(None), RelationshipContext::default());
        assert_eq!(parse_context(Some("   ")), RelationshipContext::default());
    }

    #[test]
    fn test_explicit_form() {
        let parsed = parse_context(Some(
            "scope: partial; conditions: production, Redis enabled; \
             evidence: integration tests; components: auth, cache; temporal: v2.1.0",
        ));
        assert_eq!(parsed.scope, Some(ContextScope::Partial));
        assert_eq!(parsed.conditions, vec!["production", "Redis enabled"]);
        assert_eq!(parsed.evidence, vec!["integration tests"]);
        assert_eq!(parsed.components, vec!["auth", "cache"]);
        assert_eq!(parsed.temporal.as_deref(), Some("v2.1.0"));
    }

    #[test]
    fn test_loose_markers() {
        let parsed = parse_context(Some(
            "Works only when connection pooling is on. Verified by load tests. Since v3.2",
        ));
        assert_eq!(parsed.scope, Some(ContextScope::Conditional));
        assert_eq!(parsed.conditions, vec!["connection pooling is on"]);
        assert_eq!(parsed.evidence, vec!["load tests"]);
        assert_eq!(parsed.temporal.as_deref(), Some("v3.2"));
    }

    #[test]
    fn test_partial_keyword() {
        let parsed = parse_context(Some("partial fix, root cause still open"));
        assert_eq!(parsed.scope, Some(ContextScope::Partial));
        assert!(parsed.evidence.is_empty());
    }

    #[test]
    fn test_list_dedup() {
        let parsed = parse_context(Some("components: auth, auth, cache"));
        assert_eq!(parsed.components, vec!["auth", "cache"]);
    }
}
