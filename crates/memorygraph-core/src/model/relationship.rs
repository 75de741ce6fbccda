//! Relationship - the typed, weighted edge type of the knowledge graph.
//!
//! 35 relationship types partitioned into 7 semantic categories. Seven types
//! are intrinsically symmetric; traversal treats those edges as undirected
//! and exactly one edge row is ever stored for a symmetric pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MemoryGraphError, Result};
use crate::model::memory::{Memory, MemoryType};

/// Strength bump applied on successful reinforcement.
pub const STRENGTH_INCREASE: f64 = 0.05;
/// Confidence bump applied on successful reinforcement.
pub const CONFIDENCE_INCREASE: f64 = 0.03;
/// Daily decay applied by effective-strength ranking.
pub const DEFAULT_DECAY_RATE: f64 = 0.01;

// ============================================================================
// RELATIONSHIP TYPE & CATEGORY
// ============================================================================

/// Categories that group related relationship types together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipCategory {
    Causal,
    Solution,
    Context,
    Learning,
    Similarity,
    Workflow,
    Quality,
}

impl RelationshipCategory {
    pub const ALL: [RelationshipCategory; 7] = [
        RelationshipCategory::Causal,
        RelationshipCategory::Solution,
        RelationshipCategory::Context,
        RelationshipCategory::Learning,
        RelationshipCategory::Similarity,
        RelationshipCategory::Workflow,
        RelationshipCategory::Quality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipCategory::Causal => "causal",
            RelationshipCategory::Solution => "solution",
            RelationshipCategory::Context => "context",
            RelationshipCategory::Learning => "learning",
            RelationshipCategory::Similarity => "similarity",
            RelationshipCategory::Workflow => "workflow",
            RelationshipCategory::Quality => "quality",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s.to_lowercase())
    }
}

impl std::fmt::Display for RelationshipCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Types of relationships between memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    // Causal
    Causes,
    Triggers,
    LeadsTo,
    Prevents,
    Breaks,
    // Solution
    Solves,
    Addresses,
    AlternativeTo,
    Improves,
    Replaces,
    // Context
    OccursIn,
    AppliesTo,
    WorksWith,
    Requires,
    UsedIn,
    // Learning
    BuildsOn,
    Contradicts,
    Confirms,
    Generalizes,
    Specializes,
    // Similarity
    SimilarTo,
    VariantOf,
    RelatedTo,
    AnalogyTo,
    OppositeOf,
    // Workflow
    Follows,
    DependsOn,
    Enables,
    Blocks,
    ParallelTo,
    // Quality
    EffectiveFor,
    IneffectiveFor,
    PreferredOver,
    DeprecatedBy,
    ValidatedBy,
}

/// Metadata describing a relationship type's characteristics.
#[derive(Debug, Clone, Copy)]
pub struct TypeMetadata {
    pub category: RelationshipCategory,
    pub description: &'static str,
    pub bidirectional: bool,
    pub default_strength: f64,
    pub default_confidence: f64,
    pub inverse: Option<RelationshipType>,
}

impl RelationshipType {
    /// Every relationship type, grouped by category in declaration order.
    pub const ALL: [RelationshipType; 35] = [
        RelationshipType::Causes,
        RelationshipType::Triggers,
        RelationshipType::LeadsTo,
        RelationshipType::Prevents,
        RelationshipType::Breaks,
        RelationshipType::Solves,
        RelationshipType::Addresses,
        RelationshipType::AlternativeTo,
        RelationshipType::Improves,
        RelationshipType::Replaces,
        RelationshipType::OccursIn,
        RelationshipType::AppliesTo,
        RelationshipType::WorksWith,
        RelationshipType::Requires,
        RelationshipType::UsedIn,
        RelationshipType::BuildsOn,
        RelationshipType::Contradicts,
        RelationshipType::Confirms,
        RelationshipType::Generalizes,
        RelationshipType::Specializes,
        RelationshipType::SimilarTo,
        RelationshipType::VariantOf,
        RelationshipType::RelatedTo,
        RelationshipType::AnalogyTo,
        RelationshipType::OppositeOf,
        RelationshipType::Follows,
        RelationshipType::DependsOn,
        RelationshipType::Enables,
        RelationshipType::Blocks,
        RelationshipType::ParallelTo,
        RelationshipType::EffectiveFor,
        RelationshipType::IneffectiveFor,
        RelationshipType::PreferredOver,
        RelationshipType::DeprecatedBy,
        RelationshipType::ValidatedBy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Causes => "CAUSES",
            RelationshipType::Triggers => "TRIGGERS",
            RelationshipType::LeadsTo => "LEADS_TO",
            RelationshipType::Prevents => "PREVENTS",
            RelationshipType::Breaks => "BREAKS",
            RelationshipType::Solves => "SOLVES",
            RelationshipType::Addresses => "ADDRESSES",
            RelationshipType::AlternativeTo => "ALTERNATIVE_TO",
            RelationshipType::Improves => "IMPROVES",
            RelationshipType::Replaces => "REPLACES",
            RelationshipType::OccursIn => "OCCURS_IN",
            RelationshipType::AppliesTo => "APPLIES_TO",
            RelationshipType::WorksWith => "WORKS_WITH",
            RelationshipType::Requires => "REQUIRES",
            RelationshipType::UsedIn => "USED_IN",
            RelationshipType::BuildsOn => "BUILDS_ON",
            RelationshipType::Contradicts => "CONTRADICTS",
            RelationshipType::Confirms => "CONFIRMS",
            RelationshipType::Generalizes => "GENERALIZES",
            RelationshipType::Specializes => "SPECIALIZES",
            RelationshipType::SimilarTo => "SIMILAR_TO",
            RelationshipType::VariantOf => "VARIANT_OF",
            RelationshipType::RelatedTo => "RELATED_TO",
            RelationshipType::AnalogyTo => "ANALOGY_TO",
            RelationshipType::OppositeOf => "OPPOSITE_OF",
            RelationshipType::Follows => "FOLLOWS",
            RelationshipType::DependsOn => "DEPENDS_ON",
            RelationshipType::Enables => "ENABLES",
            RelationshipType::Blocks => "BLOCKS",
            RelationshipType::ParallelTo => "PARALLEL_TO",
            RelationshipType::EffectiveFor => "EFFECTIVE_FOR",
            RelationshipType::IneffectiveFor => "INEFFECTIVE_FOR",
            RelationshipType::PreferredOver => "PREFERRED_OVER",
            RelationshipType::DeprecatedBy => "DEPRECATED_BY",
            RelationshipType::ValidatedBy => "VALIDATED_BY",
        }
    }

    /// Parse from the serialized SCREAMING_SNAKE_CASE value.
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.to_uppercase();
        Self::ALL.iter().copied().find(|t| t.as_str() == upper)
    }

    /// Parse, failing with a `Validation` error on unknown types.
    pub fn parse_strict(s: &str) -> Result<Self> {
        Self::parse(s)
            .ok_or_else(|| MemoryGraphError::validation(format!("Unknown relationship type: {s}")))
    }

    pub fn metadata(&self) -> TypeMetadata {
        use RelationshipCategory as C;
        use RelationshipType as T;
        let meta = |category, description, bidirectional, default_strength, default_confidence, inverse| {
            TypeMetadata { category, description, bidirectional, default_strength, default_confidence, inverse }
        };
        match self {
            // Causal
            T::Causes => meta(C::Causal, "Memory A causes or directly triggers Memory B", false, 0.8, 0.7, None),
            T::Triggers => meta(C::Causal, "Memory A initiates or activates Memory B", false, 0.7, 0.7, None),
            T::LeadsTo => meta(C::Causal, "Memory A eventually results in Memory B", false, 0.6, 0.6, None),
            T::Prevents => meta(C::Causal, "Memory A prevents or blocks Memory B from occurring", false, 0.7, 0.7, None),
            T::Breaks => meta(C::Causal, "Memory A breaks or disrupts Memory B", false, 0.8, 0.7, None),
            // Solution
            T::Solves => meta(C::Solution, "Memory A solves the problem described in Memory B", false, 0.9, 0.8, None),
            T::Addresses => meta(C::Solution, "Memory A addresses or partially solves Memory B", false, 0.7, 0.7, None),
            T::AlternativeTo => meta(C::Solution, "Memory A is an alternative approach to Memory B", true, 0.6, 0.7, Some(T::AlternativeTo)),
            T::Improves => meta(C::Solution, "Memory A improves upon Memory B", false, 0.7, 0.7, None),
            T::Replaces => meta(C::Solution, "Memory A replaces or supersedes Memory B", false, 0.8, 0.8, None),
            // Context
            T::OccursIn => meta(C::Context, "Memory A occurs within the context of Memory B", false, 0.6, 0.8, None),
            T::AppliesTo => meta(C::Context, "Memory A applies to or is relevant in Memory B context", false, 0.6, 0.7, None),
            T::WorksWith => meta(C::Context, "Memory A works together with Memory B", true, 0.7, 0.7, Some(T::WorksWith)),
            T::Requires => meta(C::Context, "Memory A requires Memory B to function", false, 0.8, 0.8, None),
            T::UsedIn => meta(C::Context, "Memory A is used within Memory B", false, 0.6, 0.7, None),
            // Learning
            T::BuildsOn => meta(C::Learning, "Memory A builds upon knowledge from Memory B", false, 0.7, 0.8, None),
            T::Contradicts => meta(C::Learning, "Memory A contradicts information in Memory B", true, 0.8, 0.6, Some(T::Contradicts)),
            T::Confirms => meta(C::Learning, "Memory A confirms or validates Memory B", false, 0.7, 0.8, None),
            T::Generalizes => meta(C::Learning, "Memory A is a generalization of Memory B", false, 0.6, 0.7, Some(T::Specializes)),
            T::Specializes => meta(C::Learning, "Memory A is a specialization of Memory B", false, 0.6, 0.7, Some(T::Generalizes)),
            // Similarity
            T::SimilarTo => meta(C::Similarity, "Memory A is similar to Memory B", true, 0.6, 0.7, Some(T::SimilarTo)),
            T::VariantOf => meta(C::Similarity, "Memory A is a variant or version of Memory B", false, 0.7, 0.7, None),
            T::RelatedTo => meta(C::Similarity, "Memory A is related to Memory B in some way", true, 0.5, 0.6, Some(T::RelatedTo)),
            T::AnalogyTo => meta(C::Similarity, "Memory A serves as an analogy for Memory B", false, 0.5, 0.6, None),
            T::OppositeOf => meta(C::Similarity, "Memory A is the opposite or inverse of Memory B", true, 0.7, 0.7, Some(T::OppositeOf)),
            // Workflow
            T::Follows => meta(C::Workflow, "Memory A follows Memory B in a sequence", false, 0.7, 0.8, None),
            T::DependsOn => meta(C::Workflow, "Memory A depends on Memory B being completed first", false, 0.8, 0.8, None),
            T::Enables => meta(C::Workflow, "Memory A enables or allows Memory B to occur", false, 0.7, 0.7, None),
            T::Blocks => meta(C::Workflow, "Memory A blocks or prevents Memory B from proceeding", false, 0.8, 0.7, None),
            T::ParallelTo => meta(C::Workflow, "Memory A can occur in parallel with Memory B", true, 0.6, 0.7, Some(T::ParallelTo)),
            // Quality
            T::EffectiveFor => meta(C::Quality, "Memory A is effective for solving Memory B", false, 0.8, 0.7, None),
            T::IneffectiveFor => meta(C::Quality, "Memory A is ineffective for solving Memory B", false, 0.7, 0.7, None),
            T::PreferredOver => meta(C::Quality, "Memory A is preferred over Memory B", false, 0.7, 0.7, None),
            T::DeprecatedBy => meta(C::Quality, "Memory A is deprecated by Memory B", false, 0.8, 0.8, Some(T::Replaces)),
            T::ValidatedBy => meta(C::Quality, "Memory A is validated or proven by Memory B", false, 0.8, 0.8, None),
        }
    }

    pub fn category(&self) -> RelationshipCategory {
        self.metadata().category
    }

    /// Whether traversal treats edges of this type as undirected.
    pub fn is_bidirectional(&self) -> bool {
        self.metadata().bidirectional
    }

    /// All relationship types in a category, in declaration order.
    pub fn types_in_category(category: RelationshipCategory) -> Vec<RelationshipType> {
        Self::ALL.iter().copied().filter(|t| t.category() == category).collect()
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RELATIONSHIP PROPERTIES
// ============================================================================

fn default_strength() -> f64 {
    0.5
}

fn default_rel_confidence() -> f64 {
    0.8
}

fn default_evidence() -> u64 {
    1
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Mutable property bag carried by every relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipProperties {
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default = "default_rel_confidence")]
    pub confidence: f64,
    /// Free-form description; may carry structured tags (see `context` module)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default = "default_evidence")]
    pub evidence_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub last_validated: DateTime<Utc>,
    #[serde(default)]
    pub validation_count: u64,
    #[serde(default)]
    pub counter_evidence_count: u64,
}

impl Default for RelationshipProperties {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            strength: default_strength(),
            confidence: default_rel_confidence(),
            context: None,
            evidence_count: 1,
            success_rate: None,
            created_at: now,
            last_validated: now,
            validation_count: 0,
            counter_evidence_count: 0,
        }
    }
}

impl RelationshipProperties {
    /// Properties seeded with the per-type default strength and confidence.
    pub fn for_type(relationship_type: RelationshipType) -> Self {
        let meta = relationship_type.metadata();
        Self {
            strength: meta.default_strength,
            confidence: meta.default_confidence,
            ..Self::default()
        }
    }

    /// Clamp numeric fields to their valid ranges.
    pub fn clamp_scores(&mut self) {
        self.strength = self.strength.clamp(0.0, 1.0);
        self.confidence = self.confidence.clamp(0.0, 1.0);
        if let Some(rate) = self.success_rate {
            self.success_rate = Some(rate.clamp(0.0, 1.0));
        }
    }

    /// Reinforce after an observed use.
    ///
    /// Evidence counters are monotone; strength and confidence move up on
    /// success and half a step down on failure, clamped to [0.1, 1.0].
    pub fn reinforced(&self, success: bool) -> Self {
        let validation_count = self.validation_count + u64::from(success);
        let counter_evidence_count = self.counter_evidence_count + u64::from(!success);
        let total = validation_count + counter_evidence_count;
        let success_rate = (total > 0).then(|| validation_count as f64 / total as f64);

        let (strength_delta, confidence_delta) = if success {
            (STRENGTH_INCREASE, CONFIDENCE_INCREASE)
        } else {
            (-STRENGTH_INCREASE / 2.0, -CONFIDENCE_INCREASE / 2.0)
        };

        Self {
            strength: (self.strength + strength_delta).clamp(0.1, 1.0),
            confidence: (self.confidence + confidence_delta).clamp(0.1, 1.0),
            context: self.context.clone(),
            evidence_count: self.evidence_count + 1,
            success_rate,
            created_at: self.created_at,
            last_validated: Utc::now(),
            validation_count,
            counter_evidence_count,
        }
    }

    /// Effective strength of this edge at `now`, for ranking and analytics.
    pub fn effective_strength_at(&self, now: DateTime<Utc>) -> f64 {
        let age_days = (now - self.created_at).num_seconds().max(0) as f64 / 86_400.0;
        effective_strength(
            self.strength,
            self.evidence_count,
            self.success_rate,
            age_days,
            DEFAULT_DECAY_RATE,
        )
    }
}

/// Composite ranking scalar: base strength boosted by evidence, weighted by
/// success rate, and decayed with age.
pub fn effective_strength(
    base_strength: f64,
    evidence_count: u64,
    success_rate: Option<f64>,
    age_days: f64,
    decay_rate: f64,
) -> f64 {
    let mut strength = base_strength;

    if evidence_count > 1 {
        let boost = (0.05 * ((evidence_count - 1) as f64).sqrt()).min(0.2);
        strength = (strength + boost).min(1.0);
    }

    if let Some(rate) = success_rate {
        strength *= 0.5 + 0.5 * rate;
    }

    if age_days > 0.0 {
        strength *= (1.0 - decay_rate * age_days).max(0.5);
    }

    strength.clamp(0.0, 1.0)
}

// ============================================================================
// RELATIONSHIP
// ============================================================================

/// A directed, typed, weighted edge between two memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from_memory_id: String,
    pub to_memory_id: String,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub properties: RelationshipProperties,
}

impl Relationship {
    pub fn new(
        from_memory_id: impl Into<String>,
        to_memory_id: impl Into<String>,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            id: None,
            from_memory_id: from_memory_id.into(),
            to_memory_id: to_memory_id.into(),
            relationship_type,
            properties: RelationshipProperties::for_type(relationship_type),
        }
    }

    /// Derived from the type metadata, never stored.
    pub fn is_bidirectional(&self) -> bool {
        self.relationship_type.is_bidirectional()
    }

    pub fn involves(&self, memory_id: &str) -> bool {
        self.from_memory_id == memory_id || self.to_memory_id == memory_id
    }

    /// The endpoint opposite `memory_id`, when this edge touches it.
    pub fn other_endpoint(&self, memory_id: &str) -> Option<&str> {
        if self.from_memory_id == memory_id {
            Some(&self.to_memory_id)
        } else if self.to_memory_id == memory_id {
            Some(&self.from_memory_id)
        } else {
            None
        }
    }

    /// Validate endpoints and normalize property ranges before storage.
    pub fn validate(&mut self) -> Result<()> {
        if self.from_memory_id.trim().is_empty() || self.to_memory_id.trim().is_empty() {
            return Err(MemoryGraphError::validation("Relationship endpoints must not be empty"));
        }
        if self.from_memory_id == self.to_memory_id {
            return Err(MemoryGraphError::relationship(
                "Cannot create relationship from memory to itself",
            )
            .with_detail("memory_id", self.from_memory_id.clone()));
        }
        self.properties.clamp_scores();
        Ok(())
    }
}

// ============================================================================
// ANALYSIS HELPERS
// ============================================================================

const CONTRADICTORY_PAIRS: [(RelationshipType, RelationshipType); 5] = [
    (RelationshipType::Solves, RelationshipType::IneffectiveFor),
    (RelationshipType::Confirms, RelationshipType::Contradicts),
    (RelationshipType::EffectiveFor, RelationshipType::IneffectiveFor),
    (RelationshipType::Enables, RelationshipType::Blocks),
    (RelationshipType::Prevents, RelationshipType::Causes),
];

/// Pairs of relationships on the same endpoints whose types contradict.
pub fn find_contradictory_relationships(
    relationships: &[Relationship],
) -> Vec<(Relationship, Relationship)> {
    let mut contradictions = Vec::new();
    for (i, a) in relationships.iter().enumerate() {
        for b in &relationships[i + 1..] {
            if a.from_memory_id != b.from_memory_id || a.to_memory_id != b.to_memory_id {
                continue;
            }
            let conflicting = CONTRADICTORY_PAIRS.iter().any(|&(x, y)| {
                (a.relationship_type == x && b.relationship_type == y)
                    || (a.relationship_type == y && b.relationship_type == x)
            });
            if conflicting {
                contradictions.push((a.clone(), b.clone()));
            }
        }
    }
    contradictions
}

/// Suggest relationship types for a memory pair, ranked by confidence.
pub fn suggest_relationship_type(from: &Memory, to: &Memory) -> Vec<(RelationshipType, f64)> {
    let mut suggestions: Vec<(RelationshipType, f64)> = Vec::new();

    if from.memory_type == MemoryType::Solution && to.memory_type == MemoryType::Problem {
        suggestions.push((RelationshipType::Solves, 0.8));
        suggestions.push((RelationshipType::Addresses, 0.7));
    }
    if from.memory_type == MemoryType::Fix && to.memory_type == MemoryType::Error {
        suggestions.push((RelationshipType::Solves, 0.9));
    }
    if from.memory_type == MemoryType::Technology && to.memory_type == MemoryType::Technology {
        suggestions.push((RelationshipType::WorksWith, 0.6));
        suggestions.push((RelationshipType::AlternativeTo, 0.5));
    }
    if from.memory_type == MemoryType::Task && to.memory_type == MemoryType::Task {
        suggestions.push((RelationshipType::Follows, 0.6));
        suggestions.push((RelationshipType::DependsOn, 0.5));
        suggestions.push((RelationshipType::ParallelTo, 0.4));
    }
    if from.memory_type == MemoryType::CodePattern && to.memory_type == MemoryType::CodePattern {
        suggestions.push((RelationshipType::SimilarTo, 0.6));
        suggestions.push((RelationshipType::VariantOf, 0.5));
        suggestions.push((RelationshipType::Improves, 0.4));
    }

    if suggestions.is_empty() {
        suggestions.push((RelationshipType::RelatedTo, 0.5));
    }

    suggestions.sort_by(|a, b| b.1.total_cmp(&a.1));
    suggestions
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_35_types_across_7_categories() {
        assert_eq!(RelationshipType::ALL.len(), 35);
        for category in RelationshipCategory::ALL {
            assert_eq!(
                RelationshipType::types_in_category(category).len(),
                5,
                "category {category} should hold 5 types"
            );
        }
    }

    #[test]
    fn test_seven_bidirectional_types() {
        let symmetric: Vec<_> = RelationshipType::ALL
            .iter()
            .filter(|t| t.is_bidirectional())
            .collect();
        assert_eq!(symmetric.len(), 7);
        assert!(RelationshipType::SimilarTo.is_bidirectional());
        assert!(RelationshipType::RelatedTo.is_bidirectional());
        assert!(!RelationshipType::Solves.is_bidirectional());
    }

    #[test]
    fn test_serialization_uses_wire_values() {
        let value = serde_json::to_value(RelationshipType::AlternativeTo).unwrap();
        assert_eq!(value, serde_json::json!("ALTERNATIVE_TO"));
        assert_eq!(RelationshipType::parse("solves"), Some(RelationshipType::Solves));
        assert!(RelationshipType::parse_strict("FIXES").is_err());
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut rel = Relationship::new("a", "a", RelationshipType::RelatedTo);
        assert!(rel.validate().is_err());
    }

    #[test]
    fn test_reinforcement_success() {
        let props = RelationshipProperties {
            strength: 0.5,
            confidence: 0.8,
            evidence_count: 1,
            validation_count: 0,
            counter_evidence_count: 0,
            ..RelationshipProperties::default()
        };

        let reinforced = props.reinforced(true);
        assert_eq!(reinforced.evidence_count, 2);
        assert_eq!(reinforced.validation_count, 1);
        assert_eq!(reinforced.counter_evidence_count, 0);
        assert_eq!(reinforced.success_rate, Some(1.0));
        assert!((reinforced.strength - 0.55).abs() < 1e-9);
        assert!((reinforced.confidence - 0.83).abs() < 1e-9);
        assert!(reinforced.last_validated >= props.last_validated);
    }

    #[test]
    fn test_reinforcement_failure_clamps_at_floor() {
        let mut props = RelationshipProperties {
            strength: 0.1,
            confidence: 0.1,
            ..RelationshipProperties::default()
        };
        for _ in 0..5 {
            props = props.reinforced(false);
            assert!(props.strength >= 0.1);
            assert!(props.confidence >= 0.1);
        }
        assert_eq!(props.evidence_count, 6);
        assert_eq!(props.counter_evidence_count, 5);
        assert_eq!(props.success_rate, Some(0.0));
    }

    #[test]
    fn test_reinforcement_monotone_evidence() {
        let mut props = RelationshipProperties::default();
        let mut last = props.evidence_count;
        for success in [true, false, true, true, false] {
            props = props.reinforced(success);
            assert!(props.evidence_count > last);
            last = props.evidence_count;
            assert!((0.1..=1.0).contains(&props.strength));
            assert!((0.1..=1.0).contains(&props.confidence));
        }
    }

    #[test]
    fn test_effective_strength_identity() {
        // age 0, single evidence, no success rate: identity on the base
        assert_eq!(effective_strength(0.7, 1, None, 0.0, DEFAULT_DECAY_RATE), 0.7);
    }

    #[test]
    fn test_effective_strength_components() {
        // Evidence boost is capped at +0.2
        let boosted = effective_strength(0.5, 100, None, 0.0, DEFAULT_DECAY_RATE);
        assert!((boosted - 0.7).abs() < 1e-9);

        // Success rate of 1.0 leaves the value unchanged; 0.0 halves it
        assert_eq!(effective_strength(0.6, 1, Some(1.0), 0.0, DEFAULT_DECAY_RATE), 0.6);
        assert_eq!(effective_strength(0.6, 1, Some(0.0), 0.0, DEFAULT_DECAY_RATE), 0.3);

        // Decay floors at 0.5 of the pre-decay value
        let old = effective_strength(0.8, 1, None, 1000.0, DEFAULT_DECAY_RATE);
        assert!((old - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_type_defaults_applied() {
        let props = RelationshipProperties::for_type(RelationshipType::Solves);
        assert_eq!(props.strength, 0.9);
        assert_eq!(props.confidence, 0.8);
    }

    #[test]
    fn test_contradiction_detection() {
        let a = Relationship::new("m1", "m2", RelationshipType::EffectiveFor);
        let b = Relationship::new("m1", "m2", RelationshipType::IneffectiveFor);
        let c = Relationship::new("m1", "m3", RelationshipType::IneffectiveFor);
        let found = find_contradictory_relationships(&[a, b, c]);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_suggestions_ranked() {
        let solution = Memory::new(MemoryType::Solution, "raise timeout", "raised to 30s");
        let problem = Memory::new(MemoryType::Problem, "timeout in prod", "requests time out");
        let suggestions = suggest_relationship_type(&solution, &problem);
        assert_eq!(suggestions[0].0, RelationshipType::Solves);

        let a = Memory::new(MemoryType::General, "a", "a");
        let b = Memory::new(MemoryType::General, "b", "b");
        let fallback = suggest_relationship_type(&a, &b);
        assert_eq!(fallback, vec![(RelationshipType::RelatedTo, 0.5)]);
    }
}
