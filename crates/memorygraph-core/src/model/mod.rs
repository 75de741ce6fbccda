//! Domain model: memories, relationships, and their invariants.

mod memory;
mod relationship;

pub use memory::{
    normalize_tags, MatchInfo, MatchMode, MatchQuality, Memory, MemoryContext, MemoryStatistics,
    MemoryType, PaginatedResult, RecentActivity, SearchQuery, MAX_SUMMARY_LEN, MAX_TITLE_LEN,
};
pub use relationship::{
    effective_strength, find_contradictory_relationships, suggest_relationship_type, Relationship,
    RelationshipCategory, RelationshipProperties, RelationshipType, TypeMetadata,
    CONFIDENCE_INCREASE, DEFAULT_DECAY_RATE, STRENGTH_INCREASE,
};
