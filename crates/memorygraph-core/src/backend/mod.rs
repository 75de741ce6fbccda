//! Backend abstraction.
//!
//! Every storage target implements the one [`GraphBackend`] contract; the
//! repository owns an `Arc<dyn GraphBackend>` and knows nothing about which
//! concrete kind it is. Free-form queries use the engine's small Cypher-like
//! dialect; backends that do not speak it answer with `UnsupportedQuery` and
//! expose the repository primitives instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MemoryGraphError, Result};
use crate::model::{
    Memory, MemoryStatistics, PaginatedResult, Relationship, RelationshipProperties,
    RelationshipType, SearchQuery,
};

pub mod cloud;
pub mod cypher;
pub mod factory;
pub mod sqlite;

pub use factory::{create_backend, create_from_config};

/// Cap applied to `get_related_memories` results.
pub const RELATED_MEMORIES_LIMIT: usize = 20;

/// Aggregate counts reported by `health_check`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStatistics {
    pub memory_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_count: Option<u64>,
}

/// Result of a backend health check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    pub connected: bool,
    pub backend_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<HealthStatistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Common contract every storage backend implements.
///
/// All methods are suspension points; the embedded backend serializes writes
/// behind a single-writer discipline, remote backends run each call in its
/// own transaction. Implementations must keep `initialize_schema` idempotent
/// so it is safe to call on every startup.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Establish the connection. Returns `true` on success; fails with
    /// `BackendUnavailable` or `AuthFailure`.
    async fn connect(&self) -> Result<bool>;

    /// Close the connection. Idempotent.
    async fn disconnect(&self) -> Result<()>;

    /// Create tables/constraints/indexes. Idempotent; fails with `Schema`.
    async fn initialize_schema(&self) -> Result<()>;

    async fn health_check(&self) -> Result<HealthStatus>;

    /// Execute a free-form query in the engine's canonical dialect.
    ///
    /// Backends without a Cypher interpreter signal `UnsupportedQuery`.
    async fn execute_query(
        &self,
        query: &str,
        parameters: Value,
        write: bool,
    ) -> Result<Vec<Map<String, Value>>>;

    /// Upsert by id (MERGE semantics). Returns the memory id.
    async fn store_memory(&self, memory: &Memory) -> Result<String>;

    async fn get_memory(&self, memory_id: &str) -> Result<Option<Memory>>;

    /// Returns true iff the memory existed and was updated.
    async fn update_memory(&self, memory: &Memory) -> Result<bool>;

    /// Delete a memory; relationships cascade. Returns true iff it existed.
    async fn delete_memory(&self, memory_id: &str) -> Result<bool>;

    /// Create an edge. Fails with `Relationship` when either endpoint is
    /// missing or the endpoints are equal. For bidirectional types exactly
    /// one edge row is stored per pair.
    async fn create_relationship(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        relationship_type: RelationshipType,
        properties: &RelationshipProperties,
    ) -> Result<String>;

    /// The 1..k undirected neighbourhood, deduplicated by neighbour, sorted
    /// by (strength desc, importance desc), capped at
    /// [`RELATED_MEMORIES_LIMIT`]. Edge direction is preserved in the
    /// returned relationship.
    async fn get_related_memories(
        &self,
        memory_id: &str,
        relationship_types: Option<&[RelationshipType]>,
        max_depth: u32,
    ) -> Result<Vec<(Memory, Relationship)>>;

    async fn search_memories(&self, query: &SearchQuery) -> Result<Vec<Memory>>;

    /// Search plus a count under the same predicates.
    async fn search_memories_paginated(&self, query: &SearchQuery) -> Result<PaginatedResult>;

    /// Replace the property bag of an existing edge; the single legal
    /// relationship mutation.
    async fn update_relationship_properties(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        relationship_type: RelationshipType,
        properties: &RelationshipProperties,
    ) -> Result<bool>;

    async fn get_memory_statistics(&self) -> Result<MemoryStatistics>;

    /// Delete every memory and relationship. Used by migration rollback;
    /// backends without a bulk path keep the default and rollback falls
    /// back to per-memory deletes.
    async fn clear_all_data(&self) -> Result<u64> {
        Err(MemoryGraphError::unsupported_query(format!(
            "{} backend has no bulk clear operation",
            self.backend_name()
        )))
    }

    fn backend_name(&self) -> &'static str;

    fn supports_fulltext_search(&self) -> bool;

    fn supports_transactions(&self) -> bool;

    fn is_cypher_capable(&self) -> bool {
        false
    }
}
