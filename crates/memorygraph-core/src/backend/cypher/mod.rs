//! Cypher-capable backend adapter.
//!
//! Maps the backend contract onto a remote Cypher server reachable over a
//! session-oriented wire protocol. The adapter is transport-generic: it
//! speaks through the [`CypherSession`] trait and only ever emits the
//! engine's canonical dialect subset (node match by label and id, 1..k
//! variable-length expansion with optional type filter, property equality,
//! CONTAINS, ANY/IN list membership, AVG/COUNT aggregates, ORDER BY, LIMIT).
//!
//! Relationship types are never interpolated from user input: they are
//! validated against the fixed enum first, and only the enum's own wire
//! string reaches the query text.

mod bolt;

#[cfg(feature = "bolt")]
pub use bolt::BoltSession;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{GraphBackend, HealthStatistics, HealthStatus, RELATED_MEMORIES_LIMIT};
use crate::error::{MemoryGraphError, Result};
use crate::model::{
    Memory, MemoryStatistics, PaginatedResult, Relationship, RelationshipProperties,
    RelationshipType, SearchQuery,
};

/// Server dialect variations the adapter smooths over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CypherFlavor {
    Neo4j,
    Memgraph,
}

impl CypherFlavor {
    pub fn backend_name(&self) -> &'static str {
        match self {
            CypherFlavor::Neo4j => "neo4j",
            CypherFlavor::Memgraph => "memgraph",
        }
    }
}

/// A session-oriented transport to a Cypher server.
///
/// Implementations wrap each call in a read or write transaction according
/// to the `write` flag. Rows come back as JSON maps; node values are
/// flattened to their property maps.
#[async_trait]
pub trait CypherSession: Send + Sync {
    /// Verify connectivity eagerly.
    async fn connect(&self) -> Result<bool>;

    async fn disconnect(&self) -> Result<()>;

    async fn run(
        &self,
        query: &str,
        parameters: Value,
        write: bool,
    ) -> Result<Vec<Map<String, Value>>>;
}

/// Backend over any [`CypherSession`].
pub struct CypherBackend {
    session: Box<dyn CypherSession>,
    flavor: CypherFlavor,
    connected: AtomicBool,
}

impl CypherBackend {
    pub fn new(session: Box<dyn CypherSession>, flavor: CypherFlavor) -> Self {
        Self { session, flavor, connected: AtomicBool::new(false) }
    }

    /// Connect over Bolt. Requires the `bolt` feature.
    #[cfg(feature = "bolt")]
    pub async fn connect_bolt(
        uri: &str,
        user: &str,
        password: &str,
        database: Option<&str>,
        flavor: CypherFlavor,
    ) -> Result<Self> {
        let session = BoltSession::new(uri, user, password, database)?;
        let backend = Self::new(Box::new(session), flavor);
        backend.connect().await?;
        Ok(backend)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(MemoryGraphError::backend_unavailable(format!(
                "Not connected to {}. Call connect() first.",
                self.flavor.backend_name()
            )))
        }
    }

    fn node_to_memory(value: &Value) -> Option<Memory> {
        value.as_object().and_then(Memory::from_flat_properties)
    }

    fn row_to_relationship(row: &Map<String, Value>) -> Option<Relationship> {
        let rel_type = RelationshipType::parse(row.get("rel_type")?.as_str()?)
            .unwrap_or(RelationshipType::RelatedTo);
        let from_id = row.get("from_id")?.as_str()?.to_string();
        let to_id = row.get("to_id")?.as_str()?.to_string();
        let properties = row
            .get("rel_props")
            .cloned()
            .and_then(|props| serde_json::from_value(props).ok())
            .unwrap_or_default();
        Some(Relationship {
            id: row
                .get("rel_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            from_memory_id: from_id,
            to_memory_id: to_id,
            relationship_type: rel_type,
            properties,
        })
    }

    /// Relationship properties as a parameter map (timestamps as strings).
    fn properties_param(properties: &RelationshipProperties, edge_id: &str) -> Result<Value> {
        let mut map = serde_json::to_value(properties)?
            .as_object()
            .cloned()
            .unwrap_or_default();
        map.insert("id".to_string(), Value::String(edge_id.to_string()));
        Ok(Value::Object(map))
    }

    /// Build the WHERE conditions and parameters shared by both search paths.
    fn search_conditions(query: &SearchQuery) -> (Vec<String>, Map<String, Value>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut parameters = Map::new();

        let text_condition = |idx: usize| {
            format!(
                "(m.title CONTAINS $text{idx} OR m.content CONTAINS $text{idx} \
                 OR m.summary CONTAINS $text{idx})"
            )
        };

        if !query.terms.is_empty() {
            let mut term_conditions = Vec::new();
            for (idx, term) in query.terms.iter().enumerate() {
                term_conditions.push(text_condition(idx));
                parameters.insert(format!("text{idx}"), Value::String(term.clone()));
            }
            let joiner = match query.match_mode {
                crate::model::MatchMode::All => " AND ",
                crate::model::MatchMode::Any => " OR ",
            };
            conditions.push(format!("({})", term_conditions.join(joiner)));
        } else if let Some(text) = query.query.as_deref().filter(|q| !q.trim().is_empty()) {
            conditions.push(text_condition(0));
            parameters.insert("text0".to_string(), Value::String(text.to_string()));
        }

        if !query.memory_types.is_empty() {
            conditions.push("m.type IN $memory_types".to_string());
            parameters.insert(
                "memory_types".to_string(),
                Value::Array(
                    query
                        .memory_types
                        .iter()
                        .map(|t| Value::String(t.as_str().to_string()))
                        .collect(),
                ),
            );
        }

        if !query.tags.is_empty() {
            conditions.push("ANY(tag IN $tags WHERE tag IN m.tags)".to_string());
            parameters.insert(
                "tags".to_string(),
                Value::Array(
                    query
                        .tags
                        .iter()
                        .map(|t| Value::String(t.trim().to_lowercase()))
                        .collect(),
                ),
            );
        }

        if let Some(project_path) = &query.project_path {
            conditions.push("m.context_project_path = $project_path".to_string());
            parameters.insert("project_path".to_string(), Value::String(project_path.clone()));
        }

        if let Some(min_importance) = query.min_importance {
            conditions.push("m.importance >= $min_importance".to_string());
            parameters.insert("min_importance".to_string(), json!(min_importance));
        }

        if let Some(min_confidence) = query.min_confidence {
            conditions.push("m.confidence >= $min_confidence".to_string());
            parameters.insert("min_confidence".to_string(), json!(min_confidence));
        }

        if let Some(created_after) = query.created_after {
            conditions.push("m.created_at >= $created_after".to_string());
            parameters.insert(
                "created_after".to_string(),
                Value::String(created_after.to_rfc3339()),
            );
        }

        if let Some(created_before) = query.created_before {
            conditions.push("m.created_at <= $created_before".to_string());
            parameters.insert(
                "created_before".to_string(),
                Value::String(created_before.to_rfc3339()),
            );
        }

        (conditions, parameters)
    }

    /// Rewrite schema statements the server's dialect does not accept.
    fn adapt_schema_statement(&self, statement: &str) -> Option<String> {
        if self.flavor == CypherFlavor::Memgraph && statement.contains("CREATE FULLTEXT INDEX") {
            // Memgraph has no FULLTEXT INDEX DDL; text search degrades to
            // CONTAINS scans, so the statement becomes a no-op
            debug!("Skipping FULLTEXT INDEX statement on Memgraph");
            return None;
        }
        Some(statement.to_string())
    }
}

/// "already exists" / "not supported" are expected on re-runs and feature
/// gaps; startup must stay idempotent.
fn is_benign_schema_error(err: &MemoryGraphError) -> bool {
    let text = err.to_string().to_lowercase();
    text.contains("already exists")
        || text.contains("not supported")
        || text.contains("equivalent")
}

#[async_trait]
impl GraphBackend for CypherBackend {
    async fn connect(&self) -> Result<bool> {
        self.session.connect().await?;
        self.connected.store(true, Ordering::Relaxed);
        info!("Connected to {} backend", self.flavor.backend_name());
        Ok(true)
    }

    async fn disconnect(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::Relaxed) {
            self.session.disconnect().await?;
            info!("{} connection closed", self.flavor.backend_name());
        }
        Ok(())
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.ensure_connected()?;

        let constraints = [
            "CREATE CONSTRAINT memory_id_unique IF NOT EXISTS FOR (m:Memory) REQUIRE m.id IS UNIQUE",
        ];
        let indexes = [
            "CREATE INDEX memory_type_index IF NOT EXISTS FOR (m:Memory) ON (m.type)",
            "CREATE INDEX memory_created_at_index IF NOT EXISTS FOR (m:Memory) ON (m.created_at)",
            "CREATE INDEX memory_importance_index IF NOT EXISTS FOR (m:Memory) ON (m.importance)",
            "CREATE INDEX memory_project_path_index IF NOT EXISTS FOR (m:Memory) ON (m.context_project_path)",
            "CREATE FULLTEXT INDEX memory_content_index IF NOT EXISTS FOR (m:Memory) ON EACH [m.title, m.content, m.summary]",
        ];

        for statement in constraints.iter().chain(indexes.iter()) {
            let Some(adapted) = self.adapt_schema_statement(statement) else {
                continue;
            };
            match self.session.run(&adapted, Value::Null, true).await {
                Ok(_) => debug!("Applied schema statement: {adapted}"),
                Err(e) if is_benign_schema_error(&e) => {
                    warn!("Schema statement skipped: {e}");
                }
                Err(e) => {
                    return Err(MemoryGraphError::schema(format!(
                        "Failed to apply schema statement: {e}"
                    )));
                }
            }
        }
        info!("Schema initialization completed");
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let mut status = HealthStatus {
            connected: self.connected.load(Ordering::Relaxed),
            backend_name: self.flavor.backend_name().to_string(),
            ..HealthStatus::default()
        };
        if !status.connected {
            return Ok(status);
        }

        match self
            .session
            .run("MATCH (m:Memory) RETURN count(m) AS count", Value::Null, false)
            .await
        {
            Ok(rows) => {
                let memory_count = rows
                    .first()
                    .and_then(|row| row.get("count"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                status.statistics = Some(HealthStatistics {
                    memory_count,
                    relationship_count: None,
                });
            }
            Err(e) => status.warning = Some(e.to_string()),
        }

        if self.flavor == CypherFlavor::Neo4j {
            // Version lookup is informational only
            if let Ok(rows) = self
                .session
                .run(
                    "CALL dbms.components() YIELD versions RETURN versions[0] AS version",
                    Value::Null,
                    false,
                )
                .await
            {
                status.version = rows
                    .first()
                    .and_then(|row| row.get("version"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        }
        Ok(status)
    }

    async fn execute_query(
        &self,
        query: &str,
        parameters: Value,
        write: bool,
    ) -> Result<Vec<Map<String, Value>>> {
        self.ensure_connected()?;
        self.session.run(query, parameters, write).await
    }

    async fn store_memory(&self, memory: &Memory) -> Result<String> {
        self.ensure_connected()?;
        let mut memory = memory.clone();
        let memory_id = memory.ensure_id();

        let rows = self
            .session
            .run(
                "MERGE (m:Memory {id: $id})
                 SET m += $properties
                 RETURN m.id AS id",
                json!({
                    "id": &memory_id,
                    "properties": Value::Object(memory.to_flat_properties()),
                }),
                true,
            )
            .await?;

        if rows.is_empty() {
            return Err(MemoryGraphError::backend_unavailable(format!(
                "Failed to store memory: {memory_id}"
            )));
        }
        info!("Stored memory: {memory_id} ({})", memory.memory_type);
        Ok(memory_id)
    }

    async fn get_memory(&self, memory_id: &str) -> Result<Option<Memory>> {
        self.ensure_connected()?;
        let rows = self
            .session
            .run(
                "MATCH (m:Memory {id: $memory_id}) RETURN m",
                json!({ "memory_id": memory_id }),
                false,
            )
            .await?;
        Ok(rows.first().and_then(|row| row.get("m")).and_then(Self::node_to_memory))
    }

    async fn update_memory(&self, memory: &Memory) -> Result<bool> {
        self.ensure_connected()?;
        let memory_id = memory
            .id
            .clone()
            .ok_or_else(|| MemoryGraphError::validation("Memory must have an ID to update"))?;

        let rows = self
            .session
            .run(
                "MATCH (m:Memory {id: $id})
                 SET m += $properties
                 RETURN m.id AS id",
                json!({
                    "id": memory_id,
                    "properties": Value::Object(memory.to_flat_properties()),
                }),
                true,
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<bool> {
        self.ensure_connected()?;
        let rows = self
            .session
            .run(
                "MATCH (m:Memory {id: $memory_id})
                 DETACH DELETE m
                 RETURN COUNT(m) AS deleted_count",
                json!({ "memory_id": memory_id }),
                true,
            )
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("deleted_count"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
            > 0)
    }

    async fn create_relationship(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        relationship_type: RelationshipType,
        properties: &RelationshipProperties,
    ) -> Result<String> {
        self.ensure_connected()?;
        if from_memory_id == to_memory_id {
            return Err(MemoryGraphError::relationship(
                "Cannot create relationship from memory to itself",
            ));
        }

        let mut properties = properties.clone();
        properties.clamp_scores();
        // Validated enum value only; user strings never reach the query text
        let rel_type = relationship_type.as_str();

        // One stored edge per pair for symmetric types: the undirected match
        // finds an existing edge in either orientation
        if relationship_type.is_bidirectional() {
            let existing = self
                .session
                .run(
                    &format!(
                        "MATCH (a:Memory {{id: $from_id}})-[r:{rel_type}]-(b:Memory {{id: $to_id}})
                         RETURN r.id AS id"
                    ),
                    json!({ "from_id": from_memory_id, "to_id": to_memory_id }),
                    false,
                )
                .await?;
            if let Some(id) = existing
                .first()
                .and_then(|row| row.get("id"))
                .and_then(Value::as_str)
            {
                let params = Self::properties_param(&properties, id)?;
                self.session
                    .run(
                        &format!(
                            "MATCH (a:Memory {{id: $from_id}})-[r:{rel_type}]-(b:Memory {{id: $to_id}})
                             SET r += $props"
                        ),
                        json!({ "from_id": from_memory_id, "to_id": to_memory_id, "props": params }),
                        true,
                    )
                    .await?;
                return Ok(id.to_string());
            }
        }

        let edge_id = Uuid::new_v4().to_string();
        let props_param = Self::properties_param(&properties, &edge_id)?;
        let rows = self
            .session
            .run(
                &format!(
                    "MATCH (from:Memory {{id: $from_id}})
                     MATCH (to:Memory {{id: $to_id}})
                     CREATE (from)-[r:{rel_type} $properties]->(to)
                     RETURN r.id AS id"
                ),
                json!({
                    "from_id": from_memory_id,
                    "to_id": to_memory_id,
                    "properties": props_param,
                }),
                true,
            )
            .await?;

        match rows.first().and_then(|row| row.get("id")).and_then(Value::as_str) {
            Some(id) => {
                info!(
                    "Created relationship: {rel_type} between {from_memory_id} and {to_memory_id}"
                );
                Ok(id.to_string())
            }
            None => Err(MemoryGraphError::relationship(format!(
                "Failed to create relationship between {from_memory_id} and {to_memory_id}"
            ))
            .with_detail("from_id", from_memory_id)
            .with_detail("to_id", to_memory_id)
            .with_detail("type", rel_type)),
        }
    }

    async fn get_related_memories(
        &self,
        memory_id: &str,
        relationship_types: Option<&[RelationshipType]>,
        max_depth: u32,
    ) -> Result<Vec<(Memory, Relationship)>> {
        self.ensure_connected()?;
        let max_depth = max_depth.max(1);

        let rel_filter = match relationship_types.filter(|t| !t.is_empty()) {
            Some(types) => format!(
                ":{}",
                types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join("|")
            ),
            None => String::new(),
        };

        let query = format!(
            "MATCH (start:Memory {{id: $memory_id}})
             MATCH path = (start)-[r{rel_filter}*1..{max_depth}]-(related:Memory)
             WHERE related.id <> start.id
             WITH DISTINCT related, r[0] AS rel,
                  startNode(r[0]) AS source, endNode(r[0]) AS target
             RETURN related,
                    type(rel) AS rel_type,
                    properties(rel) AS rel_props,
                    rel.id AS rel_id,
                    source.id AS from_id,
                    target.id AS to_id
             ORDER BY rel.strength DESC, related.importance DESC
             LIMIT {RELATED_MEMORIES_LIMIT}"
        );

        let rows = self
            .session
            .run(&query, json!({ "memory_id": memory_id }), false)
            .await?;

        let mut related = Vec::new();
        for row in rows {
            let Some(memory) = row.get("related").and_then(Self::node_to_memory) else {
                continue;
            };
            // The pair is only usable when the backend reports direction
            if row.get("from_id").and_then(Value::as_str).is_none()
                || row.get("to_id").and_then(Value::as_str).is_none()
            {
                warn!(
                    "Relationship direction not provided in query result, skipping relationship to {:?}",
                    memory.id
                );
                continue;
            }
            if let Some(relationship) = Self::row_to_relationship(&row) {
                related.push((memory, relationship));
            }
        }
        Ok(related)
    }

    async fn search_memories(&self, query: &SearchQuery) -> Result<Vec<Memory>> {
        self.ensure_connected()?;
        query.validate()?;

        let (conditions, mut parameters) = Self::search_conditions(query);
        let where_clause = if conditions.is_empty() {
            "true".to_string()
        } else {
            conditions.join(" AND ")
        };
        parameters.insert("limit".to_string(), json!(query.limit as u64));
        parameters.insert("offset".to_string(), json!(query.offset as u64));

        let rows = self
            .session
            .run(
                &format!(
                    "MATCH (m:Memory)
                     WHERE {where_clause}
                     RETURN m
                     ORDER BY m.importance DESC, m.created_at DESC
                     SKIP $offset
                     LIMIT $limit"
                ),
                Value::Object(parameters),
                false,
            )
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("m").and_then(Self::node_to_memory))
            .collect())
    }

    async fn search_memories_paginated(&self, query: &SearchQuery) -> Result<PaginatedResult> {
        self.ensure_connected()?;
        query.validate()?;

        let (conditions, parameters) = Self::search_conditions(query);
        let where_clause = if conditions.is_empty() {
            "true".to_string()
        } else {
            conditions.join(" AND ")
        };

        let count_rows = self
            .session
            .run(
                &format!("MATCH (m:Memory) WHERE {where_clause} RETURN count(m) AS total_count"),
                Value::Object(parameters),
                false,
            )
            .await?;
        let total_count = count_rows
            .first()
            .and_then(|row| row.get("total_count"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;

        let results = self.search_memories(query).await?;
        Ok(PaginatedResult::new(results, total_count, query.limit, query.offset))
    }

    async fn update_relationship_properties(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        relationship_type: RelationshipType,
        properties: &RelationshipProperties,
    ) -> Result<bool> {
        self.ensure_connected()?;
        let mut properties = properties.clone();
        properties.clamp_scores();
        let rel_type = relationship_type.as_str();

        // Preserve the stored edge id
        let props_map = serde_json::to_value(&properties)?;

        let pattern = if relationship_type.is_bidirectional() {
            format!("(from:Memory {{id: $from_id}})-[r:{rel_type}]-(to:Memory {{id: $to_id}})")
        } else {
            format!("(from:Memory {{id: $from_id}})-[r:{rel_type}]->(to:Memory {{id: $to_id}})")
        };

        let rows = self
            .session
            .run(
                &format!("MATCH {pattern} SET r += $props RETURN r.id AS id"),
                json!({
                    "from_id": from_memory_id,
                    "to_id": to_memory_id,
                    "props": props_map,
                }),
                true,
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn get_memory_statistics(&self) -> Result<MemoryStatistics> {
        self.ensure_connected()?;
        let mut statistics = MemoryStatistics::default();

        let count = |rows: Vec<Map<String, Value>>, key: &str| -> u64 {
            rows.first()
                .and_then(|row| row.get(key))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };

        statistics.total_memories = count(
            self.session
                .run("MATCH (m:Memory) RETURN COUNT(m) AS count", Value::Null, false)
                .await?,
            "count",
        );
        statistics.total_relationships = count(
            self.session
                .run("MATCH ()-[r]->() RETURN COUNT(r) AS count", Value::Null, false)
                .await?,
            "count",
        );

        let by_type = self
            .session
            .run(
                "MATCH (m:Memory)
                 RETURN m.type AS type, COUNT(m) AS count
                 ORDER BY count DESC",
                Value::Null,
                false,
            )
            .await?;
        for row in by_type {
            if let (Some(memory_type), Some(count)) = (
                row.get("type").and_then(Value::as_str),
                row.get("count").and_then(Value::as_u64),
            ) {
                statistics.memories_by_type.insert(memory_type.to_string(), count);
            }
        }

        let averages = self
            .session
            .run(
                "MATCH (m:Memory)
                 RETURN AVG(m.importance) AS avg_importance, AVG(m.confidence) AS avg_confidence",
                Value::Null,
                false,
            )
            .await?;
        if let Some(row) = averages.first() {
            statistics.avg_importance = row
                .get("avg_importance")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            statistics.avg_confidence = row
                .get("avg_confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
        }
        Ok(statistics)
    }

    async fn clear_all_data(&self) -> Result<u64> {
        self.ensure_connected()?;
        let rows = self
            .session
            .run(
                "MATCH (m:Memory) DETACH DELETE m RETURN COUNT(m) AS removed",
                Value::Null,
                true,
            )
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("removed"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    fn backend_name(&self) -> &'static str {
        self.flavor.backend_name()
    }

    fn supports_fulltext_search(&self) -> bool {
        // Memgraph exposes text indexes but not the FULLTEXT INDEX DDL
        self.flavor == CypherFlavor::Neo4j
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn is_cypher_capable(&self) -> bool {
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MemoryType;
    use std::sync::{Arc, Mutex};

    type StatementLog = Arc<Mutex<Vec<(String, Value, bool)>>>;

    /// Session double that records statements and replays canned rows.
    struct RecordingSession {
        statements: StatementLog,
        responses: Mutex<Vec<Result<Vec<Map<String, Value>>>>>,
    }

    impl RecordingSession {
        fn rows(values: Vec<Value>) -> Vec<Map<String, Value>> {
            values
                .into_iter()
                .filter_map(|v| v.as_object().cloned())
                .collect()
        }
    }

    #[async_trait]
    impl CypherSession for RecordingSession {
        async fn connect(&self) -> Result<bool> {
            Ok(true)
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }

        async fn run(
            &self,
            query: &str,
            parameters: Value,
            write: bool,
        ) -> Result<Vec<Map<String, Value>>> {
            self.statements
                .lock()
                .unwrap()
                .push((query.to_string(), parameters, write));
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                responses.remove(0)
            }
        }
    }

    fn backend_with(
        flavor: CypherFlavor,
        responses: Vec<Result<Vec<Map<String, Value>>>>,
    ) -> (CypherBackend, StatementLog) {
        let log: StatementLog = Arc::new(Mutex::new(Vec::new()));
        let session = Box::new(RecordingSession {
            statements: Arc::clone(&log),
            responses: Mutex::new(responses),
        });
        let backend = CypherBackend::new(session, flavor);
        backend.connected.store(true, Ordering::Relaxed);
        (backend, log)
    }

    fn recorded(log: &StatementLog) -> Vec<(String, Value, bool)> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_store_memory_emits_merge() {
        let (backend, session) = backend_with(
            CypherFlavor::Neo4j,
            vec![Ok(RecordingSession::rows(vec![json!({ "id": "m1" })]))],
        );

        let mut memory = Memory::new(MemoryType::Solution, "title", "content");
        memory.id = Some("m1".to_string());
        let id = backend.store_memory(&memory).await.unwrap();
        assert_eq!(id, "m1");

        let statements = recorded(&session);
        assert_eq!(statements.len(), 1);
        let (query, params, write) = &statements[0];
        assert!(query.contains("MERGE (m:Memory {id: $id})"));
        assert!(query.contains("SET m += $properties"));
        assert!(*write);
        assert_eq!(params["id"], json!("m1"));
        assert_eq!(params["properties"]["title"], json!("title"));
    }

    #[tokio::test]
    async fn test_create_relationship_interpolates_validated_type_only() {
        let (backend, session) = backend_with(
            CypherFlavor::Neo4j,
            vec![Ok(RecordingSession::rows(vec![json!({ "id": "r1" })]))],
        );

        let id = backend
            .create_relationship("a", "b", RelationshipType::Solves, &RelationshipProperties::default())
            .await
            .unwrap();
        assert_eq!(id, "r1");

        let statements = recorded(&session);
        let (query, params, write) = &statements[0];
        assert!(query.contains("[r:SOLVES $properties]"));
        assert!(*write);
        // Endpoints travel as parameters, never interpolated
        assert_eq!(params["from_id"], json!("a"));
        assert_eq!(params["to_id"], json!("b"));
    }

    #[tokio::test]
    async fn test_bidirectional_reuses_existing_edge() {
        let (backend, session) = backend_with(
            CypherFlavor::Neo4j,
            vec![
                // Undirected lookup finds the stored edge
                Ok(RecordingSession::rows(vec![json!({ "id": "edge-1" })])),
                Ok(Vec::new()),
            ],
        );

        let id = backend
            .create_relationship("b", "a", RelationshipType::SimilarTo, &RelationshipProperties::default())
            .await
            .unwrap();
        assert_eq!(id, "edge-1");

        let statements = recorded(&session);
        assert!(statements[0].0.contains("-[r:SIMILAR_TO]-"));
        assert!(statements[1].0.contains("SET r += $props"));
    }

    #[tokio::test]
    async fn test_memgraph_skips_fulltext_ddl() {
        let (backend, session) = backend_with(CypherFlavor::Memgraph, vec![]);
        backend.initialize_schema().await.unwrap();

        let statements = recorded(&session);
        assert!(!statements.iter().any(|(q, _, _)| q.contains("FULLTEXT")));
        assert!(statements.iter().any(|(q, _, _)| q.contains("memory_id_unique")));
    }

    #[tokio::test]
    async fn test_schema_demotes_already_exists() {
        let responses = (0..6)
            .map(|_| {
                Err(MemoryGraphError::backend_unavailable(
                    "An equivalent constraint already exists",
                ))
            })
            .collect();
        let (backend, _session) = backend_with(CypherFlavor::Neo4j, responses);
        // Every statement fails with "already exists"; startup still succeeds
        backend.initialize_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_related_skips_rows_without_direction() {
        let mut memory = Memory::new(MemoryType::Problem, "p", "content");
        memory.id = Some("p1".to_string());
        let node = Value::Object(memory.to_flat_properties());

        let (backend, _session) = backend_with(
            CypherFlavor::Neo4j,
            vec![Ok(RecordingSession::rows(vec![
                json!({
                    "related": node.clone(),
                    "rel_type": "SOLVES",
                    "rel_props": { "strength": 0.9 },
                    "rel_id": "r1",
                    "from_id": "s1",
                    "to_id": "p1",
                }),
                // Direction missing: skipped
                json!({
                    "related": node,
                    "rel_type": "SOLVES",
                    "rel_props": { "strength": 0.9 },
                    "rel_id": "r2",
                }),
            ]))],
        );

        let related = backend.get_related_memories("p1", None, 1).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].1.from_memory_id, "s1");
    }

    #[tokio::test]
    async fn test_search_builds_dialect_subset() {
        let (backend, session) = backend_with(CypherFlavor::Neo4j, vec![Ok(Vec::new())]);
        let query = SearchQuery {
            query: Some("timeout".to_string()),
            tags: vec!["Redis".to_string()],
            min_importance: Some(0.5),
            include_relationships: false,
            ..SearchQuery::default()
        };
        backend.search_memories(&query).await.unwrap();

        let statements = recorded(&session);
        let (text, params, write) = &statements[0];
        assert!(text.contains("m.title CONTAINS $text0"));
        assert!(text.contains("ANY(tag IN $tags WHERE tag IN m.tags)"));
        assert!(text.contains("ORDER BY m.importance DESC, m.created_at DESC"));
        assert!(text.contains("SKIP $offset"));
        assert!(!*write);
        assert_eq!(params["tags"], json!(["redis"]));
        assert_eq!(params["limit"], json!(20));
    }

    #[tokio::test]
    async fn test_related_type_filter_in_pattern() {
        let (backend, session) = backend_with(CypherFlavor::Neo4j, vec![Ok(Vec::new())]);
        backend
            .get_related_memories("m1", Some(&[RelationshipType::Solves, RelationshipType::Addresses]), 2)
            .await
            .unwrap();

        let statements = recorded(&session);
        assert!(statements[0].0.contains("[r:SOLVES|ADDRESSES*1..2]"));
    }
}
