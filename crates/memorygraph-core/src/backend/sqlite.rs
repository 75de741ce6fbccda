//! Embedded relational backend.
//!
//! File-based SQLite store with the two-table node/edge schema, a JSON
//! document per node, LIKE-pattern search with fuzzy templates, and an
//! advisory in-memory adjacency index rebuilt on connect. A single embedded
//! writer is assumed; all writes go through an explicit transaction that
//! commits at operation boundaries and rolls back on any error path.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{
    GraphBackend, HealthStatistics, HealthStatus, RELATED_MEMORIES_LIMIT,
};
use crate::error::{MemoryGraphError, Result};
use crate::model::{
    Memory, MemoryStatistics, PaginatedResult, Relationship, RelationshipProperties,
    RelationshipType, SearchQuery,
};
use crate::search::fuzzy;

// ============================================================================
// GRAPH INDEX
// ============================================================================

/// One edge as tracked by the advisory in-memory index.
#[derive(Debug, Clone)]
struct EdgeRecord {
    id: String,
    from_id: String,
    to_id: String,
    rel_type: RelationshipType,
    strength: f64,
}

/// Advisory adjacency index over the relationships table.
///
/// Rebuilt from the authoritative tables on connect and kept in step by the
/// write paths; used only for read-side traversal shortcuts (multi-hop
/// `get_related_memories`).
#[derive(Debug, Default)]
struct GraphIndex {
    /// node id -> incident edge ids (both directions)
    adjacency: HashMap<String, Vec<String>>,
    /// edge id -> record
    edges: HashMap<String, EdgeRecord>,
}

impl GraphIndex {
    fn clear(&mut self) {
        self.adjacency.clear();
        self.edges.clear();
    }

    fn add_edge(&mut self, record: EdgeRecord) {
        self.adjacency
            .entry(record.from_id.clone())
            .or_default()
            .push(record.id.clone());
        self.adjacency
            .entry(record.to_id.clone())
            .or_default()
            .push(record.id.clone());
        self.edges.insert(record.id.clone(), record);
    }

    fn remove_edge(&mut self, edge_id: &str) {
        if let Some(record) = self.edges.remove(edge_id) {
            for node in [&record.from_id, &record.to_id] {
                if let Some(ids) = self.adjacency.get_mut(node) {
                    ids.retain(|id| id != edge_id);
                }
            }
        }
    }

    fn remove_node(&mut self, node_id: &str) {
        let incident: Vec<String> = self
            .adjacency
            .get(node_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        for edge_id in incident {
            self.remove_edge(&edge_id);
        }
        self.adjacency.remove(node_id);
    }

    fn set_strength(&mut self, edge_id: &str, strength: f64) {
        if let Some(record) = self.edges.get_mut(edge_id) {
            record.strength = strength;
        }
    }

    /// BFS to `max_depth`, returning neighbour id -> representative
    /// first-hop edge id, honouring an optional type allow-list.
    fn reachable(
        &self,
        start: &str,
        max_depth: u32,
        allowed: Option<&HashSet<RelationshipType>>,
    ) -> HashMap<String, String> {
        let mut representative: HashMap<String, String> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut level: Vec<(&str, Option<&str>)> = vec![(start, None)];
        let mut depth = 0;

        while !level.is_empty() && depth < max_depth {
            let mut next: Vec<(&str, Option<&str>)> = Vec::new();
            for (node, first_hop) in level {
                for edge_id in self.adjacency.get(node).into_iter().flatten() {
                    let Some(edge) = self.edges.get(edge_id) else { continue };
                    if let Some(allowed) = allowed {
                        if !allowed.contains(&edge.rel_type) {
                            continue;
                        }
                    }
                    let neighbor = if edge.from_id == node {
                        edge.to_id.as_str()
                    } else {
                        edge.from_id.as_str()
                    };
                    if visited.insert(neighbor) {
                        let hop = first_hop.unwrap_or(edge_id.as_str());
                        representative.insert(neighbor.to_string(), hop.to_string());
                        next.push((neighbor, Some(hop)));
                    }
                }
            }
            level = next;
            depth += 1;
        }

        representative
    }
}

// ============================================================================
// BACKEND
// ============================================================================

/// Embedded SQLite implementation of the [`GraphBackend`] contract.
pub struct SqliteBackend {
    db_path: PathBuf,
    conn: Mutex<Option<Connection>>,
    graph: Mutex<GraphIndex>,
    fulltext: AtomicBool,
}

/// `~/.memorygraph/memory.db`, falling back to the working directory when
/// no home directory can be resolved.
pub fn default_db_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".memorygraph").join("memory.db"))
        .unwrap_or_else(|| PathBuf::from(".memorygraph/memory.db"))
}

impl SqliteBackend {
    /// Create a backend for the given database file (or the default path).
    /// The parent directory is created eagerly; the connection is opened by
    /// [`GraphBackend::connect`].
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = db_path.unwrap_or_else(default_db_path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            db_path,
            conn: Mutex::new(None),
            graph: Mutex::new(GraphIndex::default()),
            fulltext: AtomicBool::new(false),
        })
    }

    /// Create and connect in one step.
    pub async fn create(db_path: Option<PathBuf>) -> Result<Self> {
        let backend = Self::new(db_path)?;
        backend.connect().await?;
        Ok(backend)
    }

    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }

    /// Run `f` with the live connection, or fail with `BackendUnavailable`.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| MemoryGraphError::backend_unavailable("SQLite connection poisoned"))?;
        let conn = guard.as_ref().ok_or_else(|| {
            MemoryGraphError::backend_unavailable("Not connected to SQLite. Call connect() first.")
        })?;
        f(conn)
    }

    /// Load the complete node/edge set into the advisory adjacency index.
    fn load_graph_index(&self) -> Result<()> {
        let records = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, from_id, to_id, rel_type, properties FROM relationships")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })?;

        let mut graph = self.graph_lock()?;
        graph.clear();
        let mut count = 0usize;
        for (id, from_id, to_id, rel_type, props_json) in records {
            let Some(rel_type) = RelationshipType::parse(&rel_type) else {
                continue;
            };
            let strength = serde_json::from_str::<Value>(&props_json)
                .ok()
                .and_then(|v| v.get("strength").and_then(Value::as_f64))
                .unwrap_or(0.5);
            graph.add_edge(EdgeRecord { id, from_id, to_id, rel_type, strength });
            count += 1;
        }
        debug!(edges = count, "Loaded adjacency index from relationships table");
        Ok(())
    }

    fn graph_lock(&self) -> Result<std::sync::MutexGuard<'_, GraphIndex>> {
        self.graph
            .lock()
            .map_err(|_| MemoryGraphError::backend_unavailable("Adjacency index poisoned"))
    }

    fn memory_exists(conn: &Connection, memory_id: &str) -> Result<bool> {
        let found: Option<String> = conn
            .query_row(
                "SELECT id FROM nodes WHERE id = ?1 AND label = 'Memory'",
                [memory_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Best-effort write-through of the full-text table.
    fn sync_fulltext(&self, conn: &Connection, memory: &Memory) {
        if !self.fulltext.load(Ordering::Relaxed) {
            return;
        }
        let Some(id) = memory.id.as_deref() else { return };
        let result = conn
            .execute("DELETE FROM nodes_fts WHERE id = ?1", [id])
            .and_then(|_| {
                conn.execute(
                    "INSERT INTO nodes_fts (rowid, id, title, content, summary)
                     SELECT rowid, ?1, ?2, ?3, ?4 FROM nodes WHERE id = ?1",
                    rusqlite::params![
                        id,
                        memory.title,
                        memory.content,
                        memory.summary.as_deref().unwrap_or("")
                    ],
                )
            });
        if let Err(e) = result {
            debug!("Full-text sync skipped: {e}");
        }
    }

    fn remove_fulltext(&self, conn: &Connection, memory_id: &str) {
        if !self.fulltext.load(Ordering::Relaxed) {
            return;
        }
        if let Err(e) = conn.execute("DELETE FROM nodes_fts WHERE id = ?1", [memory_id]) {
            debug!("Full-text delete skipped: {e}");
        }
    }

    fn row_to_memory(props_json: &str) -> Option<Memory> {
        match serde_json::from_str::<Value>(props_json) {
            Ok(Value::Object(map)) => Memory::from_flat_properties(&map),
            _ => None,
        }
    }

    fn relationship_from_row(
        rel_id: String,
        from_id: String,
        to_id: String,
        rel_type: &str,
        props_json: &str,
    ) -> Relationship {
        let relationship_type =
            RelationshipType::parse(rel_type).unwrap_or(RelationshipType::RelatedTo);
        let properties: RelationshipProperties =
            serde_json::from_str(props_json).unwrap_or_default();
        Relationship {
            id: Some(rel_id),
            from_memory_id: from_id,
            to_memory_id: to_id,
            relationship_type,
            properties,
        }
    }

    /// Build the WHERE clause and parameters for a search query.
    fn build_search_predicates(query: &SearchQuery) -> (Vec<String>, Vec<SqlValue>) {
        let mut conditions: Vec<String> = vec!["label = 'Memory'".to_string()];
        let mut params: Vec<SqlValue> = Vec::new();

        let text_fields = |conditions: &mut Vec<String>, params: &mut Vec<SqlValue>, pattern: &str| {
            conditions.push(
                "(json_extract(properties, '$.title') LIKE ? OR \
                 json_extract(properties, '$.content') LIKE ? OR \
                 json_extract(properties, '$.summary') LIKE ?)"
                    .to_string(),
            );
            for _ in 0..3 {
                params.push(SqlValue::Text(pattern.to_string()));
            }
        };

        // Multi-term search takes precedence over the single query
        if !query.terms.is_empty() {
            let mut term_conditions: Vec<String> = Vec::new();
            for term in &query.terms {
                let mut pattern_conditions: Vec<String> = Vec::new();
                for (pattern, _weight) in fuzzy::patterns(term, query.search_tolerance) {
                    text_fields(&mut pattern_conditions, &mut params, &pattern);
                }
                if !pattern_conditions.is_empty() {
                    term_conditions.push(format!("({})", pattern_conditions.join(" OR ")));
                }
            }
            if !term_conditions.is_empty() {
                let joiner = match query.match_mode {
                    crate::model::MatchMode::All => " AND ",
                    crate::model::MatchMode::Any => " OR ",
                };
                conditions.push(format!("({})", term_conditions.join(joiner)));
            }
        } else if let Some(text) = query.query.as_deref().filter(|q| !q.trim().is_empty()) {
            let mut pattern_conditions: Vec<String> = Vec::new();
            for (pattern, _weight) in fuzzy::patterns(text, query.search_tolerance) {
                text_fields(&mut pattern_conditions, &mut params, &pattern);
            }
            if !pattern_conditions.is_empty() {
                conditions.push(format!("({})", pattern_conditions.join(" OR ")));
            }
        }

        if !query.memory_types.is_empty() {
            let placeholders = vec!["?"; query.memory_types.len()].join(",");
            conditions.push(format!(
                "json_extract(properties, '$.type') IN ({placeholders})"
            ));
            for t in &query.memory_types {
                params.push(SqlValue::Text(t.as_str().to_string()));
            }
        }

        if !query.tags.is_empty() {
            let mut tag_conditions = Vec::new();
            for tag in &query.tags {
                tag_conditions.push("json_extract(properties, '$.tags') LIKE ?".to_string());
                params.push(SqlValue::Text(format!("%\"{}\"%", tag.trim().to_lowercase())));
            }
            conditions.push(format!("({})", tag_conditions.join(" OR ")));
        }

        if let Some(project_path) = &query.project_path {
            conditions.push("json_extract(properties, '$.context_project_path') = ?".to_string());
            params.push(SqlValue::Text(project_path.clone()));
        }

        if let Some(min_importance) = query.min_importance {
            conditions
                .push("CAST(json_extract(properties, '$.importance') AS REAL) >= ?".to_string());
            params.push(SqlValue::Real(min_importance));
        }

        if let Some(min_confidence) = query.min_confidence {
            conditions
                .push("CAST(json_extract(properties, '$.confidence') AS REAL) >= ?".to_string());
            params.push(SqlValue::Real(min_confidence));
        }

        if let Some(created_after) = query.created_after {
            conditions.push("json_extract(properties, '$.created_at') >= ?".to_string());
            params.push(SqlValue::Text(created_after.to_rfc3339()));
        }

        if let Some(created_before) = query.created_before {
            conditions.push("json_extract(properties, '$.created_at') <= ?".to_string());
            params.push(SqlValue::Text(created_before.to_rfc3339()));
        }

        (conditions, params)
    }

    fn query_memories(
        conn: &Connection,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Vec<Memory>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            row.get::<_, String>(0)
        })?;
        let mut memories = Vec::new();
        for row in rows {
            if let Some(memory) = Self::row_to_memory(&row?) {
                memories.push(memory);
            }
        }
        Ok(memories)
    }

    fn fetch_memories_by_ids(conn: &Connection, ids: &[String]) -> Result<HashMap<String, Memory>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT properties FROM nodes WHERE label = 'Memory' AND id IN ({placeholders})"
        );
        let params: Vec<SqlValue> = ids.iter().map(|id| SqlValue::Text(id.clone())).collect();
        let memories = Self::query_memories(conn, &sql, params)?;
        Ok(memories
            .into_iter()
            .filter_map(|m| m.id.clone().map(|id| (id, m)))
            .collect())
    }

    fn fetch_relationship_by_id(conn: &Connection, edge_id: &str) -> Result<Option<Relationship>> {
        let row = conn
            .query_row(
                "SELECT id, from_id, to_id, rel_type, properties FROM relationships WHERE id = ?1",
                [edge_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        Ok(row.map(|(id, from, to, rel_type, props)| {
            Self::relationship_from_row(id, from, to, &rel_type, &props)
        }))
    }

    /// Direct (depth 1) neighbourhood from the authoritative tables.
    fn related_depth_one(
        &self,
        memory_id: &str,
        relationship_types: Option<&[RelationshipType]>,
    ) -> Result<Vec<(Memory, Relationship)>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT n.properties, r.id, r.from_id, r.to_id, r.rel_type, r.properties
                 FROM relationships r
                 JOIN nodes n
                   ON n.id = CASE WHEN r.from_id = ?1 THEN r.to_id ELSE r.from_id END
                 WHERE (r.from_id = ?1 OR r.to_id = ?1)
                   AND n.label = 'Memory'
                   AND n.id != ?1",
            );
            let mut params: Vec<SqlValue> = vec![SqlValue::Text(memory_id.to_string())];
            if let Some(types) = relationship_types.filter(|t| !t.is_empty()) {
                let placeholders: Vec<String> = (0..types.len())
                    .map(|i| format!("?{}", i + 2))
                    .collect();
                sql.push_str(&format!(" AND r.rel_type IN ({})", placeholders.join(",")));
                for t in types {
                    params.push(SqlValue::Text(t.as_str().to_string()));
                }
            }
            sql.push_str(
                " ORDER BY CAST(json_extract(r.properties, '$.strength') AS REAL) DESC,
                           CAST(json_extract(n.properties, '$.importance') AS REAL) DESC
                  LIMIT ?",
            );
            params.push(SqlValue::Integer(RELATED_MEMORIES_LIMIT as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?;

            let mut related = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();
            for row in rows {
                let (node_props, rel_id, from_id, to_id, rel_type, rel_props) = row?;
                let Some(memory) = Self::row_to_memory(&node_props) else { continue };
                let Some(id) = memory.id.clone() else { continue };
                if !seen.insert(id) {
                    continue;
                }
                related.push((
                    memory,
                    Self::relationship_from_row(rel_id, from_id, to_id, &rel_type, &rel_props),
                ));
            }
            Ok(related)
        })
    }
}

#[async_trait]
impl GraphBackend for SqliteBackend {
    async fn connect(&self) -> Result<bool> {
        {
            let mut guard = self.conn.lock().map_err(|_| {
                MemoryGraphError::backend_unavailable("SQLite connection poisoned")
            })?;
            if guard.is_some() {
                return Ok(true);
            }
            let conn = Connection::open(&self.db_path).map_err(|e| {
                MemoryGraphError::backend_unavailable(format!(
                    "Failed to connect to SQLite at {}: {e}",
                    self.db_path.display()
                ))
            })?;
            Self::configure_connection(&conn)?;
            *guard = Some(conn);
        }
        // Schema must exist before the index can load; both are idempotent.
        self.initialize_schema().await?;
        self.load_graph_index()?;
        info!("Connected to SQLite database at {}", self.db_path.display());
        Ok(true)
    }

    async fn disconnect(&self) -> Result<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| MemoryGraphError::backend_unavailable("SQLite connection poisoned"))?;
        if guard.take().is_some() {
            // The adjacency index is advisory; drop it with the connection
            self.graph_lock()?.clear();
            info!("SQLite connection closed");
        }
        Ok(())
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS nodes (
                     id TEXT PRIMARY KEY,
                     label TEXT NOT NULL,
                     properties TEXT NOT NULL,
                     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                     updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                 );
                 CREATE TABLE IF NOT EXISTS relationships (
                     id TEXT PRIMARY KEY,
                     from_id TEXT NOT NULL,
                     to_id TEXT NOT NULL,
                     rel_type TEXT NOT NULL,
                     properties TEXT NOT NULL,
                     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                     FOREIGN KEY (from_id) REFERENCES nodes(id) ON DELETE CASCADE,
                     FOREIGN KEY (to_id) REFERENCES nodes(id) ON DELETE CASCADE
                 );
                 CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label);
                 CREATE INDEX IF NOT EXISTS idx_nodes_created ON nodes(created_at);
                 CREATE INDEX IF NOT EXISTS idx_rel_from ON relationships(from_id);
                 CREATE INDEX IF NOT EXISTS idx_rel_to ON relationships(to_id);
                 CREATE INDEX IF NOT EXISTS idx_rel_type ON relationships(rel_type);",
            )
            .map_err(|e| MemoryGraphError::schema(format!("Failed to initialize schema: {e}")))?;
            tx.commit()
                .map_err(|e| MemoryGraphError::schema(format!("Failed to commit schema: {e}")))?;

            // FTS5 is optional; LIKE-pattern search is the fallback
            match conn.execute_batch(
                "CREATE VIRTUAL TABLE IF NOT EXISTS nodes_fts USING fts5(
                     id UNINDEXED, title, content, summary
                 )",
            ) {
                Ok(()) => {
                    self.fulltext.store(true, Ordering::Relaxed);
                    debug!("Created FTS5 table for full-text search");
                }
                Err(e) => {
                    self.fulltext.store(false, Ordering::Relaxed);
                    warn!("Could not create FTS5 table (may not be available): {e}");
                }
            }
            Ok(())
        })
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let mut status = HealthStatus {
            connected: false,
            backend_name: "sqlite".to_string(),
            ..HealthStatus::default()
        };

        let details = self.with_conn(|conn| {
            let memory_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM nodes WHERE label = 'Memory'",
                [],
                |row| row.get(0),
            )?;
            let relationship_count: i64 =
                conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;
            let version: String =
                conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
            Ok((memory_count, relationship_count, version))
        });

        match details {
            Ok((memory_count, relationship_count, version)) => {
                status.connected = true;
                status.version = Some(version);
                status.statistics = Some(HealthStatistics {
                    memory_count: memory_count.max(0) as u64,
                    relationship_count: Some(relationship_count.max(0) as u64),
                });
                status.database_size_bytes = std::fs::metadata(&self.db_path)
                    .ok()
                    .map(|metadata| metadata.len());
            }
            Err(e) => {
                status.warning = Some(e.to_string());
            }
        }
        Ok(status)
    }

    async fn execute_query(
        &self,
        query: &str,
        _parameters: Value,
        _write: bool,
    ) -> Result<Vec<Map<String, Value>>> {
        // Schema statements are handled by initialize_schema; anything else
        // would require a Cypher interpreter this backend does not carry.
        let head = query.trim().to_uppercase();
        if head.starts_with("CREATE") || head.starts_with("DROP") || head.starts_with("ALTER") {
            return Ok(Vec::new());
        }
        Err(MemoryGraphError::unsupported_query(
            "SQLite backend does not interpret free-form queries; use the repository operations",
        ))
    }

    async fn store_memory(&self, memory: &Memory) -> Result<String> {
        let mut memory = memory.clone();
        let memory_id = memory.ensure_id();
        let properties_json = Value::Object(memory.to_flat_properties()).to_string();

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let exists = Self::memory_exists(&tx, &memory_id)?;
            if exists {
                tx.execute(
                    "UPDATE nodes SET properties = ?1, updated_at = CURRENT_TIMESTAMP
                     WHERE id = ?2 AND label = 'Memory'",
                    rusqlite::params![properties_json, memory_id],
                )?;
            } else {
                tx.execute(
                    "INSERT INTO nodes (id, label, properties, created_at, updated_at)
                     VALUES (?1, 'Memory', ?2, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
                    rusqlite::params![memory_id, properties_json],
                )?;
            }
            tx.commit()?;
            self.sync_fulltext(conn, &memory);
            Ok(())
        })?;

        info!("Stored memory: {memory_id} ({})", memory.memory_type);
        Ok(memory_id)
    }

    async fn get_memory(&self, memory_id: &str) -> Result<Option<Memory>> {
        self.with_conn(|conn| {
            let props: Option<String> = conn
                .query_row(
                    "SELECT properties FROM nodes WHERE id = ?1 AND label = 'Memory'",
                    [memory_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(props.as_deref().and_then(Self::row_to_memory))
        })
    }

    async fn update_memory(&self, memory: &Memory) -> Result<bool> {
        let memory_id = memory
            .id
            .clone()
            .ok_or_else(|| MemoryGraphError::validation("Memory must have an ID to update"))?;
        let properties_json = Value::Object(memory.to_flat_properties()).to_string();

        let updated = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let changed = tx.execute(
                "UPDATE nodes SET properties = ?1, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?2 AND label = 'Memory'",
                rusqlite::params![properties_json, memory_id],
            )?;
            tx.commit()?;
            if changed > 0 {
                self.sync_fulltext(conn, memory);
            }
            Ok(changed > 0)
        })?;

        if updated {
            info!("Updated memory: {memory_id}");
        }
        Ok(updated)
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<bool> {
        let deleted = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            if !Self::memory_exists(&tx, memory_id)? {
                return Ok(false);
            }
            // Cascade is also declared on the schema; delete explicitly so
            // the behavior does not depend on foreign_keys being enabled.
            tx.execute(
                "DELETE FROM relationships WHERE from_id = ?1 OR to_id = ?1",
                [memory_id],
            )?;
            tx.execute(
                "DELETE FROM nodes WHERE id = ?1 AND label = 'Memory'",
                [memory_id],
            )?;
            tx.commit()?;
            self.remove_fulltext(conn, memory_id);
            Ok(true)
        })?;

        if deleted {
            self.graph_lock()?.remove_node(memory_id);
            info!("Deleted memory: {memory_id}");
        }
        Ok(deleted)
    }

    async fn create_relationship(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        relationship_type: RelationshipType,
        properties: &RelationshipProperties,
    ) -> Result<String> {
        if from_memory_id == to_memory_id {
            return Err(MemoryGraphError::relationship(
                "Cannot create relationship from memory to itself",
            ));
        }

        let bidirectional = relationship_type.is_bidirectional();
        let mut properties = properties.clone();
        properties.clamp_scores();
        let props_json = serde_json::to_string(&properties)?;

        let (edge_id, inserted) = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            if !Self::memory_exists(&tx, from_memory_id)? || !Self::memory_exists(&tx, to_memory_id)?
            {
                return Err(MemoryGraphError::relationship(format!(
                    "One or both memories not found: {from_memory_id}, {to_memory_id}"
                ))
                .with_detail("from_id", from_memory_id)
                .with_detail("to_id", to_memory_id));
            }

            // One edge row per (from, to, type); for symmetric types the
            // reversed orientation counts as the same edge
            let existing: Option<String> = if bidirectional {
                tx.query_row(
                    "SELECT id FROM relationships
                     WHERE rel_type = ?1
                       AND ((from_id = ?2 AND to_id = ?3) OR (from_id = ?3 AND to_id = ?2))",
                    rusqlite::params![relationship_type.as_str(), from_memory_id, to_memory_id],
                    |row| row.get(0),
                )
                .optional()?
            } else {
                tx.query_row(
                    "SELECT id FROM relationships
                     WHERE rel_type = ?1 AND from_id = ?2 AND to_id = ?3",
                    rusqlite::params![relationship_type.as_str(), from_memory_id, to_memory_id],
                    |row| row.get(0),
                )
                .optional()?
            };

            let (edge_id, inserted) = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE relationships SET properties = ?1 WHERE id = ?2",
                        rusqlite::params![props_json, id],
                    )?;
                    (id, false)
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO relationships (id, from_id, to_id, rel_type, properties, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP)",
                        rusqlite::params![
                            id,
                            from_memory_id,
                            to_memory_id,
                            relationship_type.as_str(),
                            props_json
                        ],
                    )?;
                    (id, true)
                }
            };
            tx.commit()?;
            Ok((edge_id, inserted))
        })?;

        {
            let mut graph = self.graph_lock()?;
            if inserted {
                graph.add_edge(EdgeRecord {
                    id: edge_id.clone(),
                    from_id: from_memory_id.to_string(),
                    to_id: to_memory_id.to_string(),
                    rel_type: relationship_type,
                    strength: properties.strength,
                });
            } else {
                graph.set_strength(&edge_id, properties.strength);
            }
        }

        info!(
            "Created relationship: {relationship_type} between {from_memory_id} and {to_memory_id}"
        );
        Ok(edge_id)
    }

    async fn get_related_memories(
        &self,
        memory_id: &str,
        relationship_types: Option<&[RelationshipType]>,
        max_depth: u32,
    ) -> Result<Vec<(Memory, Relationship)>> {
        if max_depth <= 1 {
            return self.related_depth_one(memory_id, relationship_types);
        }

        // Multi-hop reads go through the advisory index; memories and edges
        // themselves are still fetched from the authoritative tables.
        let allowed: Option<HashSet<RelationshipType>> =
            relationship_types.map(|types| types.iter().copied().collect());
        let representative = self
            .graph_lock()?
            .reachable(memory_id, max_depth, allowed.as_ref());

        let neighbor_ids: Vec<String> = representative.keys().cloned().collect();
        let (memories, edges) = self.with_conn(|conn| {
            let memories = Self::fetch_memories_by_ids(conn, &neighbor_ids)?;
            let mut edges: HashMap<String, Relationship> = HashMap::new();
            for edge_id in representative.values() {
                if !edges.contains_key(edge_id) {
                    if let Some(rel) = Self::fetch_relationship_by_id(conn, edge_id)? {
                        edges.insert(edge_id.clone(), rel);
                    }
                }
            }
            Ok((memories, edges))
        })?;

        let mut related: Vec<(Memory, Relationship)> = Vec::new();
        for (neighbor_id, edge_id) in &representative {
            let (Some(memory), Some(relationship)) =
                (memories.get(neighbor_id), edges.get(edge_id))
            else {
                continue;
            };
            related.push((memory.clone(), relationship.clone()));
        }

        related.sort_by(|a, b| {
            b.1.properties
                .strength
                .total_cmp(&a.1.properties.strength)
                .then_with(|| b.0.importance.total_cmp(&a.0.importance))
        });
        related.truncate(RELATED_MEMORIES_LIMIT);
        Ok(related)
    }

    async fn search_memories(&self, query: &SearchQuery) -> Result<Vec<Memory>> {
        query.validate()?;
        let (conditions, mut params) = Self::build_search_predicates(query);
        let sql = format!(
            "SELECT properties FROM nodes
             WHERE {}
             ORDER BY CAST(json_extract(properties, '$.importance') AS REAL) DESC,
                      json_extract(properties, '$.created_at') DESC
             LIMIT ? OFFSET ?",
            conditions.join(" AND ")
        );
        params.push(SqlValue::Integer(query.limit as i64));
        params.push(SqlValue::Integer(query.offset as i64));

        let memories = self.with_conn(|conn| Self::query_memories(conn, &sql, params))?;
        debug!("Found {} memories for search query", memories.len());
        Ok(memories)
    }

    async fn search_memories_paginated(&self, query: &SearchQuery) -> Result<PaginatedResult> {
        query.validate()?;
        let (conditions, params) = Self::build_search_predicates(query);
        let where_clause = conditions.join(" AND ");

        let total_count = self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) FROM nodes WHERE {where_clause}");
            let count: i64 = conn.query_row(
                &sql,
                rusqlite::params_from_iter(params.clone()),
                |row| row.get(0),
            )?;
            Ok(count.max(0) as usize)
        })?;

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
        let mut properties = properties.clone();
        properties.clamp_scores();
        let props_json = serde_json::to_string(&properties)?;
        let bidirectional = relationship_type.is_bidirectional();

        let edge_id = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let lookup = |from: &str, to: &str| -> Result<Option<String>> {
                Ok(tx
                    .query_row(
                        "SELECT id FROM relationships
                         WHERE rel_type = ?1 AND from_id = ?2 AND to_id = ?3",
                        rusqlite::params![relationship_type.as_str(), from, to],
                        |row| row.get(0),
                    )
                    .optional()?)
            };

            let mut edge_id = lookup(from_memory_id, to_memory_id)?;
            if edge_id.is_none() && bidirectional {
                edge_id = lookup(to_memory_id, from_memory_id)?;
            }

            if let Some(id) = &edge_id {
                tx.execute(
                    "UPDATE relationships SET properties = ?1 WHERE id = ?2",
                    rusqlite::params![props_json, id],
                )?;
            }
            tx.commit()?;
            Ok(edge_id)
        })?;

        match edge_id {
            Some(id) => {
                self.graph_lock()?.set_strength(&id, properties.strength);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_memory_statistics(&self) -> Result<MemoryStatistics> {
        self.with_conn(|conn| {
            let total_memories: i64 = conn.query_row(
                "SELECT COUNT(*) FROM nodes WHERE label = 'Memory'",
                [],
                |row| row.get(0),
            )?;
            let total_relationships: i64 =
                conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;

            let mut memories_by_type = std::collections::BTreeMap::new();
            let mut stmt = conn.prepare(
                "SELECT json_extract(properties, '$.type') AS type, COUNT(*) AS count
                 FROM nodes WHERE label = 'Memory'
                 GROUP BY json_extract(properties, '$.type')",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (memory_type, count) = row?;
                if let Some(memory_type) = memory_type {
                    memories_by_type.insert(memory_type, count.max(0) as u64);
                }
            }

            let avg_importance: Option<f64> = conn.query_row(
                "SELECT AVG(CAST(json_extract(properties, '$.importance') AS REAL))
                 FROM nodes WHERE label = 'Memory'",
                [],
                |row| row.get(0),
            )?;
            let avg_confidence: Option<f64> = conn.query_row(
                "SELECT AVG(CAST(json_extract(properties, '$.confidence') AS REAL))
                 FROM nodes WHERE label = 'Memory'",
                [],
                |row| row.get(0),
            )?;

            Ok(MemoryStatistics {
                total_memories: total_memories.max(0) as u64,
                memories_by_type,
                total_relationships: total_relationships.max(0) as u64,
                avg_importance: avg_importance.unwrap_or(0.0),
                avg_confidence: avg_confidence.unwrap_or(0.0),
            })
        })
    }

    async fn clear_all_data(&self) -> Result<u64> {
        let removed = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM relationships", [])?;
            let removed = tx.execute("DELETE FROM nodes WHERE label = 'Memory'", [])?;
            tx.commit()?;
            if self.fulltext.load(Ordering::Relaxed) {
                let _ = conn.execute("DELETE FROM nodes_fts", []);
            }
            Ok(removed as u64)
        })?;
        self.graph_lock()?.clear();
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_fulltext_search(&self) -> bool {
        self.fulltext.load(Ordering::Relaxed)
    }

    fn supports_transactions(&self) -> bool {
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================
