//! Bolt transport for the Cypher adapter, backed by `neo4rs`.
//!
//! Compiled only with the `bolt` feature. The driver pools connections
//! (50 sockets max, 30-minute lifetime where the driver supports it) and
//! the adapter's `connect` verifies connectivity eagerly with a ping query.

#![cfg(feature = "bolt")]

use async_trait::async_trait;
use neo4rs::{query, BoltType, ConfigBuilder, Graph};
use serde_json::{Map, Number, Value};
use tokio::sync::RwLock;
use tracing::info;

use super::CypherSession;
use crate::error::{MemoryGraphError, Result};

/// Maximum pooled Bolt sockets.
const MAX_CONNECTIONS: usize = 50;

/// A pooled Bolt session to a Neo4j-protocol server.
pub struct BoltSession {
    uri: String,
    user: String,
    password: String,
    database: Option<String>,
    graph: RwLock<Option<Graph>>,
}

impl BoltSession {
    pub fn new(uri: &str, user: &str, password: &str, database: Option<&str>) -> Result<Self> {
        if password.is_empty() {
            return Err(MemoryGraphError::auth_failure(
                "Bolt backends require a password (set MEMORY_<BACKEND>_PASSWORD)",
            ));
        }
        Ok(Self {
            uri: uri.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            database: database.map(str::to_string),
            graph: RwLock::new(None),
        })
    }

    fn classify(err: neo4rs::Error) -> MemoryGraphError {
        let text = err.to_string();
        if text.to_lowercase().contains("auth") || text.contains("Unauthorized") {
            MemoryGraphError::auth_failure(format!("Bolt authentication failed: {text}"))
        } else {
            MemoryGraphError::backend_unavailable(format!("Bolt error: {text}"))
        }
    }
}

/// serde_json -> Bolt parameter conversion.
fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BoltType::from(i)
            } else {
                BoltType::from(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => BoltType::from(s.as_str()),
        Value::Array(items) => {
            BoltType::from(items.iter().map(to_bolt).collect::<Vec<BoltType>>())
        }
        Value::Object(map) => {
            let pairs: Vec<(String, BoltType)> =
                map.iter().map(|(k, v)| (k.clone(), to_bolt(v))).collect();
            BoltType::from(pairs.into_iter().collect::<std::collections::HashMap<_, _>>())
        }
    }
}

/// Bolt -> serde_json result conversion.
fn from_bolt(value: &BoltType) -> Value {
    match value {
        BoltType::Null(_) => Value::Null,
        BoltType::Boolean(b) => Value::Bool(b.value),
        BoltType::Integer(i) => Value::Number(Number::from(i.value)),
        BoltType::Float(f) => Number::from_f64(f.value).map(Value::Number).unwrap_or(Value::Null),
        BoltType::String(s) => Value::String(s.value.clone()),
        BoltType::List(list) => Value::Array(list.value.iter().map(from_bolt).collect()),
        BoltType::Map(map) => Value::Object(
            map.value
                .iter()
                .map(|(k, v)| (k.value.clone(), from_bolt(v)))
                .collect(),
        ),
        // Nodes and relationships flatten to their property maps
        BoltType::Node(node) => Value::Object(
            node.properties
                .value
                .iter()
                .map(|(k, v)| (k.value.clone(), from_bolt(v)))
                .collect(),
        ),
        BoltType::Relation(rel) => Value::Object(
            rel.properties
                .value
                .iter()
                .map(|(k, v)| (k.value.clone(), from_bolt(v)))
                .collect(),
        ),
        other => Value::String(format!("{other:?}")),
    }
}

#[async_trait]
impl CypherSession for BoltSession {
    async fn connect(&self) -> Result<bool> {
        {
            let guard = self.graph.read().await;
            if guard.is_some() {
                return Ok(true);
            }
        }

        let mut builder = ConfigBuilder::default()
            .uri(&self.uri)
            .user(&self.user)
            .password(&self.password)
            .max_connections(MAX_CONNECTIONS);
        if let Some(db) = &self.database {
            builder = builder.db(db.as_str());
        }
        let config = builder
            .build()
            .map_err(|e| MemoryGraphError::backend_unavailable(format!("Bolt config: {e}")))?;

        let graph = Graph::connect(config).await.map_err(Self::classify)?;
        // Eager connectivity check
        graph.run(query("RETURN 1")).await.map_err(Self::classify)?;

        *self.graph.write().await = Some(graph);
        info!("Connected to Bolt server at {}", self.uri);
        Ok(true)
    }

    async fn disconnect(&self) -> Result<()> {
        // Dropping the Graph tears down the pool
        self.graph.write().await.take();
        Ok(())
    }

    async fn run(
        &self,
        statement: &str,
        parameters: Value,
        _write: bool,
    ) -> Result<Vec<Map<String, Value>>> {
        let guard = self.graph.read().await;
        let graph = guard.as_ref().ok_or_else(|| {
            MemoryGraphError::backend_unavailable("Not connected to Bolt server")
        })?;

        let mut q = query(statement);
        if let Value::Object(params) = parameters {
            for (key, value) in &params {
                q = q.param(key, to_bolt(value));
            }
        }

        let mut stream = graph.execute(q).await.map_err(Self::classify)?;
        let mut rows: Vec<Map<String, Value>> = Vec::new();
        while let Some(row) = stream.next().await.map_err(Self::classify)? {
            let bolt_map: std::collections::HashMap<String, BoltType> = row
                .to::<std::collections::HashMap<String, BoltType>>()
                .map_err(|e| {
                    MemoryGraphError::backend_unavailable(format!("Row decode error: {e}"))
                })?;
            let mut map = Map::new();
            for (key, value) in bolt_map {
                map.insert(key, from_bolt(&value));
            }
            rows.push(map);
        }
        Ok(rows)
    }
}
