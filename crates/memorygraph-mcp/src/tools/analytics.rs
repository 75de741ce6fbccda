//! Advanced relationship analytics tool group.
//!
//! These run the traversal kernel over a full graph snapshot built by the
//! repository (paginated memory and relationship fetches), so path finding,
//! cluster detection, and bridge identification operate on the real graph.

use serde::Deserialize;
use serde_json::{json, Value};

use memorygraph_core::graph::{
    DEFAULT_MIN_CLUSTER_DENSITY, DEFAULT_MIN_CLUSTER_SIZE, DEFAULT_PATH_DEPTH,
};
use memorygraph_core::model::{
    suggest_relationship_type, Memory, RelationshipCategory, RelationshipType,
};

use super::memory::parse_args;
use super::{HandlerFuture, ServerState, ToolDef, ToolGroup};

pub fn tool_definitions() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "find_memory_path",
            description: "Find the shortest relationship path between two memories, optionally \
                          restricted to given relationship types.",
            group: ToolGroup::Advanced,
            schema: path_schema,
            handler: find_memory_path,
        },
        ToolDef {
            name: "analyze_memory_clusters",
            description: "Detect clusters of densely connected memories (connected components \
                          filtered by size and density).",
            group: ToolGroup::Advanced,
            schema: clusters_schema,
            handler: analyze_memory_clusters,
        },
        ToolDef {
            name: "find_bridge_memories",
            description: "Identify memories that bridge otherwise separate clusters.",
            group: ToolGroup::Advanced,
            schema: bridges_schema,
            handler: find_bridge_memories,
        },
        ToolDef {
            name: "suggest_relationship_type",
            description: "Suggest appropriate relationship types for a memory pair based on \
                          their memory types.",
            group: ToolGroup::Advanced,
            schema: suggest_schema,
            handler: suggest_relationship,
        },
        ToolDef {
            name: "reinforce_relationship",
            description: "Reinforce a relationship after observed use: bumps evidence counters \
                          and adjusts strength/confidence up on success, down on failure.",
            group: ToolGroup::Advanced,
            schema: reinforce_schema,
            handler: reinforce_relationship,
        },
        ToolDef {
            name: "get_relationship_types_by_category",
            description: "List the relationship types in a category (causal, solution, context, \
                          learning, similarity, workflow, quality).",
            group: ToolGroup::Advanced,
            schema: category_schema,
            handler: get_relationship_types_by_category,
        },
        ToolDef {
            name: "analyze_graph_metrics",
            description: "Comprehensive graph metrics: node/edge counts, average degree, \
                          density, strength, and category/type distributions.",
            group: ToolGroup::Advanced,
            schema: metrics_schema,
            handler: analyze_graph_metrics,
        },
    ]
}

// ============================================================================
// SCHEMAS
// ============================================================================

fn path_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "from_memory_id": { "type": "string", "description": "Starting memory ID" },
            "to_memory_id": { "type": "string", "description": "Target memory ID" },
            "max_depth": {
                "type": "integer", "minimum": 1, "maximum": 10,
                "description": "Maximum path length to search (default: 5)"
            },
            "relationship_types": {
                "type": "array", "items": { "type": "string" },
                "description": "Only traverse these relationship types"
            }
        },
        "required": ["from_memory_id", "to_memory_id"]
    })
}

fn clusters_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "min_size": {
                "type": "integer", "minimum": 2,
                "description": "Minimum cluster size (default: 3)"
            },
            "min_density": {
                "type": "number", "minimum": 0.0, "maximum": 1.0,
                "description": "Minimum cluster density (default: 0.3)"
            }
        }
    })
}

fn bridges_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn suggest_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "from_memory_id": { "type": "string", "description": "Source memory ID" },
            "to_memory_id": { "type": "string", "description": "Target memory ID" }
        },
        "required": ["from_memory_id", "to_memory_id"]
    })
}

fn reinforce_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "from_memory_id": { "type": "string", "description": "Source memory ID" },
            "to_memory_id": { "type": "string", "description": "Target memory ID" },
            "success": {
                "type": "boolean",
                "description": "Whether the observed use was a success (default: true)"
            }
        },
        "required": ["from_memory_id", "to_memory_id"]
    })
}

fn category_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "category": {
                "type": "string",
                "enum": ["causal", "solution", "context", "learning", "similarity", "workflow", "quality"],
                "description": "The relationship category"
            }
        },
        "required": ["category"]
    })
}

fn metrics_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

// ============================================================================
// HANDLERS
// ============================================================================

fn brief(memory: &Memory) -> Value {
    json!({
        "memory_id": memory.id,
        "title": memory.title,
        "type": memory.memory_type.as_str(),
        "importance": memory.importance,
    })
}

#[derive(Deserialize)]
struct PathArgs {
    from_memory_id: String,
    to_memory_id: String,
    max_depth: Option<usize>,
    relationship_types: Option<Vec<String>>,
}

fn find_memory_path(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: PathArgs = parse_args(args)?;
        let types = match &args.relationship_types {
            Some(raw) => Some(
                raw.iter()
                    .map(|t| RelationshipType::parse_strict(t).map_err(|e| e.to_string()))
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        let snapshot = state
            .repository
            .load_snapshot()
            .await
            .map_err(|e| e.to_string())?;
        let path = snapshot.shortest_path(
            &args.from_memory_id,
            &args.to_memory_id,
            args.max_depth.unwrap_or(DEFAULT_PATH_DEPTH),
            types.as_deref(),
        );

        Ok(match path {
            Some(path) => json!({
                "found": true,
                "from_memory_id": args.from_memory_id,
                "to_memory_id": args.to_memory_id,
                "hops": path.len(),
                "total_strength": path.total_strength,
                "average_strength": path.average_strength(),
                "memories": path.memories.iter().map(brief).collect::<Vec<_>>(),
                "relationships": path
                    .relationships
                    .iter()
                    .map(|r| json!({
                        "type": r.relationship_type.as_str(),
                        "from_memory_id": r.from_memory_id,
                        "to_memory_id": r.to_memory_id,
                        "strength": r.properties.strength,
                    }))
                    .collect::<Vec<_>>(),
            }),
            None => json!({
                "found": false,
                "from_memory_id": args.from_memory_id,
                "to_memory_id": args.to_memory_id,
                "searched_depth": args.max_depth.unwrap_or(DEFAULT_PATH_DEPTH),
            }),
        })
    })
}

#[derive(Deserialize)]
struct ClustersArgs {
    min_size: Option<usize>,
    min_density: Option<f64>,
}

fn analyze_memory_clusters(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: ClustersArgs = parse_args(args)?;
        let snapshot = state
            .repository
            .load_snapshot()
            .await
            .map_err(|e| e.to_string())?;
        let clusters = snapshot.clusters(
            args.min_size.unwrap_or(DEFAULT_MIN_CLUSTER_SIZE),
            args.min_density.unwrap_or(DEFAULT_MIN_CLUSTER_DENSITY),
        );

        Ok(json!({
            "cluster_count": clusters.len(),
            "clusters": clusters
                .iter()
                .map(|cluster| json!({
                    "size": cluster.memories.len(),
                    "density": cluster.density,
                    "strength": cluster.strength,
                    "categories": cluster
                        .categories
                        .iter()
                        .map(|c| c.as_str())
                        .collect::<Vec<_>>(),
                    "memories": cluster.memories.iter().map(brief).collect::<Vec<_>>(),
                }))
                .collect::<Vec<_>>(),
        }))
    })
}

fn find_bridge_memories(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let _: Value = args.unwrap_or_default();
        let snapshot = state
            .repository
            .load_snapshot()
            .await
            .map_err(|e| e.to_string())?;
        let clusters = snapshot.clusters(DEFAULT_MIN_CLUSTER_SIZE, DEFAULT_MIN_CLUSTER_DENSITY);
        let bridges = snapshot.bridges(&clusters);

        Ok(json!({
            "cluster_count": clusters.len(),
            "bridge_count": bridges.len(),
            "bridges": bridges
                .iter()
                .map(|bridge| json!({
                    "memory": brief(&bridge.memory),
                    "connected_clusters": bridge.connected_clusters,
                    "bridge_strength": bridge.bridge_strength,
                }))
                .collect::<Vec<_>>(),
        }))
    })
}

#[derive(Deserialize)]
struct SuggestArgs {
    from_memory_id: String,
    to_memory_id: String,
}

fn suggest_relationship(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: SuggestArgs = parse_args(args)?;
        let from = state
            .repository
            .get_memory(&args.from_memory_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("Memory not found: {}", args.from_memory_id))?;
        let to = state
            .repository
            .get_memory(&args.to_memory_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("Memory not found: {}", args.to_memory_id))?;

        let suggestions = suggest_relationship_type(&from, &to);
        Ok(json!({
            "from_memory": brief(&from),
            "to_memory": brief(&to),
            "suggestions": suggestions
                .iter()
                .map(|(rel_type, confidence)| {
                    let meta = rel_type.metadata();
                    json!({
                        "type": rel_type.as_str(),
                        "confidence": confidence,
                        "category": meta.category.as_str(),
                        "description": meta.description,
                    })
                })
                .collect::<Vec<_>>(),
        }))
    })
}

#[derive(Deserialize)]
struct ReinforceArgs {
    from_memory_id: String,
    to_memory_id: String,
    #[serde(default = "default_success")]
    success: bool,
}

fn default_success() -> bool {
    true
}

fn reinforce_relationship(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: ReinforceArgs = parse_args(args)?;
        let (relationship_type, properties) = state
            .repository
            .reinforce_relationship(&args.from_memory_id, &args.to_memory_id, args.success)
            .await
            .map_err(|e| e.to_string())?;

        Ok(json!({
            "from_memory_id": args.from_memory_id,
            "to_memory_id": args.to_memory_id,
            "relationship_type": relationship_type.as_str(),
            "success": args.success,
            "updated_properties": {
                "strength": properties.strength,
                "confidence": properties.confidence,
                "evidence_count": properties.evidence_count,
                "success_rate": properties.success_rate,
                "validation_count": properties.validation_count,
                "counter_evidence_count": properties.counter_evidence_count,
            },
        }))
    })
}

#[derive(Deserialize)]
struct CategoryArgs {
    category: String,
}

fn get_relationship_types_by_category(
    state: &ServerState,
    args: Option<Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let _ = state;
        let args: CategoryArgs = parse_args(args)?;
        let category = RelationshipCategory::parse(&args.category)
            .ok_or_else(|| format!("Unknown relationship category: {}", args.category))?;

        let types = RelationshipType::types_in_category(category);
        Ok(json!({
            "category": category.as_str(),
            "count": types.len(),
            "relationship_types": types
                .iter()
                .map(|rel_type| {
                    let meta = rel_type.metadata();
                    json!({
                        "type": rel_type.as_str(),
                        "description": meta.description,
                        "default_strength": meta.default_strength,
                        "bidirectional": meta.bidirectional,
                    })
                })
                .collect::<Vec<_>>(),
        }))
    })
}

fn analyze_graph_metrics(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let _: Value = args.unwrap_or_default();
        let snapshot = state
            .repository
            .load_snapshot()
            .await
            .map_err(|e| e.to_string())?;
        let metrics = snapshot.metrics();

        Ok(json!({
            "graph_metrics": metrics,
            "relationship_system": {
                "total_relationship_types": RelationshipType::ALL.len(),
                "categories": RelationshipCategory::ALL
                    .iter()
                    .map(|category| json!({
                        "name": category.as_str(),
                        "types_count": RelationshipType::types_in_category(*category).len(),
                    }))
                    .collect::<Vec<_>>(),
            },
        }))
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use memorygraph_core::backend::sqlite::SqliteBackend;
    use memorygraph_core::config::Config;
    use memorygraph_core::model::MemoryType;
    use memorygraph_core::repository::MemoryRepository;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn test_state() -> (tempfile::TempDir, ServerState) {
        let dir = tempdir().unwrap();
        let backend = SqliteBackend::create(Some(dir.path().join("analytics.db")))
            .await
            .unwrap();
        let state = ServerState {
            repository: MemoryRepository::new(Arc::new(backend)),
            config: Config::default(),
        };
        (dir, state)
    }

    async fn store(state: &ServerState, title: &str, memory_type: MemoryType) -> String {
        state
            .repository
            .store_memory(Memory::new(memory_type, title, format!("content {title}")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_find_memory_path_end_to_end() {
        let (_dir, state) = test_state().await;
        let a = store(&state, "a", MemoryType::General).await;
        let b = store(&state, "b", MemoryType::General).await;
        let c = store(&state, "c", MemoryType::General).await;
        state
            .repository
            .create_relationship(&a, &b, RelationshipType::LeadsTo, None)
            .await
            .unwrap();
        state
            .repository
            .create_relationship(&b, &c, RelationshipType::LeadsTo, None)
            .await
            .unwrap();

        let result = find_memory_path(
            &state,
            Some(json!({ "from_memory_id": a, "to_memory_id": c })),
        )
        .await
        .unwrap();
        assert_eq!(result["found"], json!(true));
        assert_eq!(result["hops"], json!(2));

        let missing = find_memory_path(
            &state,
            Some(json!({ "from_memory_id": a, "to_memory_id": "ghost" })),
        )
        .await
        .unwrap();
        assert_eq!(missing["found"], json!(false));
    }

    #[tokio::test]
    async fn test_reinforce_tool_updates_edge() {
        let (_dir, state) = test_state().await;
        let a = store(&state, "solution", MemoryType::Solution).await;
        let b = store(&state, "problem", MemoryType::Problem).await;
        state
            .repository
            .create_relationship(&a, &b, RelationshipType::Solves, None)
            .await
            .unwrap();

        let result = reinforce_relationship(
            &state,
            Some(json!({ "from_memory_id": a, "to_memory_id": b, "success": true })),
        )
        .await
        .unwrap();
        assert_eq!(result["updated_properties"]["evidence_count"], json!(2));
        assert_eq!(result["updated_properties"]["success_rate"], json!(1.0));
    }

    #[tokio::test]
    async fn test_category_listing() {
        let (_dir, state) = test_state().await;
        let result = get_relationship_types_by_category(
            &state,
            Some(json!({ "category": "solution" })),
        )
        .await
        .unwrap();
        assert_eq!(result["count"], json!(5));

        let err = get_relationship_types_by_category(
            &state,
            Some(json!({ "category": "romance" })),
        )
        .await
        .unwrap_err();
        assert!(err.contains("Unknown relationship category"));
    }

    #[tokio::test]
    async fn test_graph_metrics_tool() {
        let (_dir, state) = test_state().await;
        let a = store(&state, "a", MemoryType::General).await;
        let b = store(&state, "b", MemoryType::General).await;
        state
            .repository
            .create_relationship(&a, &b, RelationshipType::RelatedTo, None)
            .await
            .unwrap();

        let result = analyze_graph_metrics(&state, None).await.unwrap();
        assert_eq!(result["graph_metrics"]["node_count"], json!(2));
        assert_eq!(result["graph_metrics"]["edge_count"], json!(1));
        assert_eq!(result["relationship_system"]["total_relationship_types"], json!(35));
    }
}
