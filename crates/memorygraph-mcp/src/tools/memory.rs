//! Basic tool group: memory CRUD, search, relationships, activity.

use serde::Deserialize;
use serde_json::{json, Value};

use memorygraph_core::context::ContextScope;
use memorygraph_core::model::{
    MatchMode, Memory, MemoryContext, MemoryType, RelationshipProperties, RelationshipType,
    SearchQuery,
};
use memorygraph_core::repository::RelationshipContextFilter;
use memorygraph_core::search::Tolerance;

use super::{HandlerFuture, ServerState, ToolDef, ToolGroup};
use crate::project;

pub fn tool_definitions() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "recall_memories",
            description: "Primary tool for finding past memories using natural language queries. \
                          Optimized for fuzzy matching - handles plurals, tenses, and case \
                          variations automatically. For acronyms and exact technical terms, use \
                          search_memories with tags instead.",
            group: ToolGroup::Basic,
            schema: recall_schema,
            handler: recall_memories,
        },
        ToolDef {
            name: "store_memory",
            description: "Store a new memory with context and metadata. Required: type, title, \
                          content. Always include acronyms as tags - they are the exact-match \
                          fallback for retrieval. Returns memory_id; use create_relationship to \
                          link related memories.",
            group: ToolGroup::Basic,
            schema: store_schema,
            handler: store_memory,
        },
        ToolDef {
            name: "get_memory",
            description: "Retrieve a specific memory by ID, optionally with its one-hop \
                          relationships.",
            group: ToolGroup::Basic,
            schema: get_schema,
            handler: get_memory,
        },
        ToolDef {
            name: "search_memories",
            description: "Advanced search with fine-grained filters: tags (exact match, best for \
                          acronyms), memory types, importance/confidence thresholds, project \
                          path, date range, search tolerance (strict/normal/fuzzy) and match \
                          mode (any/all) for multi-term queries.",
            group: ToolGroup::Basic,
            schema: search_schema,
            handler: search_memories,
        },
        ToolDef {
            name: "update_memory",
            description: "Update fields of an existing memory.",
            group: ToolGroup::Basic,
            schema: update_schema,
            handler: update_memory,
        },
        ToolDef {
            name: "delete_memory",
            description: "Delete a memory and all its relationships.",
            group: ToolGroup::Basic,
            schema: delete_schema,
            handler: delete_memory,
        },
        ToolDef {
            name: "create_relationship",
            description: "Link two memories with a typed relationship. Common types: SOLVES \
                          (solution->problem), CAUSES (cause->effect), ADDRESSES (fix->error), \
                          REQUIRES (dependent->dependency), RELATED_TO (general).",
            group: ToolGroup::Basic,
            schema: create_relationship_schema,
            handler: create_relationship,
        },
        ToolDef {
            name: "get_related_memories",
            description: "Find memories connected to a specific memory via relationships, \
                          optionally filtered by relationship types and traversal depth.",
            group: ToolGroup::Basic,
            schema: related_schema,
            handler: get_related_memories,
        },
        ToolDef {
            name: "get_memory_statistics",
            description: "Get statistics about the memory database.",
            group: ToolGroup::Basic,
            schema: empty_schema,
            handler: get_memory_statistics,
        },
        ToolDef {
            name: "get_recent_activity",
            description: "Summary of recent memory activity for session context: counts by \
                          type, recent memories (up to 20), unresolved problems. Detects the \
                          current project when none is given.",
            group: ToolGroup::Basic,
            schema: activity_schema,
            handler: get_recent_activity,
        },
        ToolDef {
            name: "search_relationships_by_context",
            description: "Search relationships by their structured context fields (scope, \
                          conditions, evidence, components, temporal).",
            group: ToolGroup::Basic,
            schema: context_search_schema,
            handler: search_relationships_by_context,
        },
        ToolDef {
            name: "contextual_search",
            description: "Search only within the context of a given memory: finds its related \
                          memories first, then matches the query inside that set only.",
            group: ToolGroup::Basic,
            schema: contextual_schema,
            handler: contextual_search,
        },
    ]
}

// ============================================================================
// HELPERS
// ============================================================================

/// Deserialize tool arguments, treating absent arguments as `{}`.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    args: Option<Value>,
) -> std::result::Result<T, String> {
    serde_json::from_value(args.unwrap_or_else(|| json!({})))
        .map_err(|e| format!("Invalid arguments: {e}"))
}

fn parse_memory_types(raw: &[String]) -> std::result::Result<Vec<MemoryType>, String> {
    raw.iter()
        .map(|value| {
            MemoryType::parse(value).ok_or_else(|| format!("Unknown memory type: {value}"))
        })
        .collect()
}

fn parse_relationship_types(
    raw: &[String],
) -> std::result::Result<Vec<RelationshipType>, String> {
    raw.iter()
        .map(|value| RelationshipType::parse_strict(value).map_err(|e| e.to_string()))
        .collect()
}

fn memory_to_value(memory: &Memory) -> Value {
    serde_json::to_value(memory).unwrap_or(Value::Null)
}

// ============================================================================
// SCHEMAS
// ============================================================================

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn recall_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Natural language query for what you're looking for"
            },
            "memory_types": {
                "type": "array",
                "items": { "type": "string", "enum": memory_type_names() },
                "description": "Optional: filter by memory types for more precision"
            },
            "project_path": {
                "type": "string",
                "description": "Optional: filter by project path to scope results"
            },
            "limit": {
                "type": "integer", "minimum": 1, "maximum": 1000,
                "description": "Maximum number of results per page (default: 20)"
            },
            "offset": {
                "type": "integer", "minimum": 0,
                "description": "Number of results to skip for pagination (default: 0)"
            }
        }
    })
}

fn store_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": {
                "type": "string", "enum": memory_type_names(),
                "description": "Type of memory to store"
            },
            "title": { "type": "string", "description": "Short descriptive title" },
            "content": { "type": "string", "description": "Detailed content of the memory" },
            "summary": { "type": "string", "description": "Optional brief summary" },
            "tags": {
                "type": "array", "items": { "type": "string" },
                "description": "Tags to categorize the memory"
            },
            "importance": {
                "type": "number", "minimum": 0.0, "maximum": 1.0,
                "description": "Importance score (0.0-1.0)"
            },
            "confidence": {
                "type": "number", "minimum": 0.0, "maximum": 1.0,
                "description": "Confidence score (0.0-1.0)"
            },
            "context": {
                "type": "object",
                "description": "Context information (project_path, files_involved, languages, ...)"
            }
        },
        "required": ["type", "title", "content"]
    })
}

fn get_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "memory_id": { "type": "string", "description": "ID of the memory to retrieve" },
            "include_relationships": {
                "type": "boolean",
                "description": "Whether to include related memories (default: true)"
            }
        },
        "required": ["memory_id"]
    })
}

fn search_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": "Text to search for in memory content" },
            "terms": {
                "type": "array", "items": { "type": "string" },
                "description": "Multiple search terms (alternative to query)"
            },
            "memory_types": {
                "type": "array",
                "items": { "type": "string", "enum": memory_type_names() },
                "description": "Filter by memory types"
            },
            "tags": {
                "type": "array", "items": { "type": "string" },
                "description": "Filter by tags"
            },
            "project_path": { "type": "string", "description": "Filter by project path" },
            "min_importance": {
                "type": "number", "minimum": 0.0, "maximum": 1.0,
                "description": "Minimum importance score"
            },
            "min_confidence": {
                "type": "number", "minimum": 0.0, "maximum": 1.0,
                "description": "Minimum confidence score"
            },
            "created_after": { "type": "string", "description": "ISO-8601 lower bound on created_at" },
            "created_before": { "type": "string", "description": "ISO-8601 upper bound on created_at" },
            "limit": {
                "type": "integer", "minimum": 1, "maximum": 1000,
                "description": "Maximum number of results per page (default: 20)"
            },
            "offset": {
                "type": "integer", "minimum": 0,
                "description": "Number of results to skip for pagination (default: 0)"
            },
            "search_tolerance": {
                "type": "string", "enum": ["strict", "normal", "fuzzy"],
                "description": "strict for exact substring, normal for stemming (default), fuzzy reserved for typo tolerance"
            },
            "match_mode": {
                "type": "string", "enum": ["any", "all"],
                "description": "any: results matching ANY term (OR); all: results matching ALL terms (AND)"
            },
            "relationship_filter": {
                "type": "array", "items": { "type": "string" },
                "description": "Keep only memories with at least one of these relationship types"
            }
        }
    })
}

fn update_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "memory_id": { "type": "string", "description": "ID of the memory to update" },
            "title": { "type": "string" },
            "content": { "type": "string" },
            "summary": { "type": "string" },
            "tags": { "type": "array", "items": { "type": "string" } },
            "importance": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 }
        },
        "required": ["memory_id"]
    })
}

fn delete_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "memory_id": { "type": "string", "description": "ID of the memory to delete" }
        },
        "required": ["memory_id"]
    })
}

fn create_relationship_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "from_memory_id": { "type": "string", "description": "ID of the source memory" },
            "to_memory_id": { "type": "string", "description": "ID of the target memory" },
            "relationship_type": {
                "type": "string", "enum": relationship_type_names(),
                "description": "Type of relationship to create"
            },
            "strength": {
                "type": "number", "minimum": 0.0, "maximum": 1.0,
                "description": "Strength of the relationship (defaults per type)"
            },
            "confidence": {
                "type": "number", "minimum": 0.0, "maximum": 1.0,
                "description": "Confidence in the relationship (defaults per type)"
            },
            "context": {
                "type": "string",
                "description": "Context or description of the relationship"
            }
        },
        "required": ["from_memory_id", "to_memory_id", "relationship_type"]
    })
}

fn related_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "memory_id": { "type": "string", "description": "ID of the memory to find relations for" },
            "relationship_types": {
                "type": "array", "items": { "type": "string" },
                "description": "Filter by relationship types"
            },
            "max_depth": {
                "type": "integer", "minimum": 1, "maximum": 5,
                "description": "Maximum relationship depth to traverse (default: 1)"
            }
        },
        "required": ["memory_id"]
    })
}

fn activity_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "days": {
                "type": "integer", "minimum": 1, "maximum": 365,
                "description": "Number of days to look back (default: 7)"
            },
            "project": {
                "type": "string",
                "description": "Optional: filter by project path (auto-detected when absent)"
            }
        }
    })
}

fn context_search_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "scope": {
                "type": "string", "enum": ["partial", "full", "conditional"],
                "description": "Filter by scope"
            },
            "conditions": {
                "type": "array", "items": { "type": "string" },
                "description": "Filter by conditions (matches any)"
            },
            "has_evidence": {
                "type": "boolean",
                "description": "Filter by presence/absence of evidence"
            },
            "evidence": {
                "type": "array", "items": { "type": "string" },
                "description": "Filter by specific evidence mentions (matches any)"
            },
            "components": {
                "type": "array", "items": { "type": "string" },
                "description": "Filter by components mentioned (matches any)"
            },
            "temporal": {
                "type": "string",
                "description": "Filter by temporal information (e.g. 'v2.1.0')"
            },
            "limit": {
                "type": "integer", "minimum": 1, "maximum": 100,
                "description": "Maximum number of results (default: 20)"
            }
        }
    })
}

fn contextual_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "memory_id": { "type": "string", "description": "Memory ID to use as context root" },
            "query": { "type": "string", "description": "Search query within the context" },
            "max_depth": {
                "type": "integer", "minimum": 1, "maximum": 5,
                "description": "Maximum relationship traversal depth (default: 2)"
            }
        },
        "required": ["memory_id", "query"]
    })
}

fn memory_type_names() -> Vec<&'static str> {
    MemoryType::ALL.iter().map(|t| t.as_str()).collect()
}

fn relationship_type_names() -> Vec<&'static str> {
    RelationshipType::ALL.iter().map(|t| t.as_str()).collect()
}

// ============================================================================
// HANDLERS
// ============================================================================

#[derive(Deserialize)]
struct StoreArgs {
    #[serde(rename = "type")]
    memory_type: String,
    title: String,
    content: String,
    summary: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    importance: Option<f64>,
    confidence: Option<f64>,
    context: Option<MemoryContext>,
}

fn store_memory(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: StoreArgs = parse_args(args)?;
        let memory_type = MemoryType::parse(&args.memory_type)
            .ok_or_else(|| format!("Unknown memory type: {}", args.memory_type))?;

        let mut memory = Memory::new(memory_type, args.title, args.content);
        memory.summary = args.summary;
        memory.tags = args.tags;
        if let Some(importance) = args.importance {
            memory.importance = importance;
        }
        if let Some(confidence) = args.confidence {
            memory.confidence = confidence;
        }
        memory.context = args.context;

        let memory_id = state
            .repository
            .store_memory(memory)
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({
            "memory_id": memory_id,
            "message": "Memory stored successfully",
        }))
    })
}

#[derive(Deserialize)]
struct GetArgs {
    memory_id: String,
    #[serde(default = "default_true")]
    include_relationships: bool,
}

fn default_true() -> bool {
    true
}

fn get_memory(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: GetArgs = parse_args(args)?;
        let Some(memory) = state
            .repository
            .get_memory(&args.memory_id)
            .await
            .map_err(|e| e.to_string())?
        else {
            return Err(format!("Memory not found: {}", args.memory_id));
        };

        let mut result = json!({ "memory": memory_to_value(&memory) });
        if args.include_relationships {
            let related = state
                .repository
                .get_related_memories(&args.memory_id, None, 1)
                .await
                .map_err(|e| e.to_string())?;
            result["related"] = Value::Array(
                related
                    .iter()
                    .map(|(neighbor, relationship)| {
                        json!({
                            "memory_id": neighbor.id,
                            "title": neighbor.title,
                            "type": relationship.relationship_type.as_str(),
                            "from_memory_id": relationship.from_memory_id,
                            "to_memory_id": relationship.to_memory_id,
                            "strength": relationship.properties.strength,
                        })
                    })
                    .collect(),
            );
        }
        Ok(result)
    })
}

#[derive(Deserialize)]
struct RecallArgs {
    query: Option<String>,
    #[serde(default)]
    memory_types: Vec<String>,
    project_path: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

fn recall_memories(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: RecallArgs = parse_args(args)?;
        let query = SearchQuery {
            query: args.query,
            memory_types: parse_memory_types(&args.memory_types)?,
            project_path: args.project_path,
            limit: args.limit.unwrap_or(SearchQuery::DEFAULT_LIMIT),
            offset: args.offset.unwrap_or(0),
            search_tolerance: Tolerance::Normal,
            include_relationships: true,
            ..SearchQuery::default()
        };

        let memories = state
            .repository
            .search_memories(&query)
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({
            "count": memories.len(),
            "memories": memories.iter().map(memory_to_value).collect::<Vec<_>>(),
        }))
    })
}

#[derive(Deserialize)]
struct SearchArgs {
    query: Option<String>,
    #[serde(default)]
    terms: Vec<String>,
    #[serde(default)]
    memory_types: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    project_path: Option<String>,
    min_importance: Option<f64>,
    min_confidence: Option<f64>,
    created_after: Option<chrono::DateTime<chrono::Utc>>,
    created_before: Option<chrono::DateTime<chrono::Utc>>,
    limit: Option<usize>,
    offset: Option<usize>,
    search_tolerance: Option<String>,
    match_mode: Option<String>,
    relationship_filter: Option<Vec<String>>,
}

fn search_memories(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: SearchArgs = parse_args(args)?;

        let search_tolerance = match args.search_tolerance.as_deref() {
            Some(raw) => {
                Tolerance::parse(raw).ok_or_else(|| format!("Unknown search tolerance: {raw}"))?
            }
            None => Tolerance::Normal,
        };
        let match_mode = match args.match_mode.as_deref() {
            Some("all") => MatchMode::All,
            Some("any") | None => MatchMode::Any,
            Some(other) => return Err(format!("Unknown match mode: {other}")),
        };
        let relationship_filter = match args.relationship_filter {
            Some(raw) => Some(parse_relationship_types(&raw)?),
            None => None,
        };

        let query = SearchQuery {
            query: args.query,
            terms: args.terms,
            memory_types: parse_memory_types(&args.memory_types)?,
            tags: args.tags,
            project_path: args.project_path,
            min_importance: args.min_importance,
            min_confidence: args.min_confidence,
            created_after: args.created_after,
            created_before: args.created_before,
            limit: args.limit.unwrap_or(SearchQuery::DEFAULT_LIMIT),
            offset: args.offset.unwrap_or(0),
            search_tolerance,
            match_mode,
            relationship_filter,
            ..SearchQuery::default()
        };

        let page = state
            .repository
            .search_memories_paginated(&query)
            .await
            .map_err(|e| e.to_string())?;
        Ok(serde_json::to_value(&page).map_err(|e| e.to_string())?)
    })
}

#[derive(Deserialize)]
struct UpdateArgs {
    memory_id: String,
    title: Option<String>,
    content: Option<String>,
    summary: Option<String>,
    tags: Option<Vec<String>>,
    importance: Option<f64>,
    confidence: Option<f64>,
}

fn update_memory(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: UpdateArgs = parse_args(args)?;
        let Some(mut memory) = state
            .repository
            .get_memory(&args.memory_id)
            .await
            .map_err(|e| e.to_string())?
        else {
            return Err(format!("Memory not found: {}", args.memory_id));
        };

        if let Some(title) = args.title {
            memory.title = title;
        }
        if let Some(content) = args.content {
            memory.content = content;
        }
        if let Some(summary) = args.summary {
            memory.summary = Some(summary);
        }
        if let Some(tags) = args.tags {
            memory.tags = tags;
        }
        if let Some(importance) = args.importance {
            memory.importance = importance;
        }
        if let Some(confidence) = args.confidence {
            memory.confidence = confidence;
        }

        let updated = state
            .repository
            .update_memory(memory)
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({ "memory_id": args.memory_id, "updated": updated }))
    })
}

#[derive(Deserialize)]
struct DeleteArgs {
    memory_id: String,
}

fn delete_memory(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: DeleteArgs = parse_args(args)?;
        let deleted = state
            .repository
            .delete_memory(&args.memory_id)
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({ "memory_id": args.memory_id, "deleted": deleted }))
    })
}

#[derive(Deserialize)]
struct CreateRelationshipArgs {
    from_memory_id: String,
    to_memory_id: String,
    relationship_type: String,
    strength: Option<f64>,
    confidence: Option<f64>,
    context: Option<String>,
}

fn create_relationship(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: CreateRelationshipArgs = parse_args(args)?;
        let relationship_type =
            RelationshipType::parse_strict(&args.relationship_type).map_err(|e| e.to_string())?;

        let mut properties = RelationshipProperties::for_type(relationship_type);
        if let Some(strength) = args.strength {
            properties.strength = strength;
        }
        if let Some(confidence) = args.confidence {
            properties.confidence = confidence;
        }
        properties.context = args.context;

        let relationship_id = state
            .repository
            .create_relationship(
                &args.from_memory_id,
                &args.to_memory_id,
                relationship_type,
                Some(properties),
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({
            "relationship_id": relationship_id,
            "type": relationship_type.as_str(),
            "from_memory_id": args.from_memory_id,
            "to_memory_id": args.to_memory_id,
        }))
    })
}

#[derive(Deserialize)]
struct RelatedArgs {
    memory_id: String,
    relationship_types: Option<Vec<String>>,
    max_depth: Option<u32>,
}

fn get_related_memories(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: RelatedArgs = parse_args(args)?;
        let types = match args.relationship_types {
            Some(raw) => Some(parse_relationship_types(&raw)?),
            None => None,
        };

        let related = state
            .repository
            .get_related_memories(&args.memory_id, types.as_deref(), args.max_depth.unwrap_or(1))
            .await
            .map_err(|e| e.to_string())?;

        Ok(json!({
            "memory_id": args.memory_id,
            "count": related.len(),
            "related": related
                .iter()
                .map(|(memory, relationship)| {
                    json!({
                        "memory": memory_to_value(memory),
                        "relationship": relationship,
                    })
                })
                .collect::<Vec<_>>(),
        }))
    })
}

fn get_memory_statistics(state: &ServerState, _args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let statistics = state
            .repository
            .get_memory_statistics()
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_value(&statistics).map_err(|e| e.to_string())
    })
}

#[derive(Deserialize)]
struct ActivityArgs {
    days: Option<u32>,
    project: Option<String>,
}

fn get_recent_activity(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: ActivityArgs = parse_args(args)?;
        // A failed detection is silently ignored
        let project = match args.project {
            Some(project) => Some(project),
            None => project::detect_project().await,
        };

        let activity = state
            .repository
            .get_recent_activity(args.days.unwrap_or(7), project.as_deref())
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_value(&activity).map_err(|e| e.to_string())
    })
}

#[derive(Deserialize)]
struct ContextSearchArgs {
    scope: Option<String>,
    #[serde(default)]
    conditions: Vec<String>,
    has_evidence: Option<bool>,
    #[serde(default)]
    evidence: Vec<String>,
    #[serde(default)]
    components: Vec<String>,
    temporal: Option<String>,
    limit: Option<usize>,
}

fn search_relationships_by_context(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: ContextSearchArgs = parse_args(args)?;
        let scope = match args.scope.as_deref() {
            Some(raw) => {
                Some(ContextScope::parse(raw).ok_or_else(|| format!("Unknown scope: {raw}"))?)
            }
            None => None,
        };

        let filter = RelationshipContextFilter {
            scope,
            conditions: args.conditions,
            has_evidence: args.has_evidence,
            evidence: args.evidence,
            components: args.components,
            temporal: args.temporal,
            limit: args.limit.unwrap_or(20),
        };

        let relationships = state
            .repository
            .search_relationships_by_context(&filter)
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({
            "count": relationships.len(),
            "relationships": relationships,
        }))
    })
}

#[derive(Deserialize)]
struct ContextualArgs {
    memory_id: String,
    query: String,
    max_depth: Option<u32>,
}

fn contextual_search(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: ContextualArgs = parse_args(args)?;
        let matches = state
            .repository
            .contextual_search(&args.memory_id, &args.query, args.max_depth.unwrap_or(2))
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({
            "context_memory_id": args.memory_id,
            "query": args.query,
            "count": matches.len(),
            "matches": matches.iter().map(memory_to_value).collect::<Vec<_>>(),
        }))
    })
}
