//! Memory - the node type of the knowledge graph.
//!
//! A memory is a typed, content-addressed knowledge item. Backends persist it
//! as a single node whose properties are the flat projection produced by
//! [`Memory::to_flat_properties`]: scalar fields at the top level, tags as a
//! JSON array, and every context sub-field prefixed with `context_`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{MemoryGraphError, Result};
use crate::model::relationship::RelationshipType;
use crate::search::fuzzy::Tolerance;

/// Maximum title length accepted on ingress.
pub const MAX_TITLE_LEN: usize = 200;
/// Maximum summary length accepted on ingress.
pub const MAX_SUMMARY_LEN: usize = 500;

// ============================================================================
// MEMORY TYPE
// ============================================================================

/// Types of memories that can be stored in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Task,
    CodePattern,
    Problem,
    Solution,
    Project,
    Technology,
    Error,
    Fix,
    Command,
    FileContext,
    Workflow,
    #[default]
    General,
}

impl MemoryType {
    /// Every memory type, in declaration order.
    pub const ALL: [MemoryType; 12] = [
        MemoryType::Task,
        MemoryType::CodePattern,
        MemoryType::Problem,
        MemoryType::Solution,
        MemoryType::Project,
        MemoryType::Technology,
        MemoryType::Error,
        MemoryType::Fix,
        MemoryType::Command,
        MemoryType::FileContext,
        MemoryType::Workflow,
        MemoryType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Task => "task",
            MemoryType::CodePattern => "code_pattern",
            MemoryType::Problem => "problem",
            MemoryType::Solution => "solution",
            MemoryType::Project => "project",
            MemoryType::Technology => "technology",
            MemoryType::Error => "error",
            MemoryType::Fix => "fix",
            MemoryType::Command => "command",
            MemoryType::FileContext => "file_context",
            MemoryType::Workflow => "workflow",
            MemoryType::General => "general",
        }
    }

    /// Parse from the serialized string value.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// MEMORY CONTEXT
// ============================================================================

/// Context captured alongside a memory: where it came from and what it touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_involved: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frameworks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Free-form metadata; persisted as a JSON string inside the node document
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_metadata: Map<String, Value>,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.project_path.is_none()
            && self.files_involved.is_empty()
            && self.languages.is_empty()
            && self.frameworks.is_empty()
            && self.technologies.is_empty()
            && self.git_commit.is_none()
            && self.git_branch.is_none()
            && self.working_directory.is_none()
            && self.timestamp.is_none()
            && self.session_id.is_none()
            && self.user_id.is_none()
            && self.additional_metadata.is_empty()
    }
}

// ============================================================================
// MATCH INFO (search enrichment)
// ============================================================================

/// Quality label attached to a search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchQuality {
    #[default]
    Low,
    Medium,
    High,
}

/// Which fields and terms of a search hit actually matched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchInfo {
    pub matched_fields: Vec<String>,
    pub matched_terms: Vec<String>,
    pub match_quality: MatchQuality,
}

// ============================================================================
// MEMORY
// ============================================================================

fn default_importance() -> f64 {
    0.5
}

fn default_confidence() -> f64 {
    0.8
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Core memory data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Assigned on first store when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MemoryContext>,
    #[serde(default = "default_importance")]
    pub importance: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effectiveness: Option<f64>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,

    // Auditing fields reserved for multi-tenant mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    // Enriched search-result fields (populated by search operations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_info: Option<MatchInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_summary: Option<String>,
}

impl Memory {
    /// Create a memory with defaults for everything but the required fields.
    pub fn new(memory_type: MemoryType, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            memory_type,
            title: title.into(),
            content: content.into(),
            summary: None,
            tags: Vec::new(),
            context: None,
            importance: default_importance(),
            confidence: default_confidence(),
            effectiveness: None,
            usage_count: 0,
            created_at: now,
            updated_at: now,
            last_accessed: None,
            version: None,
            updated_by: None,
            relationships: None,
            match_info: None,
            context_summary: None,
        }
    }

    /// Trim text fields, normalize tags, and clamp numeric scores to [0, 1].
    pub fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        self.content = self.content.trim().to_string();
        if let Some(summary) = &self.summary {
            let trimmed = summary.trim();
            self.summary = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
        }
        self.tags = normalize_tags(&self.tags);
        self.importance = self.importance.clamp(0.0, 1.0);
        self.confidence = self.confidence.clamp(0.0, 1.0);
        if let Some(e) = self.effectiveness {
            self.effectiveness = Some(e.clamp(0.0, 1.0));
        }
    }

    /// Validate ingress invariants. Call after [`Memory::normalize`].
    pub fn validate(&self) -> Result<()> {
        if self.title.is_empty() {
            return Err(MemoryGraphError::validation("Memory title must not be empty"));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(MemoryGraphError::validation(format!(
                "Memory title exceeds {MAX_TITLE_LEN} characters"
            )));
        }
        if self.content.is_empty() {
            return Err(MemoryGraphError::validation("Memory content must not be empty"));
        }
        if let Some(summary) = &self.summary {
            if summary.chars().count() > MAX_SUMMARY_LEN {
                return Err(MemoryGraphError::validation(format!(
                    "Memory summary exceeds {MAX_SUMMARY_LEN} characters"
                )));
            }
        }
        Ok(())
    }

    /// Assign a fresh UUID when the memory has none yet. Returns the id.
    pub fn ensure_id(&mut self) -> String {
        if self.id.is_none() {
            self.id = Some(Uuid::new_v4().to_string());
        }
        self.id.clone().unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Flat property projection (the persisted node document)
    // ------------------------------------------------------------------

    /// Project the memory into the flat JSON document persisted by backends.
    ///
    /// Scalar fields sit at the top level, `tags` is a JSON array, context
    /// sub-fields get a `context_` prefix, and mapping-valued metadata is
    /// serialized as a JSON string.
    pub fn to_flat_properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        if let Some(id) = &self.id {
            props.insert("id".into(), Value::String(id.clone()));
        }
        props.insert("type".into(), Value::String(self.memory_type.as_str().to_string()));
        props.insert("title".into(), Value::String(self.title.clone()));
        props.insert("content".into(), Value::String(self.content.clone()));
        props.insert(
            "tags".into(),
            Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
        );
        props.insert("importance".into(), json_f64(self.importance));
        props.insert("confidence".into(), json_f64(self.confidence));
        props.insert("usage_count".into(), Value::from(self.usage_count));
        props.insert("created_at".into(), Value::String(self.created_at.to_rfc3339()));
        props.insert("updated_at".into(), Value::String(self.updated_at.to_rfc3339()));

        if let Some(summary) = &self.summary {
            props.insert("summary".into(), Value::String(summary.clone()));
        }
        if let Some(effectiveness) = self.effectiveness {
            props.insert("effectiveness".into(), json_f64(effectiveness));
        }
        if let Some(last_accessed) = self.last_accessed {
            props.insert("last_accessed".into(), Value::String(last_accessed.to_rfc3339()));
        }
        if let Some(version) = self.version {
            props.insert("version".into(), Value::from(version));
        }
        if let Some(updated_by) = &self.updated_by {
            props.insert("updated_by".into(), Value::String(updated_by.clone()));
        }

        if let Some(context) = &self.context {
            if let Some(p) = &context.project_path {
                props.insert("context_project_path".into(), Value::String(p.clone()));
            }
            insert_string_list(&mut props, "context_files_involved", &context.files_involved);
            insert_string_list(&mut props, "context_languages", &context.languages);
            insert_string_list(&mut props, "context_frameworks", &context.frameworks);
            insert_string_list(&mut props, "context_technologies", &context.technologies);
            if let Some(v) = &context.git_commit {
                props.insert("context_git_commit".into(), Value::String(v.clone()));
            }
            if let Some(v) = &context.git_branch {
                props.insert("context_git_branch".into(), Value::String(v.clone()));
            }
            if let Some(v) = &context.working_directory {
                props.insert("context_working_directory".into(), Value::String(v.clone()));
            }
            if let Some(ts) = context.timestamp {
                props.insert("context_timestamp".into(), Value::String(ts.to_rfc3339()));
            }
            if let Some(v) = &context.session_id {
                props.insert("context_session_id".into(), Value::String(v.clone()));
            }
            if let Some(v) = &context.user_id {
                props.insert("context_user_id".into(), Value::String(v.clone()));
            }
            if !context.additional_metadata.is_empty() {
                // Nested maps are flattened to a JSON string for backend parity
                let serialized = Value::Object(context.additional_metadata.clone()).to_string();
                props.insert("context_additional_metadata".into(), Value::String(serialized));
            }
        }

        props
    }

    /// Rebuild a memory from its flat node document. Returns `None` when the
    /// document is missing required fields or carries an unknown type.
    pub fn from_flat_properties(props: &Map<String, Value>) -> Option<Memory> {
        let memory_type = MemoryType::parse(props.get("type")?.as_str()?)?;
        let title = props.get("title")?.as_str()?.to_string();
        let content = props.get("content")?.as_str()?.to_string();
        let created_at = parse_timestamp(props.get("created_at"))?;
        let updated_at = parse_timestamp(props.get("updated_at"))?;

        let tags = props
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut context = MemoryContext {
            project_path: get_string(props, "context_project_path"),
            files_involved: get_string_list(props, "context_files_involved"),
            languages: get_string_list(props, "context_languages"),
            frameworks: get_string_list(props, "context_frameworks"),
            technologies: get_string_list(props, "context_technologies"),
            git_commit: get_string(props, "context_git_commit"),
            git_branch: get_string(props, "context_git_branch"),
            working_directory: get_string(props, "context_working_directory"),
            timestamp: parse_timestamp(props.get("context_timestamp")),
            session_id: get_string(props, "context_session_id"),
            user_id: get_string(props, "context_user_id"),
            additional_metadata: Map::new(),
        };
        if let Some(raw) = get_string(props, "context_additional_metadata") {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&raw) {
                context.additional_metadata = map;
            }
        }

        Some(Memory {
            id: get_string(props, "id"),
            memory_type,
            title,
            content,
            summary: get_string(props, "summary"),
            tags,
            context: if context.is_empty() { None } else { Some(context) },
            importance: get_f64(props, "importance").unwrap_or_else(default_importance),
            confidence: get_f64(props, "confidence").unwrap_or_else(default_confidence),
            effectiveness: get_f64(props, "effectiveness"),
            usage_count: props.get("usage_count").and_then(Value::as_u64).unwrap_or(0),
            created_at,
            updated_at,
            last_accessed: parse_timestamp(props.get("last_accessed")),
            version: props
                .get("version")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok()),
            updated_by: get_string(props, "updated_by"),
            relationships: None,
            match_info: None,
            context_summary: None,
        })
    }
}

/// Lowercase, trim, drop empties, and de-duplicate preserving first occurrence.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let normalized = tag.trim().to_lowercase();
        if !normalized.is_empty() && seen.insert(normalized.clone()) {
            out.push(normalized);
        }
    }
    out
}

fn json_f64(value: f64) -> Value {
    serde_json::Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

fn insert_string_list(props: &mut Map<String, Value>, key: &str, values: &[String]) {
    if !values.is_empty() {
        props.insert(
            key.to_string(),
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        );
    }
}

fn get_string(props: &Map<String, Value>, key: &str) -> Option<String> {
    props.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_f64(props: &Map<String, Value>, key: &str) -> Option<f64> {
    props.get(key).and_then(Value::as_f64)
}

fn get_string_list(props: &Map<String, Value>, key: &str) -> Vec<String> {
    match props.get(key) {
        Some(Value::Array(arr)) => arr.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        // Lists may round-trip through a JSON string on some backends
        Some(Value::String(raw)) => serde_json::from_str::<Vec<String>>(raw).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// SEARCH QUERY
// ============================================================================

/// How multiple search terms combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// A result matches if any term matches (OR)
    #[default]
    Any,
    /// A result must match every term (AND)
    All,
}

fn default_limit() -> usize {
    SearchQuery::DEFAULT_LIMIT
}

fn default_true() -> bool {
    true
}

/// Search query parameters for memory retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Multiple search terms; takes precedence over `query` when non-empty
    #[serde(default)]
    pub terms: Vec<String>,
    #[serde(default)]
    pub memory_types: Vec<MemoryType>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_importance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_true")]
    pub include_relationships: bool,
    #[serde(default)]
    pub search_tolerance: Tolerance,
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Keep only results with at least one incident edge of these types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_filter: Option<Vec<RelationshipType>>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: None,
            terms: Vec::new(),
            memory_types: Vec::new(),
            tags: Vec::new(),
            project_path: None,
            min_importance: None,
            min_confidence: None,
            created_after: None,
            created_before: None,
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
            include_relationships: true,
            search_tolerance: Tolerance::default(),
            match_mode: MatchMode::default(),
            relationship_filter: None,
        }
    }
}

impl SearchQuery {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 1000;

    /// A query matching every memory, for paginated full scans.
    pub fn match_all(limit: usize, offset: usize) -> Self {
        Self {
            limit,
            offset,
            include_relationships: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit > Self::MAX_LIMIT {
            return Err(MemoryGraphError::validation(format!(
                "limit {} exceeds maximum {}",
                self.limit,
                Self::MAX_LIMIT
            )));
        }
        for bound in [self.min_importance, self.min_confidence].into_iter().flatten() {
            if !(0.0..=1.0).contains(&bound) {
                return Err(MemoryGraphError::validation(
                    "importance/confidence bounds must be within [0, 1]",
                ));
            }
        }
        Ok(())
    }

    /// The text used for match analysis during enrichment.
    pub fn primary_text(&self) -> Option<&str> {
        self.terms.first().map(String::as_str).or(self.query.as_deref())
    }
}

// ============================================================================
// PAGINATION & AGGREGATES
// ============================================================================

/// One page of search results plus pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult {
    pub results: Vec<Memory>,
    pub total_count: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
}

impl PaginatedResult {
    pub fn new(results: Vec<Memory>, total_count: usize, limit: usize, offset: usize) -> Self {
        let has_more = offset + limit < total_count;
        Self {
            results,
            total_count,
            limit,
            offset,
            has_more,
            next_offset: has_more.then_some(offset + limit),
        }
    }
}

/// Store-wide aggregate statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStatistics {
    pub total_memories: u64,
    pub memories_by_type: BTreeMap<String, u64>,
    pub total_relationships: u64,
    pub avg_importance: f64,
    pub avg_confidence: f64,
}

/// Summary of recent activity for session briefing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentActivity {
    pub total_count: usize,
    pub memories_by_type: BTreeMap<String, u64>,
    pub recent_memories: Vec<Memory>,
    pub unresolved_problems: Vec<Memory>,
    pub days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

// ============================================================================
// TESTS
// ============================================================================
