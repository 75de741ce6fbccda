//! Memory repository.
//!
//! Backend-agnostic service layer used by the tool dispatcher. Validates and
//! normalizes on the way in, enriches search results on the way out, and
//! composes multi-step operations (activity summaries, graph snapshots,
//! reinforcement) from the backend contract alone.

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::GraphBackend;
use crate::context::{parse_context, ContextScope};
use crate::error::{MemoryGraphError, Result};
use crate::graph::GraphSnapshot;
use crate::model::{
    MatchInfo, MatchQuality, Memory, MemoryStatistics, MemoryType, PaginatedResult,
    RecentActivity, Relationship, RelationshipProperties, RelationshipType, SearchQuery,
};
use std::sync::Arc;

/// Page size used for full scans (export, snapshots, activity windows).
pub const SCAN_PAGE_SIZE: usize = 1000;

/// Maximum length of a generated context summary.
const CONTEXT_SUMMARY_MAX_LEN: usize = 100;

/// Filter over the structured relationship context (§ relationship search).
/// Within a field the values are OR'd; fields combine with AND. Matching is
/// case-insensitive substring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipContextFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ContextScope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_evidence: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<String>,
    #[serde(default = "default_context_limit")]
    pub limit: usize,
}

fn default_context_limit() -> usize {
    20
}

/// High-level interface over whichever backend the factory constructed.
pub struct MemoryRepository {
    backend: Arc<dyn GraphBackend>,
}

impl MemoryRepository {
    pub fn new(backend: Arc<dyn GraphBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn GraphBackend> {
        &self.backend
    }

    pub async fn initialize_schema(&self) -> Result<()> {
        self.backend.initialize_schema().await
    }

    pub async fn health_check(&self) -> Result<crate::backend::HealthStatus> {
        self.backend.health_check().await
    }

    // ------------------------------------------------------------------
    // MEMORY CRUD
    // ------------------------------------------------------------------

    /// Normalize, validate, stamp `updated_at`, and upsert. Returns the id.
    pub async fn store_memory(&self, mut memory: Memory) -> Result<String> {
        memory.normalize();
        memory.validate()?;
        memory.ensure_id();
        memory.updated_at = Utc::now();
        self.backend.store_memory(&memory).await
    }

    pub async fn get_memory(&self, memory_id: &str) -> Result<Option<Memory>> {
        self.backend.get_memory(memory_id).await
    }

    pub async fn update_memory(&self, mut memory: Memory) -> Result<bool> {
        if memory.id.as_deref().unwrap_or("").is_empty() {
            return Err(MemoryGraphError::validation("Memory must have an ID to update"));
        }
        memory.normalize();
        memory.validate()?;
        memory.updated_at = Utc::now();
        self.backend.update_memory(&memory).await
    }

    pub async fn delete_memory(&self, memory_id: &str) -> Result<bool> {
        self.backend.delete_memory(memory_id).await
    }

    // ------------------------------------------------------------------
    // SEARCH
    // ------------------------------------------------------------------

    pub async fn search_memories(&self, query: &SearchQuery) -> Result<Vec<Memory>> {
        query.validate()?;
        let mut memories = self.backend.search_memories(query).await?;

        if query.include_relationships {
            memories = self.enrich_results(memories, query.primary_text()).await;
        }

        if let Some(filter) = query.relationship_filter.as_deref().filter(|f| !f.is_empty()) {
            memories = self.filter_by_relationships(memories, filter).await?;
        }

        Ok(memories)
    }

    pub async fn search_memories_paginated(&self, query: &SearchQuery) -> Result<PaginatedResult> {
        query.validate()?;
        let mut page = self.backend.search_memories_paginated(query).await?;
        if query.include_relationships {
            page.results = self.enrich_results(page.results, query.primary_text()).await;
        }
        Ok(page)
    }

    /// Scoped search: collect the k-hop neighbourhood of `memory_id`, then
    /// keep only full-text matches inside that set.
    pub async fn contextual_search(
        &self,
        memory_id: &str,
        text: &str,
        max_depth: u32,
    ) -> Result<Vec<Memory>> {
        let related = self
            .backend
            .get_related_memories(memory_id, None, max_depth)
            .await?;
        if related.is_empty() {
            return Ok(Vec::new());
        }
        let scope: HashSet<String> = related
            .iter()
            .filter_map(|(memory, _)| memory.id.clone())
            .collect();

        let query = SearchQuery {
            query: Some(text.to_string()),
            limit: 100,
            include_relationships: false,
            ..SearchQuery::default()
        };
        let matches = self.backend.search_memories(&query).await?;
        Ok(matches
            .into_iter()
            .filter(|m| m.id.as_deref().is_some_and(|id| scope.contains(id)))
            .collect())
    }

    /// Keep memories with at least one incident edge of the given types.
    async fn filter_by_relationships(
        &self,
        memories: Vec<Memory>,
        types: &[RelationshipType],
    ) -> Result<Vec<Memory>> {
        let mut kept = Vec::new();
        for memory in memories {
            let Some(id) = memory.id.as_deref() else { continue };
            let related = self
                .backend
                .get_related_memories(id, Some(types), 1)
                .await?;
            if !related.is_empty() {
                kept.push(memory);
            }
        }
        Ok(kept)
    }

    // ------------------------------------------------------------------
    // ENRICHMENT
    // ------------------------------------------------------------------

    /// Attach one-hop relationships, match info, and a context summary to
    /// every result. Failures degrade to the raw results.
    async fn enrich_results(&self, memories: Vec<Memory>, text: Option<&str>) -> Vec<Memory> {
        let mut enriched = Vec::with_capacity(memories.len());
        for mut memory in memories {
            if let Some(id) = memory.id.clone() {
                match self.backend.get_related_memories(&id, None, 1).await {
                    Ok(related) => {
                        let groups = group_relationships(&id, &related);
                        memory.context_summary =
                            Some(context_summary(&memory, &groups));
                        memory.relationships = Some(groups);
                    }
                    Err(e) => {
                        warn!("Failed to enrich search results: {e}");
                    }
                }
            }
            memory.match_info = Some(match_info(&memory, text));
            enriched.push(memory);
        }
        enriched
    }

    // ------------------------------------------------------------------
    // RELATIONSHIPS
    // ------------------------------------------------------------------

    /// Create an edge, seeding absent properties from the type defaults.
    pub async fn create_relationship(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        relationship_type: RelationshipType,
        properties: Option<RelationshipProperties>,
    ) -> Result<String> {
        if from_memory_id.trim().is_empty() || to_memory_id.trim().is_empty() {
            return Err(MemoryGraphError::validation(
                "Relationship endpoints must not be empty",
            ));
        }
        if from_memory_id == to_memory_id {
            return Err(MemoryGraphError::relationship(
                "Cannot create relationship from memory to itself",
            ));
        }
        let mut properties =
            properties.unwrap_or_else(|| RelationshipProperties::for_type(relationship_type));
        properties.clamp_scores();
        self.backend
            .create_relationship(from_memory_id, to_memory_id, relationship_type, &properties)
            .await
    }

    pub async fn get_related_memories(
        &self,
        memory_id: &str,
        relationship_types: Option<&[RelationshipType]>,
        max_depth: u32,
    ) -> Result<Vec<(Memory, Relationship)>> {
        self.backend
            .get_related_memories(memory_id, relationship_types, max_depth)
            .await
    }

    pub async fn update_relationship_properties(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        relationship_type: RelationshipType,
        properties: &RelationshipProperties,
    ) -> Result<bool> {
        self.backend
            .update_relationship_properties(from_memory_id, to_memory_id, relationship_type, properties)
            .await
    }

    /// Reinforce the edge between two memories after an observed use.
    /// Returns the relationship type and its updated properties.
    pub async fn reinforce_relationship(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        success: bool,
    ) -> Result<(RelationshipType, RelationshipProperties)> {
        let related = self
            .backend
            .get_related_memories(from_memory_id, None, 1)
            .await?;
        let edge = related
            .iter()
            .map(|(_, rel)| rel)
            .find(|rel| rel.other_endpoint(from_memory_id) == Some(to_memory_id))
            .ok_or_else(|| {
                MemoryGraphError::relationship(format!(
                    "No relationship found between {from_memory_id} and {to_memory_id}"
                ))
            })?;

        let reinforced = edge.properties.reinforced(success);
        // Address the edge by its stored direction
        let updated = self
            .backend
            .update_relationship_properties(
                &edge.from_memory_id,
                &edge.to_memory_id,
                edge.relationship_type,
                &reinforced,
            )
            .await?;
        if !updated {
            return Err(MemoryGraphError::relationship(format!(
                "Relationship vanished during reinforcement: {from_memory_id} -> {to_memory_id}"
            )));
        }
        Ok((edge.relationship_type, reinforced))
    }

    // ------------------------------------------------------------------
    // AGGREGATES
    // ------------------------------------------------------------------

    pub async fn get_memory_statistics(&self) -> Result<MemoryStatistics> {
        self.backend.get_memory_statistics().await
    }

    /// Activity summary for session briefing.
    pub async fn get_recent_activity(
        &self,
        days: u32,
        project: Option<&str>,
    ) -> Result<RecentActivity> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let filter = SearchQuery {
            created_after: Some(cutoff),
            project_path: project.map(str::to_string),
            ..SearchQuery::match_all(SCAN_PAGE_SIZE, 0)
        };
        let window = self.collect_memories(filter).await?;

        let mut memories_by_type: BTreeMap<String, u64> = BTreeMap::new();
        for memory in &window {
            *memories_by_type
                .entry(memory.memory_type.as_str().to_string())
                .or_default() += 1;
        }

        let mut recent = window.clone();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(20);

        // Problems and errors with no incoming resolving edge
        let resolving = [RelationshipType::Solves, RelationshipType::Addresses];
        let mut unresolved: Vec<Memory> = Vec::new();
        for memory in &window {
            if !matches!(memory.memory_type, MemoryType::Problem | MemoryType::Error) {
                continue;
            }
            let Some(id) = memory.id.as_deref() else { continue };
            let related = self
                .backend
                .get_related_memories(id, Some(&resolving), 1)
                .await?;
            let solved = related
                .iter()
                .any(|(_, rel)| rel.to_memory_id == id);
            if !solved {
                unresolved.push(memory.clone());
            }
        }
        unresolved.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        unresolved.truncate(10);

        Ok(RecentActivity {
            total_count: window.len(),
            memories_by_type,
            recent_memories: recent,
            unresolved_problems: unresolved,
            days,
            project: project.map(str::to_string),
        })
    }

    // ------------------------------------------------------------------
    // RELATIONSHIP CONTEXT SEARCH
    // ------------------------------------------------------------------

    /// Filter relationships by their parsed context structure, ordered by
    /// strength descending.
    pub async fn search_relationships_by_context(
        &self,
        filter: &RelationshipContextFilter,
    ) -> Result<Vec<Relationship>> {
        let snapshot = self.load_snapshot().await?;

        let contains_any = |haystacks: &[String], needles: &[String]| {
            needles.iter().any(|needle| {
                let needle = needle.to_lowercase();
                haystacks
                    .iter()
                    .any(|candidate| candidate.to_lowercase().contains(&needle))
            })
        };

        let mut matches: Vec<Relationship> = snapshot
            .relationships
            .into_iter()
            .filter(|rel| {
                let parsed = parse_context(rel.properties.context.as_deref());

                if let Some(scope) = filter.scope {
                    if parsed.scope != Some(scope) {
                        return false;
                    }
                }
                if !filter.conditions.is_empty()
                    && !contains_any(&parsed.conditions, &filter.conditions)
                {
                    return false;
                }
                if let Some(has_evidence) = filter.has_evidence {
                    if parsed.has_evidence() != has_evidence {
                        return false;
                    }
                }
                if !filter.evidence.is_empty() && !contains_any(&parsed.evidence, &filter.evidence)
                {
                    return false;
                }
                if !filter.components.is_empty()
                    && !contains_any(&parsed.components, &filter.components)
                {
                    return false;
                }
                if let Some(temporal) = &filter.temporal {
                    let Some(parsed_temporal) = &parsed.temporal else {
                        return false;
                    };
                    if !parsed_temporal
                        .to_lowercase()
                        .contains(&temporal.to_lowercase())
                    {
                        return false;
                    }
                }
                true
            })
            .collect();

        matches.sort_by(|a, b| b.properties.strength.total_cmp(&a.properties.strength));
        matches.truncate(filter.limit);
        debug!("Found {} relationships matching context filters", matches.len());
        Ok(matches)
    }

    // ------------------------------------------------------------------
    // SNAPSHOTS & SCANS
    // ------------------------------------------------------------------

    /// Every memory matching `filter`, collected page by page.
    pub async fn collect_memories(&self, mut filter: SearchQuery) -> Result<Vec<Memory>> {
        filter.limit = SCAN_PAGE_SIZE;
        filter.offset = 0;
        filter.include_relationships = false;

        let mut all = Vec::new();
        loop {
            let page = self.backend.search_memories_paginated(&filter).await?;
            let fetched = page.results.len();
            all.extend(page.results);
            match page.next_offset {
                Some(next) if fetched > 0 => filter.offset = next,
                _ => break,
            }
        }
        Ok(all)
    }

    /// Full in-memory copy of the graph for the traversal kernel, built from
    /// paginated memory fetches plus one-hop relationship queries,
    /// deduplicated by `(from, to, type)`.
    pub async fn load_snapshot(&self) -> Result<GraphSnapshot> {
        let memories = self.collect_memories(SearchQuery::match_all(SCAN_PAGE_SIZE, 0)).await?;

        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        let mut relationships: Vec<Relationship> = Vec::new();
        for memory in &memories {
            let Some(id) = memory.id.as_deref() else { continue };
            let related = match self.backend.get_related_memories(id, None, 1).await {
                Ok(related) => related,
                Err(e) => {
                    warn!("Failed to load relationships for memory {id}: {e}");
                    continue;
                }
            };
            for (_, relationship) in related {
                let key = (
                    relationship.from_memory_id.clone(),
                    relationship.to_memory_id.clone(),
                    relationship.relationship_type.as_str().to_string(),
                );
                if seen.insert(key) {
                    relationships.push(relationship);
                }
            }
        }

        Ok(GraphSnapshot::new(memories, relationships))
    }

    /// Deduplicated relationship count, derived the same way exports are.
    pub async fn count_relationships(&self) -> Result<usize> {
        Ok(self.load_snapshot().await?.relationships.len())
    }
}

// ============================================================================
// ENRICHMENT HELPERS
// ============================================================================

/// Group one-hop neighbours by relationship type (lowercased wire value).
/// An incoming SOLVES edge groups under `solved_by` so that summaries can
/// tell "solves X" apart from "solved by Y".
fn group_relationships(
    memory_id: &str,
    related: &[(Memory, Relationship)],
) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (neighbor, relationship) in related {
        let key = if relationship.relationship_type == RelationshipType::Solves
            && relationship.to_memory_id == memory_id
        {
            "solved_by".to_string()
        } else {
            relationship.relationship_type.as_str().to_lowercase()
        };
        groups.entry(key).or_default().push(neighbor.title.clone());
    }
    groups
}

/// Which fields and terms of the query matched this memory.
fn match_info(memory: &Memory, text: Option<&str>) -> MatchInfo {
    let mut info = MatchInfo::default();
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return info;
    };

    let query_lower = text.to_lowercase();
    let terms: Vec<&str> = query_lower.split_whitespace().collect();

    let title = memory.title.to_lowercase();
    let content = memory.content.to_lowercase();
    let summary = memory.summary.as_deref().unwrap_or("").to_lowercase();

    if title.contains(&query_lower) {
        info.matched_fields.push("title".to_string());
        info.match_quality = MatchQuality::High;
    }
    if content.contains(&query_lower) {
        info.matched_fields.push("content".to_string());
        if info.match_quality == MatchQuality::Low {
            info.match_quality = MatchQuality::Medium;
        }
    }
    if !summary.is_empty() && summary.contains(&query_lower) {
        info.matched_fields.push("summary".to_string());
        if info.match_quality == MatchQuality::Low {
            info.match_quality = MatchQuality::Medium;
        }
    }
    if memory
        .tags
        .iter()
        .any(|tag| terms.iter().any(|term| tag.contains(term)))
    {
        info.matched_fields.push("tags".to_string());
    }

    for term in terms {
        if title.contains(term) || content.contains(term) || summary.contains(term) {
            info.matched_terms.push(term.to_string());
        }
    }
    info
}

/// One-line natural language summary, at most 100 characters.
fn context_summary(memory: &Memory, groups: &BTreeMap<String, Vec<String>>) -> String {
    let mut parts: Vec<String> = Vec::new();

    let type_label = memory.memory_type.as_str().replace('_', " ");
    let mut chars = type_label.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => type_label,
    };
    parts.push(capitalized);

    if let Some(problems) = groups.get("solves").filter(|titles| !titles.is_empty()) {
        let shown: Vec<&str> = problems.iter().take(2).map(String::as_str).collect();
        parts.push(format!("solves {}", shown.join(", ")));
    } else if let Some(solutions) = groups.get("solved_by").filter(|titles| !titles.is_empty()) {
        parts.push(format!("solved by {}", solutions[0]));
    }

    if let Some(projects) = groups.get("used_in").filter(|titles| !titles.is_empty()) {
        parts.push(format!("in {}", projects[0]));
    }

    let summary = match parts.len() {
        1 => parts.remove(0),
        2 => format!("{} {}", parts[0], parts[1]),
        _ => format!("{} {}, {}", parts[0], parts[1], parts[2]),
    };
    summary.chars().take(CONTEXT_SUMMARY_MAX_LEN).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sqlite::SqliteBackend;
    use tempfile::tempdir;

    async fn test_repository() -> (tempfile::TempDir, MemoryRepository) {
        let dir = tempdir().unwrap();
        let backend = SqliteBackend::create(Some(dir.path().join("repo.db")))
            .await
            .unwrap();
        (dir, MemoryRepository::new(Arc::new(backend)))
    }

    fn memory(title: &str, memory_type: MemoryType) -> Memory {
        Memory::new(memory_type, title, format!("content about {title}"))
    }

    #[tokio::test]
    async fn test_store_normalizes_and_validates() {
        let (_dir, repo) = test_repository().await;

        let mut m = memory("  Fixed Redis timeout  ", MemoryType::Solution);
        m.tags = vec!["Redis".to_string(), "TIMEOUT".to_string(), "redis".to_string()];
        m.importance = 2.0;
        let id = repo.store_memory(m).await.unwrap();

        let stored = repo.get_memory(&id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Fixed Redis timeout");
        assert_eq!(stored.tags, vec!["redis", "timeout"]);
        assert_eq!(stored.importance, 1.0);
        assert!(stored.updated_at >= stored.created_at);

        let invalid = memory("", MemoryType::General);
        assert!(matches!(
            repo.store_memory(invalid).await,
            Err(MemoryGraphError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_recall_enrichment_marks_title_matches_high() {
        let (_dir, repo) = test_repository().await;
        let mut m = memory("Fixed Redis timeout", MemoryType::Solution);
        m.content = "Raised timeout to 30s".to_string();
        m.tags = vec!["redis".to_string(), "timeout".to_string()];
        m.importance = 0.8;
        repo.store_memory(m).await.unwrap();

        let query = SearchQuery {
            query: Some("timeout".to_string()),
            ..SearchQuery::default()
        };
        let results = repo.search_memories(&query).await.unwrap();
        assert_eq!(results.len(), 1);

        let info = results[0].match_info.as_ref().unwrap();
        assert!(info.matched_fields.contains(&"title".to_string()));
        assert_eq!(info.match_quality, MatchQuality::High);
        assert!(info.matched_terms.contains(&"timeout".to_string()));
        assert!(results[0].context_summary.as_ref().unwrap().starts_with("Solution"));
    }

    #[tokio::test]
    async fn test_solves_relationship_and_context_summary() {
        let (_dir, repo) = test_repository().await;
        let problem = repo
            .store_memory(memory("Redis timeout in prod", MemoryType::Problem))
            .await
            .unwrap();
        let solution = repo
            .store_memory(memory("Raise Redis timeout", MemoryType::Solution))
            .await
            .unwrap();
        repo.create_relationship(&solution, &problem, RelationshipType::Solves, None)
            .await
            .unwrap();

        let related = repo
            .get_related_memories(&problem, Some(&[RelationshipType::Solves]), 1)
            .await
            .unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].0.id.as_deref(), Some(solution.as_str()));
        assert_eq!(related[0].1.relationship_type, RelationshipType::Solves);
        assert_eq!(related[0].1.from_memory_id, solution);

        // SOLVES defaults applied
        assert!((related[0].1.properties.strength - 0.9).abs() < 1e-9);

        // The problem's enriched summary says it is solved
        let query = SearchQuery {
            query: Some("prod".to_string()),
            ..SearchQuery::default()
        };
        let results = repo.search_memories(&query).await.unwrap();
        let summary = results[0].context_summary.as_ref().unwrap();
        assert!(summary.contains("solved by Raise Redis timeout"), "got: {summary}");
    }

    #[tokio::test]
    async fn test_relationship_filter_post_processing() {
        let (_dir, repo) = test_repository().await;
        let problem = repo
            .store_memory(memory("problem", MemoryType::Problem))
            .await
            .unwrap();
        let solution = repo
            .store_memory(memory("solution", MemoryType::Solution))
            .await
            .unwrap();
        repo.store_memory(memory("loose end", MemoryType::General))
            .await
            .unwrap();
        repo.create_relationship(&solution, &problem, RelationshipType::Solves, None)
            .await
            .unwrap();

        let query = SearchQuery {
            relationship_filter: Some(vec![RelationshipType::Solves]),
            include_relationships: false,
            ..SearchQuery::default()
        };
        let results = repo.search_memories(&query).await.unwrap();
        let ids: Vec<_> = results.iter().filter_map(|m| m.id.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&problem));
        assert!(ids.contains(&solution));
    }

    #[tokio::test]
    async fn test_reinforce_relationship() {
        let (_dir, repo) = test_repository().await;
        let a = repo.store_memory(memory("a", MemoryType::Solution)).await.unwrap();
        let b = repo.store_memory(memory("b", MemoryType::Problem)).await.unwrap();
        repo.create_relationship(&a, &b, RelationshipType::Solves, None)
            .await
            .unwrap();

        let (rel_type, props) = repo.reinforce_relationship(&a, &b, true).await.unwrap();
        assert_eq!(rel_type, RelationshipType::Solves);
        assert_eq!(props.evidence_count, 2);
        assert_eq!(props.success_rate, Some(1.0));

        // Reinforcing from the other endpoint still updates the same edge
        let (_, props) = repo.reinforce_relationship(&b, &a, false).await.unwrap();
        assert_eq!(props.evidence_count, 3);
        assert_eq!(props.counter_evidence_count, 1);

        // Unknown pair
        assert!(repo.reinforce_relationship(&a, "ghost", true).await.is_err());
    }

    #[tokio::test]
    async fn test_recent_activity_unresolved_problems() {
        let (_dir, repo) = test_repository().await;
        let solved = repo
            .store_memory(memory("Redis timeout in prod", MemoryType::Problem))
            .await
            .unwrap();
        let open_problem = repo
            .store_memory(memory("Flaky deploy pipeline", MemoryType::Error))
            .await
            .unwrap();
        let solution = repo
            .store_memory(memory("Raise Redis timeout", MemoryType::Solution))
            .await
            .unwrap();
        repo.create_relationship(&solution, &solved, RelationshipType::Solves, None)
            .await
            .unwrap();

        let activity = repo.get_recent_activity(7, None).await.unwrap();
        assert_eq!(activity.total_count, 3);
        assert_eq!(activity.memories_by_type["problem"], 1);
        assert_eq!(activity.memories_by_type["solution"], 1);
        assert!(activity.recent_memories.len() <= 20);

        let unresolved: Vec<_> = activity
            .unresolved_problems
            .iter()
            .filter_map(|m| m.id.clone())
            .collect();
        assert!(unresolved.contains(&open_problem));
        assert!(!unresolved.contains(&solved));
    }

    #[tokio::test]
    async fn test_search_relationships_by_context() {
        let (_dir, repo) = test_repository().await;
        let a = repo.store_memory(memory("a", MemoryType::Solution)).await.unwrap();
        let b = repo.store_memory(memory("b", MemoryType::Problem)).await.unwrap();
        let c = repo.store_memory(memory("c", MemoryType::Problem)).await.unwrap();

        let mut partial = RelationshipProperties::for_type(RelationshipType::Addresses);
        partial.context = Some("scope: partial; conditions: production".to_string());
        repo.backend()
            .create_relationship(&a, &b, RelationshipType::Addresses, &partial)
            .await
            .unwrap();

        let mut verified = RelationshipProperties::for_type(RelationshipType::Solves);
        verified.context = Some("Verified by integration tests".to_string());
        repo.backend()
            .create_relationship(&a, &c, RelationshipType::Solves, &verified)
            .await
            .unwrap();

        let by_scope = repo
            .search_relationships_by_context(&RelationshipContextFilter {
                scope: Some(ContextScope::Partial),
                ..RelationshipContextFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_scope.len(), 1);
        assert_eq!(by_scope[0].relationship_type, RelationshipType::Addresses);

        let with_evidence = repo
            .search_relationships_by_context(&RelationshipContextFilter {
                has_evidence: Some(true),
                ..RelationshipContextFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(with_evidence.len(), 1);
        assert_eq!(with_evidence[0].relationship_type, RelationshipType::Solves);

        let by_condition = repo
            .search_relationships_by_context(&RelationshipContextFilter {
                conditions: vec!["PRODUCTION".to_string()],
                ..RelationshipContextFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_condition.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_deduplicates_edges() {
        let (_dir, repo) = test_repository().await;
        let a = repo.store_memory(memory("a", MemoryType::Technology)).await.unwrap();
        let b = repo.store_memory(memory("b", MemoryType::Technology)).await.unwrap();
        let c = repo.store_memory(memory("c", MemoryType::Technology)).await.unwrap();
        repo.create_relationship(&a, &b, RelationshipType::WorksWith, None)
            .await
            .unwrap();
        repo.create_relationship(&b, &c, RelationshipType::RelatedTo, None)
            .await
            .unwrap();

        let snapshot = repo.load_snapshot().await.unwrap();
        assert_eq!(snapshot.memories.len(), 3);
        // Each edge is visible from both endpoints but stored once
        assert_eq!(snapshot.relationships.len(), 2);
        assert_eq!(repo.count_relationships().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_contextual_search_scopes_results() {
        let (_dir, repo) = test_repository().await;
        let root = repo.store_memory(memory("auth subsystem", MemoryType::Project)).await.unwrap();
        let inside = repo
            .store_memory(memory("timeout handling in auth", MemoryType::Solution))
            .await
            .unwrap();
        repo.store_memory(memory("timeout handling in billing", MemoryType::Solution))
            .await
            .unwrap();
        repo.create_relationship(&inside, &root, RelationshipType::UsedIn, None)
            .await
            .unwrap();

        let matches = repo.contextual_search(&root, "timeout", 2).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id.as_deref(), Some(inside.as_str()));
    }
}
