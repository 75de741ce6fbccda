//! JSON export/import against any backend through the repository interface.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use super::{ExportDocument, ExportedMemory, ExportedRelationship};
use crate::error::{MemoryGraphError, Result};
use crate::model::SearchQuery;
use crate::repository::{MemoryRepository, SCAN_PAGE_SIZE};

/// `(current, total)` progress reporting hook.
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Statistics returned by a completed export.
#[derive(Debug, Clone)]
pub struct ExportStats {
    pub memory_count: usize,
    pub relationship_count: usize,
    pub backend_type: String,
}

/// Statistics returned by a completed import.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImportStats {
    pub imported_memories: usize,
    pub imported_relationships: usize,
    pub skipped_memories: usize,
    pub skipped_relationships: usize,
}

/// Export every memory and relationship to a JSON file.
///
/// Memories stream in pages of 1000; relationships are collected by walking
/// each memory's one-hop neighbourhood, deduplicated by `(from, to, type)`.
/// The document is written to a temporary sibling file and atomically moved
/// into place.
pub async fn export_to_json(
    repository: &MemoryRepository,
    output_path: &Path,
    progress: Option<&ProgressFn>,
) -> Result<ExportStats> {
    info!("Starting backend-agnostic export...");

    let memories = repository
        .collect_memories(SearchQuery::match_all(SCAN_PAGE_SIZE, 0))
        .await?;
    info!("Exported {} memories", memories.len());

    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut relationships: Vec<ExportedRelationship> = Vec::new();
    let total = memories.len();
    for (index, memory) in memories.iter().enumerate() {
        let Some(id) = memory.id.as_deref() else { continue };
        let related = match repository.get_related_memories(id, None, 1).await {
            Ok(related) => related,
            Err(e) => {
                warn!("Failed to export relationships for memory {id}: {e}");
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
                relationships.push(ExportedRelationship::from(&relationship));
            }
        }
        if let Some(progress) = progress {
            progress(index + 1, total);
        }
    }
    info!("Exported {} relationships", relationships.len());

    let backend_type = repository.backend().backend_name().to_string();
    let document = ExportDocument::new(
        &backend_type,
        memories.iter().map(ExportedMemory::from).collect(),
        relationships,
    );

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Write-once to a temp file, atomically moved into place
    let tmp_path = output_path.with_extension("json.tmp");
    std::fs::write(&tmp_path, serde_json::to_string_pretty(&document)?)?;
    std::fs::rename(&tmp_path, output_path)?;

    info!(
        "Export complete: {} memories and {} relationships to {}",
        document.memory_count,
        document.relationship_count,
        output_path.display()
    );
    Ok(ExportStats {
        memory_count: document.memory_count,
        relationship_count: document.relationship_count,
        backend_type,
    })
}

/// Validate the envelope of a parsed export document.
///
/// Missing version information and duplicate memory ids are errors;
/// relationships whose endpoints are absent from the document only warn.
pub(crate) fn validate_document(document: &ExportDocument) -> Result<()> {
    if document.version().is_none() {
        return Err(MemoryGraphError::validation(
            "Invalid export format: missing version information",
        ));
    }

    let mut ids: HashSet<&str> = HashSet::new();
    let mut duplicates: Vec<&str> = Vec::new();
    for memory in &document.memories {
        if memory.id.trim().is_empty() {
            return Err(MemoryGraphError::validation(
                "Invalid memory data: empty id",
            ));
        }
        if !ids.insert(memory.id.as_str()) {
            duplicates.push(memory.id.as_str());
        }
    }
    if !duplicates.is_empty() {
        return Err(MemoryGraphError::validation(format!(
            "Invalid export: duplicate memory IDs found: {}",
            duplicates.join(", ")
        )));
    }

    for relationship in &document.relationships {
        if !ids.contains(relationship.from_memory_id.as_str())
            || !ids.contains(relationship.to_memory_id.as_str())
        {
            warn!(
                "Relationship references missing memory: {} -> {}",
                relationship.from_memory_id, relationship.to_memory_id
            );
        }
    }
    Ok(())
}

/// Import memories and relationships from a JSON export file.
///
/// Memories go first; with `skip_duplicates` existing ids are left alone.
/// Relationships are only created once both endpoints exist in the target;
/// a missing endpoint skips that single relationship with a log line.
pub async fn import_from_json(
    repository: &MemoryRepository,
    input_path: &Path,
    skip_duplicates: bool,
    progress: Option<&ProgressFn>,
) -> Result<ImportStats> {
    let raw = std::fs::read_to_string(input_path)?;
    let document: ExportDocument = serde_json::from_str(&raw).map_err(|e| {
        MemoryGraphError::validation(format!("Invalid export format: {e}"))
    })?;
    validate_document(&document)?;
    info!(
        "Importing from export format {}",
        document.version().unwrap_or("unknown")
    );

    let mut stats = ImportStats::default();
    let total = document.memories.len();

    for (index, exported) in document.memories.into_iter().enumerate() {
        let memory_id = exported.id.clone();
        if skip_duplicates {
            if repository.get_memory(&memory_id).await?.is_some() {
                stats.skipped_memories += 1;
                if let Some(progress) = progress {
                    progress(index + 1, total);
                }
                continue;
            }
        }
        match repository.store_memory(exported.into_memory()).await {
            Ok(_) => stats.imported_memories += 1,
            Err(e) => {
                warn!("Failed to import memory {memory_id}: {e}");
                stats.skipped_memories += 1;
            }
        }
        if let Some(progress) = progress {
            progress(index + 1, total);
        }
    }

    for relationship in document.relationships {
        let from_exists = repository
            .get_memory(&relationship.from_memory_id)
            .await?
            .is_some();
        let to_exists = repository
            .get_memory(&relationship.to_memory_id)
            .await?
            .is_some();
        if !from_exists || !to_exists {
            warn!(
                "Skipping relationship: one or both memories not found ({} -> {})",
                relationship.from_memory_id, relationship.to_memory_id
            );
            stats.skipped_relationships += 1;
            continue;
        }

        match repository
            .create_relationship(
                &relationship.from_memory_id,
                &relationship.to_memory_id,
                relationship.relationship_type,
                Some(relationship.properties.into_properties()),
            )
            .await
        {
            Ok(_) => stats.imported_relationships += 1,
            Err(e) => {
                warn!("Failed to import relationship: {e}");
                stats.skipped_relationships += 1;
            }
        }
    }

    info!(
        "Import complete: {} memories, {} relationships ({} memories skipped, {} relationships skipped)",
        stats.imported_memories,
        stats.imported_relationships,
        stats.skipped_memories,
        stats.skipped_relationships
    );
    Ok(stats)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sqlite::SqliteBackend;
    use crate::model::{Memory, MemoryType, RelationshipType};
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn repository(dir: &tempfile::TempDir, name: &str) -> MemoryRepository {
        let backend = SqliteBackend::create(Some(dir.path().join(name))).await.unwrap();
        MemoryRepository::new(Arc::new(backend))
    }

    async fn seed(repo: &MemoryRepository, memories: usize) -> Vec<String> {
        let mut ids = Vec::new();
        for i in 0..memories {
            let memory = Memory::new(
                MemoryType::General,
                format!("memory {i}"),
                format!("content {i}"),
            );
            ids.push(repo.store_memory(memory).await.unwrap());
        }
        ids
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let dir = tempdir().unwrap();
        let source = repository(&dir, "source.db").await;
        let ids = seed(&source, 10).await;
        for pair in ids.windows(2) {
            source
                .create_relationship(&pair[0], &pair[1], RelationshipType::LeadsTo, None)
                .await
                .unwrap();
        }

        let export_path = dir.path().join("export.json");
        let stats = export_to_json(&source, &export_path, None).await.unwrap();
        assert_eq!(stats.memory_count, 10);
        assert_eq!(stats.relationship_count, 9);
        assert_eq!(stats.backend_type, "sqlite");

        let target = repository(&dir, "target.db").await;
        let imported = import_from_json(&target, &export_path, false, None).await.unwrap();
        assert_eq!(imported.imported_memories, 10);
        assert_eq!(imported.imported_relationships, 9);
        assert_eq!(imported.skipped_memories, 0);

        // Re-export and compare counts and content pairs
        let second_path = dir.path().join("export2.json");
        let second = export_to_json(&target, &second_path, None).await.unwrap();
        assert_eq!(second.memory_count, stats.memory_count);
        assert_eq!(second.relationship_count, stats.relationship_count);

        let first_doc: ExportDocument =
            serde_json::from_str(&std::fs::read_to_string(&export_path).unwrap()).unwrap();
        let second_doc: ExportDocument =
            serde_json::from_str(&std::fs::read_to_string(&second_path).unwrap()).unwrap();
        let pairs = |doc: &ExportDocument| -> HashSet<(String, String)> {
            doc.memories
                .iter()
                .map(|m| (m.id.clone(), m.content.clone()))
                .collect()
        };
        assert_eq!(pairs(&first_doc), pairs(&second_doc));
    }

    #[tokio::test]
    async fn test_import_skips_duplicates() {
        let dir = tempdir().unwrap();
        let source = repository(&dir, "source.db").await;
        seed(&source, 3).await;

        let export_path = dir.path().join("export.json");
        export_to_json(&source, &export_path, None).await.unwrap();

        // Import into the same store with skip_duplicates
        let stats = import_from_json(&source, &export_path, true, None).await.unwrap();
        assert_eq!(stats.imported_memories, 0);
        assert_eq!(stats.skipped_memories, 3);
    }

    #[tokio::test]
    async fn test_import_rejects_missing_version() {
        let dir = tempdir().unwrap();
        let target = repository(&dir, "target.db").await;

        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            serde_json::json!({ "memories": [], "relationships": [] }).to_string(),
        )
        .unwrap();

        assert!(matches!(
            import_from_json(&target, &path, false, None).await,
            Err(MemoryGraphError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_import_rejects_duplicate_ids() {
        let dir = tempdir().unwrap();
        let target = repository(&dir, "target.db").await;

        let memory = serde_json::json!({
            "id": "dup", "type": "general", "title": "t", "content": "c",
        });
        let path = dir.path().join("dup.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "format_version": "2.0",
                "memories": [memory.clone(), memory],
                "relationships": [],
            })
            .to_string(),
        )
        .unwrap();

        assert!(matches!(
            import_from_json(&target, &path, false, None).await,
            Err(MemoryGraphError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_import_skips_dangling_relationships() {
        let dir = tempdir().unwrap();
        let target = repository(&dir, "target.db").await;

        let path = dir.path().join("dangling.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "format_version": "2.0",
                "memories": [
                    { "id": "a", "type": "general", "title": "a", "content": "a" },
                ],
                "relationships": [
                    {
                        "from_memory_id": "a",
                        "to_memory_id": "ghost",
                        "type": "RELATED_TO",
                        "properties": { "strength": 0.5, "confidence": 0.8, "evidence_count": 1 },
                    },
                ],
            })
            .to_string(),
        )
        .unwrap();

        let stats = import_from_json(&target, &path, false, None).await.unwrap();
        assert_eq!(stats.imported_memories, 1);
        assert_eq!(stats.imported_relationships, 0);
        assert_eq!(stats.skipped_relationships, 1);
    }
}
