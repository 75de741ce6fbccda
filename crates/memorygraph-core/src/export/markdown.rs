//! Markdown export: one file per memory with YAML-style front matter and
//! sections for summary, content, and outgoing relationships.

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::model::{Memory, SearchQuery};
use crate::repository::{MemoryRepository, SCAN_PAGE_SIZE};

/// Export all memories as Markdown files into `output_dir`.
pub async fn export_to_markdown(repository: &MemoryRepository, output_dir: &Path) -> Result<()> {
    info!("Starting backend-agnostic markdown export...");

    let memories = repository
        .collect_memories(SearchQuery::match_all(SCAN_PAGE_SIZE, 0))
        .await?;
    info!("Exporting {} memories to markdown...", memories.len());

    std::fs::create_dir_all(output_dir)?;

    for memory in &memories {
        let Some(id) = memory.id.as_deref() else { continue };
        let related = repository.get_related_memories(id, None, 1).await?;

        let mut lines: Vec<String> = vec![
            "---".to_string(),
            format!("title: {}", memory.title),
            format!("id: {id}"),
            format!("type: {}", memory.memory_type),
            format!("importance: {}", memory.importance),
            format!("confidence: {}", memory.confidence),
            format!("tags: [{}]", memory.tags.join(", ")),
            format!("created_at: {}", memory.created_at.to_rfc3339()),
            format!("updated_at: {}", memory.updated_at.to_rfc3339()),
        ];

        if let Some(context) = &memory.context {
            if let Some(project) = &context.project_path {
                lines.push(format!("project: {project}"));
            }
            if !context.languages.is_empty() {
                lines.push(format!("languages: [{}]", context.languages.join(", ")));
            }
            if !context.technologies.is_empty() {
                lines.push(format!("technologies: [{}]", context.technologies.join(", ")));
            }
        }

        lines.push("---".to_string());
        lines.push(String::new());

        if let Some(summary) = &memory.summary {
            lines.push("## Summary".to_string());
            lines.push(String::new());
            lines.push(summary.clone());
            lines.push(String::new());
        }

        lines.push("## Content".to_string());
        lines.push(String::new());
        lines.push(memory.content.clone());
        lines.push(String::new());

        if !related.is_empty() {
            lines.push("## Relationships".to_string());
            lines.push(String::new());
            for (neighbor, relationship) in &related {
                lines.push(format!(
                    "- **{}** -> [{}]({})",
                    relationship.relationship_type,
                    neighbor.title,
                    neighbor.id.as_deref().unwrap_or("")
                ));
            }
            lines.push(String::new());
        }

        let file_path = output_dir.join(file_name(memory, id));
        std::fs::write(file_path, lines.join("\n"))?;
    }

    info!("Exported {} memories to {}", memories.len(), output_dir.display());
    Ok(())
}

/// `<sanitized_title>_<id prefix>.md`
fn file_name(memory: &Memory, id: &str) -> String {
    let safe_title: String = memory
        .title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let id_prefix: String = id.chars().take(8).collect();
    format!("{safe_title}_{id_prefix}.md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sqlite::SqliteBackend;
    use crate::model::{MemoryType, RelationshipType};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_markdown_export_layout() {
        let dir = tempdir().unwrap();
        let backend = SqliteBackend::create(Some(dir.path().join("md.db"))).await.unwrap();
        let repo = MemoryRepository::new(Arc::new(backend));

        let mut memory = Memory::new(MemoryType::Solution, "Fix: cache misses", "Warmed the cache");
        memory.summary = Some("cache warmup".to_string());
        memory.tags = vec!["cache".to_string()];
        let solution = repo.store_memory(memory).await.unwrap();
        let problem = repo
            .store_memory(Memory::new(MemoryType::Problem, "Cold cache", "cold start"))
            .await
            .unwrap();
        repo.create_relationship(&solution, &problem, RelationshipType::Solves, None)
            .await
            .unwrap();

        let out = dir.path().join("md");
        export_to_markdown(&repo, &out).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(files.len(), 2);

        let solution_file = std::fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .find(|e| e.file_name().to_string_lossy().starts_with("Fix__cache_misses"))
            .unwrap();
        let body = std::fs::read_to_string(solution_file.path()).unwrap();
        assert!(body.starts_with("---\n"));
        assert!(body.contains("title: Fix: cache misses"));
        assert!(body.contains("## Summary"));
        assert!(body.contains("## Content"));
        assert!(body.contains("**SOLVES** -> [Cold cache]"));
    }
}
