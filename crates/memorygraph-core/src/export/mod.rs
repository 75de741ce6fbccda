//! Universal export/import.
//!
//! One JSON document (format version 2.0) that every backend can produce and
//! consume, plus a Markdown export for human consumption. The format is
//! forward-compatible: consumers ignore unknown fields, producers always set
//! `format_version` (and `export_version` for older readers).

mod json;
mod markdown;

pub use json::{export_to_json, import_from_json, ExportStats, ImportStats, ProgressFn};
pub use markdown::export_to_markdown;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    Memory, MemoryContext, MemoryType, Relationship, RelationshipProperties, RelationshipType,
};

/// Current export format version.
pub const FORMAT_VERSION: &str = "2.0";

/// A memory as it appears in the export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedMemory {
    pub id: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_importance")]
    pub importance: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MemoryContext>,
}

fn default_importance() -> f64 {
    0.5
}

fn default_confidence() -> f64 {
    0.8
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

impl From<&Memory> for ExportedMemory {
    fn from(memory: &Memory) -> Self {
        Self {
            id: memory.id.clone().unwrap_or_default(),
            memory_type: memory.memory_type,
            title: memory.title.clone(),
            content: memory.content.clone(),
            summary: memory.summary.clone(),
            tags: memory.tags.clone(),
            importance: memory.importance,
            confidence: memory.confidence,
            created_at: memory.created_at,
            updated_at: memory.updated_at,
            context: memory.context.clone().filter(|c| !c.is_empty()),
        }
    }
}

impl ExportedMemory {
    pub fn into_memory(self) -> Memory {
        let mut memory = Memory::new(self.memory_type, self.title, self.content);
        memory.id = Some(self.id);
        memory.summary = self.summary;
        memory.tags = self.tags;
        memory.importance = self.importance;
        memory.confidence = self.confidence;
        memory.created_at = self.created_at;
        memory.updated_at = self.updated_at;
        memory.context = self.context;
        memory
    }
}

/// The subset of relationship properties that travels in the export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedRelationshipProperties {
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default = "default_evidence")]
    pub evidence_count: u64,
}

fn default_strength() -> f64 {
    0.5
}

fn default_evidence() -> u64 {
    1
}

impl ExportedRelationshipProperties {
    pub fn into_properties(self) -> RelationshipProperties {
        RelationshipProperties {
            strength: self.strength,
            confidence: self.confidence,
            context: self.context,
            evidence_count: self.evidence_count,
            ..RelationshipProperties::default()
        }
    }
}

/// An edge as it appears in the export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedRelationship {
    pub from_memory_id: String,
    pub to_memory_id: String,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub properties: ExportedRelationshipProperties,
}

impl From<&Relationship> for ExportedRelationship {
    fn from(relationship: &Relationship) -> Self {
        Self {
            from_memory_id: relationship.from_memory_id.clone(),
            to_memory_id: relationship.to_memory_id.clone(),
            relationship_type: relationship.relationship_type,
            properties: ExportedRelationshipProperties {
                strength: relationship.properties.strength,
                confidence: relationship.properties.confidence,
                context: relationship.properties.context.clone(),
                evidence_count: relationship.properties.evidence_count,
            },
        }
    }
}

/// Top-level export document (format v2.0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    /// Mirror of `format_version` kept for backward compatibility
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_version: Option<String>,
    #[serde(default = "now")]
    pub export_date: DateTime<Utc>,
    #[serde(default)]
    pub backend_type: String,
    #[serde(default)]
    pub memory_count: usize,
    #[serde(default)]
    pub relationship_count: usize,
    pub memories: Vec<ExportedMemory>,
    pub relationships: Vec<ExportedRelationship>,
}

impl ExportDocument {
    pub fn new(
        backend_type: &str,
        memories: Vec<ExportedMemory>,
        relationships: Vec<ExportedRelationship>,
    ) -> Self {
        Self {
            format_version: Some(FORMAT_VERSION.to_string()),
            export_version: Some(FORMAT_VERSION.to_string()),
            export_date: Utc::now(),
            backend_type: backend_type.to_string(),
            memory_count: memories.len(),
            relationship_count: relationships.len(),
            memories,
            relationships,
        }
    }

    /// Whichever version field is present.
    pub fn version(&self) -> Option<&str> {
        self.format_version
            .as_deref()
            .or(self.export_version.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exported_memory_round_trip() {
        let mut memory = Memory::new(MemoryType::Solution, "title", "content");
        memory.id = Some("m1".to_string());
        memory.tags = vec!["a".to_string()];
        memory.summary = Some("short".to_string());

        let exported = ExportedMemory::from(&memory);
        let restored = exported.into_memory();
        assert_eq!(restored.id.as_deref(), Some("m1"));
        assert_eq!(restored.title, "title");
        assert_eq!(restored.tags, vec!["a"]);
        assert_eq!(restored.summary.as_deref(), Some("short"));
    }

    #[test]
    fn test_document_version_fallback() {
        let doc = ExportDocument {
            format_version: None,
            export_version: Some("1.0".to_string()),
            export_date: Utc::now(),
            backend_type: "sqlite".to_string(),
            memory_count: 0,
            relationship_count: 0,
            memories: Vec::new(),
            relationships: Vec::new(),
        };
        assert_eq!(doc.version(), Some("1.0"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let raw = serde_json::json!({
            "format_version": "2.0",
            "export_date": "2026-01-01T00:00:00Z",
            "backend_type": "sqlite",
            "memory_count": 0,
            "relationship_count": 0,
            "memories": [],
            "relationships": [],
            "some_future_field": { "nested": true },
        });
        let doc: ExportDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.version(), Some("2.0"));
    }
}
