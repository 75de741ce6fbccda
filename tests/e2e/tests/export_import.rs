//! Journey: populate, export, import into a fresh store, compare.

use std::collections::HashSet;
use std::sync::Arc;

use memorygraph_core::backend::sqlite::SqliteBackend;
use memorygraph_core::export::{export_to_json, import_from_json, ExportDocument};
use memorygraph_core::model::{Memory, MemoryType, RelationshipType};
use memorygraph_core::repository::MemoryRepository;
use memorygraph_e2e_tests::TestStore;

#[tokio::test]
async fn export_import_round_trip_preserves_graph() {
    let store = TestStore::new().await;

    // 100 memories in a chain plus cross links: 99 + 50 relationships
    let mut ids = Vec::new();
    for i in 0..100 {
        let mut memory = Memory::new(
            MemoryType::General,
            format!("memory {i}"),
            format!("content for memory {i}"),
        );
        memory.tags = vec![format!("batch{}", i % 5)];
        ids.push(store.repository.store_memory(memory).await.unwrap());
    }
    for pair in ids.windows(2) {
        store
            .repository
            .create_relationship(&pair[0], &pair[1], RelationshipType::LeadsTo, None)
            .await
            .unwrap();
    }
    for i in 0..50 {
        store
            .repository
            .create_relationship(&ids[i], &ids[i + 50], RelationshipType::RelatedTo, None)
            .await
            .unwrap();
    }

    let export_path = store.path("export.json");
    let stats = export_to_json(&store.repository, &export_path, None).await.unwrap();
    assert_eq!(stats.memory_count, 100);
    assert_eq!(stats.relationship_count, 149);

    // Import into a fresh store
    let target_backend = SqliteBackend::create(Some(store.path("fresh.db"))).await.unwrap();
    let target = MemoryRepository::new(Arc::new(target_backend));
    let imported = import_from_json(&target, &export_path, false, None).await.unwrap();
    assert_eq!(imported.imported_memories, 100);
    assert_eq!(imported.imported_relationships, 149);

    let health = target.health_check().await.unwrap();
    assert_eq!(health.statistics.unwrap().memory_count, 100);

    // Sample ten ids and compare content across both stores
    for id in ids.iter().step_by(10) {
        let original = store.repository.get_memory(id).await.unwrap().unwrap();
        let copied = target.get_memory(id).await.unwrap().unwrap();
        assert_eq!(original.content, copied.content);
        assert_eq!(original.tags, copied.tags);
    }

    // Re-export and compare document-level identity
    let second_path = store.path("export2.json");
    export_to_json(&target, &second_path, None).await.unwrap();

    let parse = |path: &std::path::Path| -> ExportDocument {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    };
    let first = parse(&export_path);
    let second = parse(&second_path);
    assert_eq!(first.memory_count, second.memory_count);
    assert_eq!(first.relationship_count, second.relationship_count);

    let id_content = |doc: &ExportDocument| -> HashSet<(String, String)> {
        doc.memories
            .iter()
            .map(|m| (m.id.clone(), m.content.clone()))
            .collect()
    };
    assert_eq!(id_content(&first), id_content(&second));
}

#[tokio::test]
async fn bidirectional_edges_survive_round_trip_as_single_rows() {
    let store = TestStore::new().await;
    let a = store.store(MemoryType::Technology, "redis", "cache").await;
    let b = store.store(MemoryType::Technology, "memcached", "cache").await;
    store
        .repository
        .create_relationship(&a, &b, RelationshipType::AlternativeTo, None)
        .await
        .unwrap();

    let export_path = store.path("bidi.json");
    let stats = export_to_json(&store.repository, &export_path, None).await.unwrap();
    assert_eq!(stats.relationship_count, 1);

    let target_backend = SqliteBackend::create(Some(store.path("bidi.db"))).await.unwrap();
    let target = MemoryRepository::new(Arc::new(target_backend));
    import_from_json(&target, &export_path, false, None).await.unwrap();

    // Visible from both endpoints, stored once
    let from_a = target.get_related_memories(&a, None, 1).await.unwrap();
    let from_b = target.get_related_memories(&b, None, 1).await.unwrap();
    assert_eq!(from_a.len(), 1);
    assert_eq!(from_b.len(), 1);
    assert_eq!(target.count_relationships().await.unwrap(), 1);
}
