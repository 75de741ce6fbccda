//! Journey: migrate between stores with verification and rollback.

use std::sync::Arc;

use memorygraph_core::backend::sqlite::SqliteBackend;
use memorygraph_core::backend::GraphBackend;
use memorygraph_core::config::BackendConfig;
use memorygraph_core::migration::{MigrationManager, MigrationOptions};
use memorygraph_core::model::{Memory, MemoryType, RelationshipType, SearchQuery};
use memorygraph_core::repository::MemoryRepository;
use memorygraph_e2e_tests::TestStore;

async fn seed_source(store: &TestStore, memories: usize) -> Vec<String> {
    let mut ids = Vec::new();
    for i in 0..memories {
        ids.push(
            store
                .store(MemoryType::General, &format!("memory {i}"), &format!("content {i}"))
                .await,
        );
    }
    for pair in ids.windows(2) {
        store
            .repository
            .create_relationship(&pair[0], &pair[1], RelationshipType::Follows, None)
            .await
            .unwrap();
    }
    ids
}

#[tokio::test]
async fn migration_with_verification_passes() {
    let store = TestStore::new().await;
    seed_source(&store, 20).await;
    store.repository.backend().disconnect().await.unwrap();

    let source = BackendConfig::sqlite(store.path("e2e.db"));
    let target = BackendConfig::sqlite(store.path("migrated.db"));

    let result = MigrationManager::new()
        .migrate(&source, &target, &MigrationOptions::default())
        .await;

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.imported_memories, 20);
    assert_eq!(result.imported_relationships, 19);
    let verification = result.verification.expect("verification ran");
    assert!(verification.valid);
    assert_eq!(verification.source_count, verification.target_count);
}

#[tokio::test]
async fn tampered_target_fails_verification_and_rolls_back() {
    let store = TestStore::new().await;
    seed_source(&store, 10).await;
    store.repository.backend().disconnect().await.unwrap();

    let source = BackendConfig::sqlite(store.path("e2e.db"));
    let target = BackendConfig::sqlite(store.path("migrated.db"));
    let manager = MigrationManager::new();

    let result = manager
        .migrate(&source, &target, &MigrationOptions::default())
        .await;
    assert!(result.success);

    // Tamper with one memory in the target
    {
        let backend = SqliteBackend::create(Some(store.path("migrated.db"))).await.unwrap();
        let repository = MemoryRepository::new(Arc::new(backend));
        let mut all = repository
            .collect_memories(SearchQuery::match_all(100, 0))
            .await
            .unwrap();
        let mut victim = all.remove(0);
        victim.content = "definitely not the original content".to_string();
        repository.update_memory(victim).await.unwrap();
        repository.backend().disconnect().await.unwrap();
    }

    let verification = manager.verify_migration(&source, &target).await.unwrap();
    assert!(!verification.valid);
    assert!(!verification.errors.is_empty());

    // Re-running the full migration with rollback clears the target on the
    // verification mismatch (skip_duplicates keeps the tampered copy in
    // place, so verification still fails)
    let result = manager
        .migrate(&source, &target, &MigrationOptions::default())
        .await;
    assert!(!result.success);

    let backend = SqliteBackend::create(Some(store.path("migrated.db"))).await.unwrap();
    let repository = MemoryRepository::new(Arc::new(backend));
    let page = repository
        .search_memories_paginated(&SearchQuery::match_all(1, 0))
        .await
        .unwrap();
    assert_eq!(page.total_count, 0, "rollback must empty the target");
}

#[tokio::test]
async fn dry_run_reports_without_importing() {
    let store = TestStore::new().await;
    seed_source(&store, 5).await;
    store.repository.backend().disconnect().await.unwrap();

    let source = BackendConfig::sqlite(store.path("e2e.db"));
    let target = BackendConfig::sqlite(store.path("dry.db"));

    let options = MigrationOptions { dry_run: true, ..MigrationOptions::default() };
    let result = MigrationManager::new().migrate(&source, &target, &options).await;
    assert!(result.success);
    assert!(result.dry_run);
    assert_eq!(result.source_memory_count, 5);
    assert_eq!(result.imported_memories, 0);
}
