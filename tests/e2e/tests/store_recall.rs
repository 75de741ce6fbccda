//! Journey: store a memory, recall it with fuzzy queries.

use memorygraph_core::model::{MatchQuality, Memory, MemoryType, SearchQuery};
use memorygraph_e2e_tests::TestStore;

#[tokio::test]
async fn store_and_recall_by_title_match() {
    let store = TestStore::new().await;

    let mut memory = Memory::new(MemoryType::Solution, "Fixed Redis timeout", "Raised timeout to 30s");
    memory.tags = vec!["redis".to_string(), "timeout".to_string()];
    memory.importance = 0.8;
    let id = store.repository.store_memory(memory).await.unwrap();

    let query = SearchQuery {
        query: Some("timeout".to_string()),
        ..SearchQuery::default()
    };
    let results = store.repository.search_memories(&query).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id.as_deref(), Some(id.as_str()));

    let info = results[0].match_info.as_ref().expect("match info");
    assert!(info.matched_fields.contains(&"title".to_string()));
    assert_eq!(info.match_quality, MatchQuality::High);
}

#[tokio::test]
async fn recall_finds_stemmed_variants() {
    let store = TestStore::new().await;
    store
        .store(MemoryType::Solution, "Retry on 429", "Added exponential backoff")
        .await;

    // "retries" reaches "Retry on 429" via the retries -> retry stem
    let query = SearchQuery {
        query: Some("retries".to_string()),
        ..SearchQuery::default()
    };
    let results = store.repository.search_memories(&query).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Retry on 429");
}

#[tokio::test]
async fn stored_tags_are_normalized() {
    let store = TestStore::new().await;

    let mut memory = Memory::new(MemoryType::General, "tag test", "content");
    memory.tags = vec![" Redis ".to_string(), "REDIS".to_string(), "cache".to_string()];
    let id = store.repository.store_memory(memory).await.unwrap();

    let fetched = store.repository.get_memory(&id).await.unwrap().unwrap();
    assert_eq!(fetched.id.as_deref(), Some(id.as_str()));
    assert_eq!(fetched.tags, vec!["redis", "cache"]);
}
