//! Journey: problems, solutions, and the activity briefing.

use memorygraph_core::model::{MemoryType, RelationshipType};
use memorygraph_e2e_tests::TestStore;

#[tokio::test]
async fn solves_relationship_round_trip() {
    let store = TestStore::new().await;
    let problem = store
        .store(MemoryType::Problem, "Redis timeout in prod", "Requests time out under load")
        .await;
    let solution = store
        .store(MemoryType::Solution, "Raise Redis timeout", "Raised timeout to 30s")
        .await;

    store
        .repository
        .create_relationship(&solution, &problem, RelationshipType::Solves, None)
        .await
        .unwrap();

    let related = store
        .repository
        .get_related_memories(&problem, Some(&[RelationshipType::Solves]), 1)
        .await
        .unwrap();
    assert_eq!(related.len(), 1);
    let (memory, relationship) = &related[0];
    assert_eq!(memory.id.as_deref(), Some(solution.as_str()));
    assert_eq!(relationship.relationship_type, RelationshipType::Solves);
    assert_eq!(relationship.from_memory_id, solution);
    assert_eq!(relationship.to_memory_id, problem);

    // A solved problem is not listed as unresolved
    let activity = store.repository.get_recent_activity(7, None).await.unwrap();
    assert!(activity
        .unresolved_problems
        .iter()
        .all(|m| m.id.as_deref() != Some(problem.as_str())));
}

#[tokio::test]
async fn delete_cascades_and_cleans_unresolved() {
    let store = TestStore::new().await;
    let problem = store.store(MemoryType::Error, "Broken deploy", "Pipeline fails").await;
    let fix = store.store(MemoryType::Fix, "Pin CI image", "Pinned to v2").await;
    store
        .repository
        .create_relationship(&fix, &problem, RelationshipType::Addresses, None)
        .await
        .unwrap();

    assert!(store.repository.delete_memory(&fix).await.unwrap());

    // The edge is gone with its endpoint
    let related = store
        .repository
        .get_related_memories(&problem, None, 1)
        .await
        .unwrap();
    assert!(related.is_empty());

    // And the problem shows up as unresolved again
    let activity = store.repository.get_recent_activity(7, None).await.unwrap();
    assert!(activity
        .unresolved_problems
        .iter()
        .any(|m| m.id.as_deref() == Some(problem.as_str())));
}

#[tokio::test]
async fn reinforcement_strengthens_over_uses() {
    let store = TestStore::new().await;
    let a = store.store(MemoryType::Solution, "a", "content a").await;
    let b = store.store(MemoryType::Problem, "b", "content b").await;
    store
        .repository
        .create_relationship(&a, &b, RelationshipType::Solves, None)
        .await
        .unwrap();

    let mut last_evidence = 1;
    for _ in 0..3 {
        let (_, props) = store.repository.reinforce_relationship(&a, &b, true).await.unwrap();
        assert!(props.evidence_count > last_evidence);
        last_evidence = props.evidence_count;
        assert!(props.strength <= 1.0 && props.strength >= 0.1);
    }

    let related = store.repository.get_related_memories(&b, None, 1).await.unwrap();
    assert_eq!(related[0].1.properties.evidence_count, 4);
    assert_eq!(related[0].1.properties.success_rate, Some(1.0));
}
