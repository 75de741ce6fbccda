//! Journey: full MCP dispatch: store, recall, relate, analyze through tools.

use memorygraph_core::config::{Config, ToolProfile};
use memorygraph_e2e_tests::TestServer;
use serde_json::json;

#[tokio::test]
async fn store_recall_and_relate_through_tools() {
    let mut server = TestServer::new(Config::default()).await.initialized().await;

    let (stored, is_error) = server
        .call_tool(
            "store_memory",
            json!({
                "type": "problem",
                "title": "Redis timeout in prod",
                "content": "Requests time out under load",
                "tags": ["redis"],
            }),
        )
        .await;
    assert!(!is_error);
    let problem_id = stored["memory_id"].as_str().unwrap().to_string();

    let (stored, is_error) = server
        .call_tool(
            "store_memory",
            json!({
                "type": "solution",
                "title": "Raise Redis timeout",
                "content": "Raised timeout to 30s",
                "importance": 0.8,
            }),
        )
        .await;
    assert!(!is_error);
    let solution_id = stored["memory_id"].as_str().unwrap().to_string();

    let (_, is_error) = server
        .call_tool(
            "create_relationship",
            json!({
                "from_memory_id": solution_id,
                "to_memory_id": problem_id,
                "relationship_type": "SOLVES",
            }),
        )
        .await;
    assert!(!is_error);

    let (recalled, is_error) = server
        .call_tool("recall_memories", json!({ "query": "timeout" }))
        .await;
    assert!(!is_error);
    assert_eq!(recalled["count"], json!(2));

    let (related, is_error) = server
        .call_tool(
            "get_related_memories",
            json!({ "memory_id": problem_id, "relationship_types": ["SOLVES"] }),
        )
        .await;
    assert!(!is_error);
    assert_eq!(related["count"], json!(1));
    assert_eq!(
        related["related"][0]["relationship"]["from_memory_id"],
        json!(solution_id)
    );

    // Activity briefing excludes the solved problem
    let (activity, is_error) = server
        .call_tool("get_recent_activity", json!({ "days": 7 }))
        .await;
    assert!(!is_error);
    let unresolved = activity["unresolved_problems"].as_array().unwrap();
    assert!(unresolved
        .iter()
        .all(|m| m["id"].as_str() != Some(problem_id.as_str())));
}

#[tokio::test]
async fn advanced_tools_run_the_kernel() {
    let mut server = TestServer::new(Config::default()).await.initialized().await;

    let mut ids = Vec::new();
    for i in 0..3 {
        let (stored, _) = server
            .call_tool(
                "store_memory",
                json!({ "type": "task", "title": format!("task {i}"), "content": "step" }),
            )
            .await;
        ids.push(stored["memory_id"].as_str().unwrap().to_string());
    }
    for pair in ids.windows(2) {
        server
            .call_tool(
                "create_relationship",
                json!({
                    "from_memory_id": pair[0],
                    "to_memory_id": pair[1],
                    "relationship_type": "FOLLOWS",
                }),
            )
            .await;
    }

    // Not visible in any profile, still dispatchable
    let (path, is_error) = server
        .call_tool(
            "find_memory_path",
            json!({ "from_memory_id": ids[0], "to_memory_id": ids[2] }),
        )
        .await;
    assert!(!is_error);
    assert_eq!(path["found"], json!(true));
    assert_eq!(path["hops"], json!(2));

    let (suggestion, is_error) = server
        .call_tool(
            "suggest_relationship_type",
            json!({ "from_memory_id": ids[0], "to_memory_id": ids[1] }),
        )
        .await;
    assert!(!is_error);
    assert_eq!(suggestion["suggestions"][0]["type"], json!("FOLLOWS"));

    let (metrics, is_error) = server.call_tool("analyze_graph_metrics", json!({})).await;
    assert!(!is_error);
    assert_eq!(metrics["graph_metrics"]["node_count"], json!(3));
}

#[tokio::test]
async fn extended_profile_exposes_statistics() {
    let mut config = Config::default();
    config.tool_profile = ToolProfile::Extended;
    let mut server = TestServer::new(config).await.initialized().await;

    let (stats, is_error) = server.call_tool("get_memory_statistics", json!({})).await;
    assert!(!is_error);
    assert_eq!(stats["total_memories"], json!(0));

    let (_, is_error) = server
        .call_tool("search_relationships_by_context", json!({ "scope": "partial" }))
        .await;
    assert!(!is_error);
}

#[tokio::test]
async fn errors_surface_without_stopping_the_server() {
    let mut server = TestServer::new(Config::default()).await.initialized().await;

    let (payload, is_error) = server
        .call_tool("get_memory", json!({ "memory_id": "does-not-exist" }))
        .await;
    assert!(is_error);
    assert!(payload["error"].as_str().unwrap().contains("not found"));

    let (payload, is_error) = server.call_tool("no_such_tool", json!({})).await;
    assert!(is_error);
    assert!(payload["error"].as_str().unwrap().contains("Unknown tool"));

    // Subsequent requests keep working
    let (_, is_error) = server
        .call_tool(
            "store_memory",
            json!({ "type": "general", "title": "still alive", "content": "yes" }),
        )
        .await;
    assert!(!is_error);
}
