//! Migration tool group.
//!
//! Builds explicit `BackendConfig` values for source and target (the current
//! configuration supplies connection details, arguments override the file
//! paths), then hands off to the migration manager. `validate_migration` is
//! the dry-run preflight: phases 1-3 plus export validation, no import.

use serde::Deserialize;
use serde_json::{json, Value};

use memorygraph_core::config::{BackendConfig, BackendKind};
use memorygraph_core::migration::{MigrationManager, MigrationOptions};

use super::memory::parse_args;
use super::{HandlerFuture, ServerState, ToolDef, ToolGroup};

pub fn tool_definitions() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "migrate_database",
            description: "Migrate all memories and relationships from one backend to another. \
                          Additive: existing target data is kept (duplicates skipped by \
                          default). Verifies counts and a content sample afterwards and can \
                          roll the target back on mismatch.",
            group: ToolGroup::Migration,
            schema: migrate_schema,
            handler: migrate_database,
        },
        ToolDef {
            name: "validate_migration",
            description: "Preflight a migration without importing: validates both backend \
                          configurations, connectivity, and the exported document.",
            group: ToolGroup::Migration,
            schema: validate_schema,
            handler: validate_migration,
        },
    ]
}

// ============================================================================
// SCHEMAS
// ============================================================================

fn backend_enum() -> Vec<&'static str> {
    vec!["sqlite", "neo4j", "memgraph", "falkordb", "falkordblite", "turso", "ladybugdb", "cloud"]
}

fn migrate_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "source_backend": {
                "type": "string", "enum": backend_enum(),
                "description": "Backend type to migrate from"
            },
            "target_backend": {
                "type": "string", "enum": backend_enum(),
                "description": "Backend type to migrate to"
            },
            "source_path": {
                "type": "string",
                "description": "Database file path override for an embedded source"
            },
            "target_path": {
                "type": "string",
                "description": "Database file path override for an embedded target"
            },
            "dry_run": {
                "type": "boolean",
                "description": "Validate and export only; skip the import (default: false)"
            },
            "verify": {
                "type": "boolean",
                "description": "Compare counts and a content sample afterwards (default: true)"
            },
            "rollback_on_failure": {
                "type": "boolean",
                "description": "Clear the target when verification fails (default: true)"
            },
            "skip_duplicates": {
                "type": "boolean",
                "description": "Leave existing target memories untouched (default: true)"
            },
            "verbose": {
                "type": "boolean",
                "description": "Report progress while exporting/importing (default: false)"
            }
        },
        "required": ["source_backend", "target_backend"]
    })
}

fn validate_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "source_backend": {
                "type": "string", "enum": backend_enum(),
                "description": "Backend type to migrate from"
            },
            "target_backend": {
                "type": "string", "enum": backend_enum(),
                "description": "Backend type to migrate to"
            },
            "source_path": { "type": "string", "description": "Path override for an embedded source" },
            "target_path": { "type": "string", "description": "Path override for an embedded target" }
        },
        "required": ["source_backend", "target_backend"]
    })
}

// ============================================================================
// HANDLERS
// ============================================================================

#[derive(Deserialize)]
struct MigrateArgs {
    source_backend: String,
    target_backend: String,
    source_path: Option<String>,
    target_path: Option<String>,
    #[serde(default)]
    dry_run: bool,
    verify: Option<bool>,
    rollback_on_failure: Option<bool>,
    skip_duplicates: Option<bool>,
    #[serde(default)]
    verbose: bool,
}

fn backend_config(
    state: &ServerState,
    backend: &str,
    path_override: Option<&str>,
) -> std::result::Result<BackendConfig, String> {
    let kind = BackendKind::parse(backend).map_err(|e| e.to_string())?;
    if kind == BackendKind::Auto {
        return Err("Migration requires a concrete backend, not 'auto'".to_string());
    }
    let mut config = state.config.backend_config(kind);
    if let Some(path) = path_override {
        config.path = Some(path.into());
    }
    Ok(config)
}

fn migrate_database(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: MigrateArgs = parse_args(args)?;
        let source = backend_config(state, &args.source_backend, args.source_path.as_deref())?;
        let target = backend_config(state, &args.target_backend, args.target_path.as_deref())?;

        let options = MigrationOptions {
            dry_run: args.dry_run,
            verbose: args.verbose,
            skip_duplicates: args.skip_duplicates.unwrap_or(true),
            verify: args.verify.unwrap_or(true),
            rollback_on_failure: args.rollback_on_failure.unwrap_or(true),
        };

        let result = MigrationManager::new().migrate(&source, &target, &options).await;
        let payload = serde_json::to_value(&result).map_err(|e| e.to_string())?;
        if result.success {
            Ok(payload)
        } else {
            Err(payload.to_string())
        }
    })
}

#[derive(Deserialize)]
struct ValidateArgs {
    source_backend: String,
    target_backend: String,
    source_path: Option<String>,
    target_path: Option<String>,
}

fn validate_migration(state: &ServerState, args: Option<Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: ValidateArgs = parse_args(args)?;
        let source = backend_config(state, &args.source_backend, args.source_path.as_deref())?;
        let target = backend_config(state, &args.target_backend, args.target_path.as_deref())?;

        let options = MigrationOptions {
            dry_run: true,
            ..MigrationOptions::default()
        };
        let result = MigrationManager::new().migrate(&source, &target, &options).await;
        Ok(json!({
            "valid": result.success,
            "source_memory_count": result.source_memory_count,
            "errors": result.errors,
        }))
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use memorygraph_core::backend::sqlite::SqliteBackend;
    use memorygraph_core::backend::GraphBackend;
    use memorygraph_core::config::Config;
    use memorygraph_core::model::{Memory, MemoryType};
    use memorygraph_core::repository::MemoryRepository;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_migrate_between_sqlite_files() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("source.db");
        let target_path = dir.path().join("target.db");

        // Seed the source
        {
            let backend = SqliteBackend::create(Some(source_path.clone())).await.unwrap();
            let repo = MemoryRepository::new(Arc::new(backend));
            for i in 0..3 {
                repo.store_memory(Memory::new(
                    MemoryType::General,
                    format!("m{i}"),
                    format!("content {i}"),
                ))
                .await
                .unwrap();
            }
            repo.backend().disconnect().await.unwrap();
        }

        let state = ServerState {
            repository: MemoryRepository::new(Arc::new(
                SqliteBackend::create(Some(dir.path().join("server.db"))).await.unwrap(),
            )),
            config: Config::default(),
        };

        let result = migrate_database(
            &state,
            Some(json!({
                "source_backend": "sqlite",
                "target_backend": "sqlite",
                "source_path": source_path.to_string_lossy(),
                "target_path": target_path.to_string_lossy(),
            })),
        )
        .await
        .unwrap();
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["imported_memories"], json!(3));
        assert_eq!(result["verification"]["valid"], json!(true));
    }

    #[tokio::test]
    async fn test_validate_migration_dry_run() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("source.db");
        {
            let backend = SqliteBackend::create(Some(source_path.clone())).await.unwrap();
            backend.disconnect().await.unwrap();
        }

        let state = ServerState {
            repository: MemoryRepository::new(Arc::new(
                SqliteBackend::create(Some(dir.path().join("server.db"))).await.unwrap(),
            )),
            config: Config::default(),
        };

        let result = validate_migration(
            &state,
            Some(json!({
                "source_backend": "sqlite",
                "target_backend": "sqlite",
                "source_path": source_path.to_string_lossy(),
                "target_path": dir.path().join("target.db").to_string_lossy(),
            })),
        )
        .await
        .unwrap();
        assert_eq!(result["valid"], json!(true));

        // Target must not have been created with data
        let target = SqliteBackend::create(Some(dir.path().join("target.db"))).await.unwrap();
        let stats = target.get_memory_statistics().await.unwrap();
        assert_eq!(stats.total_memories, 0);
    }

    #[tokio::test]
    async fn test_auto_rejected_for_migration() {
        let dir = tempdir().unwrap();
        let state = ServerState {
            repository: MemoryRepository::new(Arc::new(
                SqliteBackend::create(Some(dir.path().join("server.db"))).await.unwrap(),
            )),
            config: Config::default(),
        };

        let err = migrate_database(
            &state,
            Some(json!({ "source_backend": "auto", "target_backend": "sqlite" })),
        )
        .await
        .unwrap_err();
        assert!(err.contains("concrete backend"));
    }
}
