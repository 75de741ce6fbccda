//! Backend factory.
//!
//! Selects and constructs backend instances. Construction is lazy: nothing
//! about a backend is touched until it is actually selected, and the Bolt
//! driver is only compiled in behind the `bolt` feature. Under the `auto`
//! policy the factory tries Neo4j (when credentials are configured), then
//! Memgraph, then falls back to the embedded store; each failure is logged
//! at WARN and the next candidate attempted.
//!
//! Schema initialization is performed here only for the embedded relational
//! and cloud backends; remote graph servers manage their schema externally.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::cloud::CloudBackend;
use crate::backend::sqlite::SqliteBackend;
use crate::backend::GraphBackend;
use crate::config::{BackendConfig, BackendKind, Config};
use crate::error::{MemoryGraphError, Result};

/// Create and connect the backend selected by `config.backend`.
pub async fn create_backend(config: &Config) -> Result<Arc<dyn GraphBackend>> {
    match config.backend {
        BackendKind::Auto => auto_select(config).await,
        kind => {
            info!("Explicit backend selection: {kind}");
            create_from_config(&config.backend_config(kind)).await
        }
    }
}

/// Thread-safe construction from an explicit configuration value.
///
/// Never consults process-wide environment; migration uses this to hold a
/// source and a target backend open at the same time.
pub async fn create_from_config(config: &BackendConfig) -> Result<Arc<dyn GraphBackend>> {
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(MemoryGraphError::validation(format!(
            "Invalid {} configuration: {}",
            config.kind,
            errors.join(", ")
        )));
    }

    match config.kind {
        BackendKind::Sqlite => {
            let backend = SqliteBackend::create(config.path.clone()).await?;
            // Safe on every startup; connect() already ran it once
            backend.initialize_schema().await?;
            Ok(Arc::new(backend))
        }

        BackendKind::Neo4j | BackendKind::Memgraph => create_bolt(config).await,

        BackendKind::Cloud => {
            let api_key = config.password.as_deref().unwrap_or_default();
            let backend =
                CloudBackend::new(api_key, config.uri.as_deref(), None)?;
            backend.connect().await?;
            backend.initialize_schema().await?;
            Ok(Arc::new(backend))
        }

        BackendKind::Falkordb | BackendKind::Falkordblite | BackendKind::Turso
        | BackendKind::Ladybugdb => Err(MemoryGraphError::backend_unavailable(format!(
            "The {} driver is not bundled with this build; \
             use sqlite, neo4j, memgraph, or cloud",
            config.kind
        ))),

        BackendKind::Auto => Err(MemoryGraphError::validation(
            "auto is a selection policy, not a concrete backend",
        )),
    }
}

#[cfg(feature = "bolt")]
async fn create_bolt(config: &BackendConfig) -> Result<Arc<dyn GraphBackend>> {
    use crate::backend::cypher::{CypherBackend, CypherFlavor};

    let flavor = if config.kind == BackendKind::Neo4j {
        CypherFlavor::Neo4j
    } else {
        CypherFlavor::Memgraph
    };
    let uri = config.uri.as_deref().unwrap_or("bolt://localhost:7687");
    let backend = CypherBackend::connect_bolt(
        uri,
        config.username.as_deref().unwrap_or_default(),
        config.password.as_deref().unwrap_or_default(),
        config.database.as_deref(),
        flavor,
    )
    .await?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "bolt"))]
async fn create_bolt(config: &BackendConfig) -> Result<Arc<dyn GraphBackend>> {
    Err(MemoryGraphError::backend_unavailable(format!(
        "{} support requires building with the 'bolt' feature",
        config.kind
    )))
}

/// Try remote graph servers in order, falling back to the embedded store.
async fn auto_select(config: &Config) -> Result<Arc<dyn GraphBackend>> {
    info!("Auto-selecting backend...");

    if config.is_neo4j_configured() {
        match create_from_config(&config.backend_config(BackendKind::Neo4j)).await {
            Ok(backend) => {
                info!("Connected to Neo4j backend");
                return Ok(backend);
            }
            Err(e) => warn!("Neo4j connection failed: {e}"),
        }
    }

    if config.is_memgraph_configured() {
        match create_from_config(&config.backend_config(BackendKind::Memgraph)).await {
            Ok(backend) => {
                info!("Connected to Memgraph backend");
                return Ok(backend);
            }
            Err(e) => warn!("Memgraph connection failed: {e}"),
        }
    }

    info!("Falling back to SQLite backend...");
    create_from_config(&config.backend_config(BackendKind::Sqlite))
        .await
        .map_err(|e| {
            MemoryGraphError::backend_unavailable(format!(
                "Could not connect to any backend. Last error: {e}"
            ))
        })
}
