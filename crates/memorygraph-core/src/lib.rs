//! # MemoryGraph Core
//!
//! Persistent, queryable knowledge-graph store for AI coding assistants.
//! Records typed memories (problems, solutions, errors, fixes, patterns,
//! decisions) and typed, weighted relationships between them, and answers
//! questions over the resulting graph:
//!
//! - Full-text and tag-filtered search with fuzzy stem expansion
//! - K-hop traversal, shortest paths, cluster and bridge analysis
//! - Temporal activity summaries and unsolved-problem tracking
//! - Structured context filters on relationships
//!
//! The same logical store runs on interchangeable backends behind one
//! contract: an embedded SQLite store with an in-memory adjacency index, a
//! Cypher-capable adapter for remote graph servers (Bolt driver behind the
//! `bolt` feature), and a hosted REST variant wrapped in a circuit breaker.
//! A universal JSON export format moves data between them with validated,
//! rollback-capable migration.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use memorygraph_core::{
//!     backend::sqlite::SqliteBackend, model::{Memory, MemoryType},
//!     repository::MemoryRepository,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> memorygraph_core::Result<()> {
//! let backend = SqliteBackend::create(None).await?;
//! let repo = MemoryRepository::new(Arc::new(backend));
//!
//! let memory = Memory::new(MemoryType::Solution, "Fixed Redis timeout", "Raised timeout to 30s");
//! let id = repo.store_memory(memory).await?;
//! let found = repo.get_memory(&id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): compile SQLite into the binary
//! - `bolt`: Bolt wire client for the Neo4j/Memgraph backends

// ============================================================================
// MODULES
// ============================================================================

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod graph;
pub mod migration;
pub mod model;
pub mod repository;
pub mod search;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use backend::{create_backend, create_from_config, GraphBackend, HealthStatus};
pub use config::{BackendConfig, BackendKind, Config, ToolProfile};
pub use error::{MemoryGraphError, Result};
pub use model::{
    Memory, MemoryContext, MemoryType, Relationship, RelationshipCategory,
    RelationshipProperties, RelationshipType, SearchQuery,
};
pub use repository::{MemoryRepository, RelationshipContextFilter};
