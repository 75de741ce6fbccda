//! Tool registry and dispatch.
//!
//! A tool is a named operation with a JSON-schema input and a JSON result.
//! The registry is populated once at startup from three groups (basic,
//! advanced relationship analytics, migration) and dispatch is a single
//! table lookup. The configured profile filters the set visible in
//! tools/list; dispatch accepts any registered name.

pub mod analytics;
pub mod memory;
pub mod migration;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use memorygraph_core::config::{Config, ToolProfile};
use memorygraph_core::repository::MemoryRepository;

use crate::protocol::messages::ToolDescription;

/// Shared state handed to every handler.
pub struct ServerState {
    pub repository: MemoryRepository,
    pub config: Config,
}

/// Future returned by a handler.
pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<Value, String>> + Send + 'a>>;

/// A tool handler: arguments in, JSON result or error message out.
pub type Handler = for<'a> fn(&'a ServerState, Option<Value>) -> HandlerFuture<'a>;

/// Which registry group a tool belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolGroup {
    Basic,
    Advanced,
    Migration,
}

/// One registered tool.
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub group: ToolGroup,
    pub schema: fn() -> Value,
    pub handler: Handler,
}

/// Tools visible under the core profile (9).
const CORE_TOOLS: [&str; 9] = [
    "recall_memories",
    "store_memory",
    "get_memory",
    "search_memories",
    "update_memory",
    "delete_memory",
    "create_relationship",
    "get_related_memories",
    "get_recent_activity",
];

/// Additional tools visible under the extended profile (11 total).
const EXTENDED_EXTRA_TOOLS: [&str; 2] = ["get_memory_statistics", "search_relationships_by_context"];

/// Name -> handler table plus the tool descriptions.
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
    handlers: HashMap<&'static str, Handler>,
}

impl ToolRegistry {
    /// Collect the union of the three tool groups.
    pub fn new() -> Self {
        let mut tools: Vec<ToolDef> = Vec::new();
        tools.extend(memory::tool_definitions());
        tools.extend(analytics::tool_definitions());
        tools.extend(migration::tool_definitions());

        let handlers = tools.iter().map(|def| (def.name, def.handler)).collect();
        Self { tools, handlers }
    }

    /// All registered tool names, in registration order.
    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|def| def.name).collect()
    }

    /// Whether `name` is visible under `profile`.
    fn is_visible(name: &str, profile: ToolProfile) -> bool {
        CORE_TOOLS.contains(&name)
            || (profile == ToolProfile::Extended && EXTENDED_EXTRA_TOOLS.contains(&name))
    }

    /// Tool descriptions for tools/list, filtered by the active profile.
    pub fn visible_tools(&self, profile: ToolProfile) -> Vec<ToolDescription> {
        self.tools
            .iter()
            .filter(|def| Self::is_visible(def.name, profile))
            .map(|def| ToolDescription {
                name: def.name.to_string(),
                description: Some(def.description.to_string()),
                input_schema: (def.schema)(),
            })
            .collect()
    }

    /// Look the handler up; `None` means an unknown tool.
    pub fn handler(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).copied()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
