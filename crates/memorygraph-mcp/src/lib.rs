//! # MemoryGraph MCP Server
//!
//! Model Context Protocol server over the MemoryGraph engine. Exposes the
//! knowledge-graph store to AI coding assistants as a set of named tools
//! (store/recall/search/relationships/analytics/migration) over line-delimited
//! JSON-RPC on stdin/stdout.

pub mod project;
pub mod protocol;
pub mod server;
pub mod tools;
