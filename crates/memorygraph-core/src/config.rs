//! Configuration: backend selection, connection data, tool profile.
//!
//! Reads the `MEMORY_*` environment surface once into a plain struct.
//! Migration and tests construct [`BackendConfig`] values directly so that
//! backend instances never depend on mutating process-wide environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::backend::sqlite::default_db_path;
use crate::error::{MemoryGraphError, Result};

// ============================================================================
// BACKEND KIND
// ============================================================================

/// Supported backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Neo4j,
    Memgraph,
    Falkordb,
    Falkordblite,
    Turso,
    Ladybugdb,
    Cloud,
    Auto,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Neo4j => "neo4j",
            BackendKind::Memgraph => "memgraph",
            BackendKind::Falkordb => "falkordb",
            BackendKind::Falkordblite => "falkordblite",
            BackendKind::Turso => "turso",
            BackendKind::Ladybugdb => "ladybugdb",
            BackendKind::Cloud => "cloud",
            BackendKind::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "neo4j" => Ok(BackendKind::Neo4j),
            "memgraph" => Ok(BackendKind::Memgraph),
            "falkordb" => Ok(BackendKind::Falkordb),
            "falkordblite" => Ok(BackendKind::Falkordblite),
            "turso" => Ok(BackendKind::Turso),
            "ladybugdb" => Ok(BackendKind::Ladybugdb),
            "cloud" => Ok(BackendKind::Cloud),
            "auto" => Ok(BackendKind::Auto),
            other => Err(MemoryGraphError::validation(format!(
                "Unknown backend type: {other}. Valid options: sqlite, neo4j, memgraph, \
                 falkordb, falkordblite, turso, ladybugdb, cloud, auto"
            ))),
        }
    }

    /// Embedded backends keep their data in a local file.
    pub fn is_embedded(&self) -> bool {
        matches!(
            self,
            BackendKind::Sqlite | BackendKind::Falkordblite | BackendKind::Ladybugdb
        )
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TOOL PROFILE
// ============================================================================

/// Which subset of tools the dispatcher exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolProfile {
    /// Essential daily-use tools (9)
    #[default]
    Core,
    /// Core plus advanced analytics (11)
    Extended,
}

impl ToolProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolProfile::Core => "core",
            ToolProfile::Extended => "extended",
        }
    }

    /// Parse a profile name; legacy names map onto the current two.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "core" | "lite" => Ok(ToolProfile::Core),
            "extended" | "standard" | "full" => Ok(ToolProfile::Extended),
            other => Err(MemoryGraphError::validation(format!(
                "Unknown tool profile: {other}. Valid options: core, extended"
            ))),
        }
    }
}

impl std::fmt::Display for ToolProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// PER-BACKEND SETTINGS
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RemoteGraphSettings {
    pub uri: Option<String>,
    pub user: String,
    pub password: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CloudSettings {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// The full configuration surface.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendKind,
    pub sqlite_path: PathBuf,
    pub neo4j: RemoteGraphSettings,
    pub memgraph: RemoteGraphSettings,
    pub cloud: CloudSettings,
    pub tool_profile: ToolProfile,
    pub log_level: String,
    /// Reserved: the repository does not enforce the cycle check yet
    pub allow_cycles: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            sqlite_path: default_db_path(),
            neo4j: RemoteGraphSettings {
                uri: Some("bolt://localhost:7687".to_string()),
                user: "neo4j".to_string(),
                password: None,
                database: Some("neo4j".to_string()),
            },
            memgraph: RemoteGraphSettings::default(),
            cloud: CloudSettings::default(),
            tool_profile: ToolProfile::Core,
            log_level: "INFO".to_string(),
            allow_cycles: false,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Read the environment into a configuration value.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(backend) = env_var("MEMORY_BACKEND") {
            config.backend = BackendKind::parse(&backend)?;
        }
        if let Some(path) = env_var("MEMORY_SQLITE_PATH") {
            config.sqlite_path = PathBuf::from(path);
        }

        config.neo4j = RemoteGraphSettings {
            uri: env_var("MEMORY_NEO4J_URI")
                .or_else(|| env_var("NEO4J_URI"))
                .or(config.neo4j.uri),
            user: env_var("MEMORY_NEO4J_USER")
                .or_else(|| env_var("NEO4J_USER"))
                .unwrap_or_else(|| "neo4j".to_string()),
            password: env_var("MEMORY_NEO4J_PASSWORD").or_else(|| env_var("NEO4J_PASSWORD")),
            database: env_var("MEMORY_NEO4J_DATABASE").or(config.neo4j.database),
        };

        config.memgraph = RemoteGraphSettings {
            uri: env_var("MEMORY_MEMGRAPH_URI"),
            user: env_var("MEMORY_MEMGRAPH_USER").unwrap_or_default(),
            password: env_var("MEMORY_MEMGRAPH_PASSWORD"),
            database: None,
        };

        config.cloud = CloudSettings {
            api_key: env_var("MEMORYGRAPH_API_KEY"),
            api_url: env_var("MEMORYGRAPH_API_URL"),
            timeout_secs: env_var("MEMORYGRAPH_TIMEOUT").and_then(|v| v.parse().ok()),
        };

        if let Some(profile) = env_var("MEMORY_TOOL_PROFILE") {
            config.tool_profile = ToolProfile::parse(&profile)?;
        }
        if let Some(level) = env_var("MEMORY_LOG_LEVEL") {
            config.log_level = level.to_uppercase();
        }
        config.allow_cycles = env_var("MEMORY_ALLOW_CYCLES")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(config)
    }

    pub fn is_neo4j_configured(&self) -> bool {
        self.neo4j.password.is_some()
    }

    pub fn is_memgraph_configured(&self) -> bool {
        self.memgraph.uri.is_some()
    }

    /// Explicit connection config for the selected backend kind.
    pub fn backend_config(&self, kind: BackendKind) -> BackendConfig {
        match kind {
            BackendKind::Neo4j => BackendConfig {
                kind,
                path: None,
                uri: self.neo4j.uri.clone(),
                username: Some(self.neo4j.user.clone()),
                password: self.neo4j.password.clone(),
                database: self.neo4j.database.clone(),
            },
            BackendKind::Memgraph => BackendConfig {
                kind,
                path: None,
                uri: self.memgraph.uri.clone(),
                username: Some(self.memgraph.user.clone()),
                password: self.memgraph.password.clone(),
                database: None,
            },
            BackendKind::Cloud => BackendConfig {
                kind,
                path: None,
                uri: self.cloud.api_url.clone(),
                username: None,
                password: self.cloud.api_key.clone(),
                database: None,
            },
            _ => BackendConfig {
                kind,
                path: Some(self.sqlite_path.clone()),
                uri: None,
                username: None,
                password: None,
                database: None,
            },
        }
    }

    /// Effective configuration with secrets reduced to a flag.
    pub fn summary(&self) -> Value {
        json!({
            "backend": self.backend.as_str(),
            "sqlite": { "path": self.sqlite_path.display().to_string() },
            "neo4j": {
                "uri": self.neo4j.uri,
                "user": self.neo4j.user,
                "password_configured": self.neo4j.password.is_some(),
                "database": self.neo4j.database,
            },
            "memgraph": {
                "uri": self.memgraph.uri,
                "user": self.memgraph.user,
                "password_configured": self.memgraph.password.is_some(),
            },
            "cloud": {
                "api_url": self.cloud.api_url,
                "api_key_configured": self.cloud.api_key.is_some(),
                "timeout": self.cloud.timeout_secs,
            },
            "tool_profile": self.tool_profile.as_str(),
            "logging": { "level": self.log_level },
            "relationships": { "allow_cycles": self.allow_cycles },
        })
    }
}

// ============================================================================
// EXPLICIT BACKEND CONFIG
// ============================================================================

/// Connection details for one backend instance.
///
/// Embedded backends use `path`; remote graph backends use `uri`, `username`,
/// `password`; the cloud backend carries its API key in `password` and the
/// API URL in `uri`.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub path: Option<PathBuf>,
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl BackendConfig {
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: BackendKind::Sqlite,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Build from the environment for the currently selected backend.
    pub fn from_env() -> Result<Self> {
        let config = Config::from_env()?;
        let kind = match config.backend {
            BackendKind::Auto => BackendKind::Sqlite,
            kind => kind,
        };
        Ok(config.backend_config(kind))
    }

    /// Validation errors, empty when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match self.kind {
            BackendKind::Sqlite | BackendKind::Falkordblite | BackendKind::Ladybugdb
            | BackendKind::Turso => {
                if self.path.is_none() {
                    errors.push(format!("{} backend requires 'path'", self.kind));
                }
            }
            BackendKind::Neo4j | BackendKind::Memgraph | BackendKind::Falkordb => {
                if self.uri.is_none() {
                    errors.push(format!("{} backend requires 'uri'", self.kind));
                }
                if self.kind == BackendKind::Neo4j && self.password.is_none() {
                    errors.push("neo4j backend requires 'password'".to_string());
                }
            }
            BackendKind::Cloud => {
                if self.password.is_none() {
                    errors.push("cloud backend requires an API key".to_string());
                }
            }
            BackendKind::Auto => {
                errors.push("auto is a selection policy, not a concrete backend".to_string());
            }
        }
        errors
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!(BackendKind::parse("sqlite").unwrap(), BackendKind::Sqlite);
        assert_eq!(BackendKind::parse("NEO4J").unwrap(), BackendKind::Neo4j);
        assert_eq!(BackendKind::parse("falkordblite").unwrap(), BackendKind::Falkordblite);
        assert!(BackendKind::parse("postgres").is_err());
    }

    #[test]
    fn test_tool_profile_parsing_with_legacy_names() {
        assert_eq!(ToolProfile::parse("core").unwrap(), ToolProfile::Core);
        assert_eq!(ToolProfile::parse("lite").unwrap(), ToolProfile::Core);
        assert_eq!(ToolProfile::parse("extended").unwrap(), ToolProfile::Extended);
        assert_eq!(ToolProfile::parse("full").unwrap(), ToolProfile::Extended);
        assert!(ToolProfile::parse("everything").is_err());
    }

    #[test]
    fn test_backend_config_validation() {
        let sqlite = BackendConfig::sqlite("/tmp/test.db");
        assert!(sqlite.validate().is_empty());

        let missing_path = BackendConfig { kind: BackendKind::Sqlite, ..BackendConfig::default() };
        assert!(!missing_path.validate().is_empty());

        let neo4j = BackendConfig {
            kind: BackendKind::Neo4j,
            uri: Some("bolt://localhost:7687".to_string()),
            username: Some("neo4j".to_string()),
            password: Some("secret".to_string()),
            ..BackendConfig::default()
        };
        assert!(neo4j.validate().is_empty());

        let neo4j_no_password = BackendConfig {
            kind: BackendKind::Neo4j,
            uri: Some("bolt://localhost:7687".to_string()),
            ..BackendConfig::default()
        };
        assert_eq!(neo4j_no_password.validate().len(), 1);

        let auto = BackendConfig { kind: BackendKind::Auto, ..BackendConfig::default() };
        assert!(!auto.validate().is_empty());
    }

    #[test]
    fn test_summary_masks_secrets() {
        let mut config = Config::default();
        config.neo4j.password = Some("hunter2".to_string());
        config.cloud.api_key = Some("mg_live_key".to_string());

        let summary = config.summary().to_string();
        assert!(!summary.contains("hunter2"));
        assert!(!summary.contains("mg_live_key"));
        assert!(summary.contains("password_configured"));
    }
}
