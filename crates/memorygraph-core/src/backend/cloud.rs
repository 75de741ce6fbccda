//! Cloud REST adapter.
//!
//! Hosted variant of the backend contract over HTTPS. Every request carries
//! the account's bearer key, honours a per-request timeout (default 30 s),
//! retries transient failures with exponential back-off (1, 2, 4 s), and is
//! wrapped by a circuit breaker: five consecutive failures open the circuit
//! for 60 s, during which calls fail fast with `CircuitOpen`; the first call
//! after the window runs half-open and a single success closes the circuit.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::backend::{GraphBackend, HealthStatistics, HealthStatus, RELATED_MEMORIES_LIMIT};
use crate::error::{MemoryGraphError, Result};
use crate::model::{
    Memory, MemoryStatistics, PaginatedResult, Relationship, RelationshipProperties,
    RelationshipType, SearchQuery,
};

/// Default cloud API endpoint.
pub const DEFAULT_API_URL: &str = "https://graph-api.memorygraph.dev";
/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_BASE: Duration = Duration::from_secs(1);

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Three-state circuit breaker around a remote backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    /// Whether a call may proceed. Transitions open -> half-open once the
    /// recovery window has elapsed.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().expect("circuit breaker lock");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock");
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock");
        match inner.state {
            CircuitState::HalfOpen => {
                // Failed during recovery: reopen immediately
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            _ => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        "Circuit breaker opened after {} consecutive failures. \
                         Will retry in {:?}",
                        inner.consecutive_failures, self.recovery_timeout
                    );
                }
            }
        }
    }

    fn is_open(&self) -> bool {
        self.inner.lock().expect("circuit breaker lock").state == CircuitState::Open
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

// ============================================================================
// BACKEND
// ============================================================================

/// REST adapter for the hosted graph service.
pub struct CloudBackend {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
    breaker: CircuitBreaker,
    connected: std::sync::atomic::AtomicBool,
}

impl CloudBackend {
    pub fn new(api_key: &str, api_url: Option<&str>, timeout_secs: Option<u64>) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(MemoryGraphError::auth_failure(
                "Cloud backend requires an API key",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)))
            .build()
            .map_err(|e| MemoryGraphError::backend_unavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            api_url: api_url
                .unwrap_or(DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            client,
            breaker: CircuitBreaker::default(),
            connected: std::sync::atomic::AtomicBool::new(false),
        })
    }

    async fn request(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Result<Value> {
        let mut attempt: u32 = 0;
        loop {
            if !self.breaker.can_execute() {
                return Err(MemoryGraphError::circuit_open(format!(
                    "Cloud API circuit breaker is open. Will retry in {:?}.",
                    self.breaker.recovery_timeout()
                )));
            }

            let url = format!("{}{}", self.api_url, path);
            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.api_key)
                .header("accept", "application/json");
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    // Timeouts and connect errors are transient
                    self.breaker.record_failure();
                    if attempt < MAX_RETRIES {
                        let backoff = RETRY_BACKOFF_BASE * 2u32.pow(attempt);
                        warn!(
                            "Cloud request failed ({e}), retrying in {backoff:?} \
                             (attempt {}/{MAX_RETRIES})",
                            attempt + 1
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(MemoryGraphError::backend_unavailable(format!(
                        "Cloud request failed: {e}"
                    )));
                }
            };

            let status = response.status();
            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(MemoryGraphError::auth_failure(
                        "Cloud API rejected the API key",
                    ));
                }
                StatusCode::PAYMENT_REQUIRED => {
                    return Err(MemoryGraphError::usage_limit(
                        "Cloud API usage limit exceeded for this account",
                    ));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok());
                    return Err(MemoryGraphError::rate_limit(
                        "Cloud API rate limit exceeded",
                        retry_after,
                    ));
                }
                StatusCode::NOT_FOUND => {
                    return Err(MemoryGraphError::memory_not_found(path));
                }
                status if status.is_server_error() => {
                    self.breaker.record_failure();
                    if attempt < MAX_RETRIES {
                        let backoff = RETRY_BACKOFF_BASE * 2u32.pow(attempt);
                        warn!(
                            "Cloud API returned {status}, retrying in {backoff:?} \
                             (attempt {}/{MAX_RETRIES})",
                            attempt + 1
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(MemoryGraphError::backend_unavailable(format!(
                        "Cloud API error: {status}"
                    )));
                }
                status if !status.is_success() => {
                    return Err(MemoryGraphError::backend_unavailable(format!(
                        "Cloud API error: {status}"
                    )));
                }
                _ => {}
            }

            self.breaker.record_success();
            if status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return response
                .json::<Value>()
                .await
                .map_err(|e| MemoryGraphError::backend_unavailable(format!("Invalid response: {e}")));
        }
    }

    fn parse_memory(value: &Value) -> Option<Memory> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[async_trait]
impl GraphBackend for CloudBackend {
    async fn connect(&self) -> Result<bool> {
        self.request(reqwest::Method::GET, "/health", None).await?;
        self.connected.store(true, std::sync::atomic::Ordering::Relaxed);
        info!("Connected to MemoryGraph Cloud at {}", self.api_url);
        Ok(true)
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    async fn initialize_schema(&self) -> Result<()> {
        // Schema is managed by the cloud service
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let mut status = HealthStatus {
            connected: self.connected.load(std::sync::atomic::Ordering::Relaxed),
            backend_name: "cloud".to_string(),
            ..HealthStatus::default()
        };
        match self.request(reqwest::Method::GET, "/health", None).await {
            Ok(body) => {
                status.connected = true;
                status.version = body
                    .get("version")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if let Some(count) = body
                    .get("statistics")
                    .and_then(|s| s.get("memory_count"))
                    .and_then(Value::as_u64)
                {
                    status.statistics = Some(HealthStatistics {
                        memory_count: count,
                        relationship_count: body
                            .get("statistics")
                            .and_then(|s| s.get("relationship_count"))
                            .and_then(Value::as_u64),
                    });
                }
            }
            Err(e) => {
                status.connected = false;
                status.warning = Some(e.to_string());
            }
        }
        Ok(status)
    }

    async fn execute_query(
        &self,
        _query: &str,
        _parameters: Value,
        _write: bool,
    ) -> Result<Vec<Map<String, Value>>> {
        Err(MemoryGraphError::unsupported_query(
            "Cloud backend does not accept free-form queries",
        ))
    }

    async fn store_memory(&self, memory: &Memory) -> Result<String> {
        let mut memory = memory.clone();
        let memory_id = memory.ensure_id();
        let body = self
            .request(reqwest::Method::POST, "/memories", Some(serde_json::to_value(&memory)?))
            .await?;
        Ok(body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(memory_id))
    }

    async fn get_memory(&self, memory_id: &str) -> Result<Option<Memory>> {
        match self
            .request(reqwest::Method::GET, &format!("/memories/{memory_id}"), None)
            .await
        {
            Ok(body) => Ok(Self::parse_memory(&body)),
            Err(MemoryGraphError::MemoryNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_memory(&self, memory: &Memory) -> Result<bool> {
        let memory_id = memory
            .id
            .as_deref()
            .ok_or_else(|| MemoryGraphError::validation("Memory must have an ID to update"))?;
        match self
            .request(
                reqwest::Method::PUT,
                &format!("/memories/{memory_id}"),
                Some(serde_json::to_value(memory)?),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(MemoryGraphError::MemoryNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<bool> {
        match self
            .request(reqwest::Method::DELETE, &format!("/memories/{memory_id}"), None)
            .await
        {
            Ok(_) => Ok(true),
            Err(MemoryGraphError::MemoryNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_relationship(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        relationship_type: RelationshipType,
        properties: &RelationshipProperties,
    ) -> Result<String> {
        if from_memory_id == to_memory_id {
            return Err(MemoryGraphError::relationship(
                "Cannot create relationship from memory to itself",
            ));
        }
        let mut properties = properties.clone();
        properties.clamp_scores();
        let body = self
            .request(
                reqwest::Method::POST,
                "/relationships",
                Some(json!({
                    "from_memory_id": from_memory_id,
                    "to_memory_id": to_memory_id,
                    "type": relationship_type.as_str(),
                    "properties": properties,
                })),
            )
            .await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                MemoryGraphError::relationship("Cloud API did not return a relationship id")
            })
    }

    async fn get_related_memories(
        &self,
        memory_id: &str,
        relationship_types: Option<&[RelationshipType]>,
        max_depth: u32,
    ) -> Result<Vec<(Memory, Relationship)>> {
        let mut path = format!(
            "/memories/{memory_id}/related?max_depth={max_depth}&limit={RELATED_MEMORIES_LIMIT}"
        );
        if let Some(types) = relationship_types.filter(|t| !t.is_empty()) {
            let joined: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
            path.push_str(&format!("&types={}", joined.join(",")));
        }
        let body = self.request(reqwest::Method::GET, &path, None).await?;

        let mut related = Vec::new();
        for entry in body.get("related").and_then(Value::as_array).into_iter().flatten() {
            let memory = entry.get("memory").and_then(Self::parse_memory);
            let relationship: Option<Relationship> = entry
                .get("relationship")
                .and_then(|r| serde_json::from_value(r.clone()).ok());
            if let (Some(memory), Some(relationship)) = (memory, relationship) {
                related.push((memory, relationship));
            }
        }
        related.truncate(RELATED_MEMORIES_LIMIT);
        Ok(related)
    }

    async fn search_memories(&self, query: &SearchQuery) -> Result<Vec<Memory>> {
        query.validate()?;
        let body = self
            .request(
                reqwest::Method::POST,
                "/memories/search",
                Some(serde_json::to_value(query)?),
            )
            .await?;
        Ok(body
            .get("memories")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Self::parse_memory)
            .collect())
    }

    async fn search_memories_paginated(&self, query: &SearchQuery) -> Result<PaginatedResult> {
        query.validate()?;
        let body = self
            .request(
                reqwest::Method::POST,
                "/memories/search",
                Some(serde_json::to_value(query)?),
            )
            .await?;
        let results: Vec<Memory> = body
            .get("memories")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Self::parse_memory)
            .collect();
        let total_count = body
            .get("total_count")
            .and_then(Value::as_u64)
            .unwrap_or(results.len() as u64) as usize;
        Ok(PaginatedResult::new(results, total_count, query.limit, query.offset))
    }

    async fn update_relationship_properties(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        relationship_type: RelationshipType,
        properties: &RelationshipProperties,
    ) -> Result<bool> {
        let mut properties = properties.clone();
        properties.clamp_scores();
        match self
            .request(
                reqwest::Method::PUT,
                "/relationships",
                Some(json!({
                    "from_memory_id": from_memory_id,
                    "to_memory_id": to_memory_id,
                    "type": relationship_type.as_str(),
                    "properties": properties,
                })),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(MemoryGraphError::MemoryNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_memory_statistics(&self) -> Result<MemoryStatistics> {
        let body = self
            .request(reqwest::Method::GET, "/graphs/statistics", None)
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    fn backend_name(&self) -> &'static str {
        "cloud"
    }

    fn supports_fulltext_search(&self) -> bool {
        true
    }

    fn supports_transactions(&self) -> bool {
        false
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_opens_after_threshold() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));
        for _ in 0..4 {
            breaker.record_failure();
            assert!(breaker.can_execute(), "circuit must stay closed below threshold");
        }
        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(!breaker.can_execute(), "open circuit fails fast");
    }

    #[test]
    fn test_circuit_half_open_after_recovery_window() {
        let breaker = CircuitBreaker::new(2, Duration::from_millis(20));
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.can_execute());

        std::thread::sleep(Duration::from_millis(30));
        // First call after the window is allowed (half-open)
        assert!(breaker.can_execute());
        // A single success closes the circuit
        breaker.record_success();
        assert!(breaker.can_execute());
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure();
        assert!(!breaker.can_execute());

        std::thread::sleep(Duration::from_millis(15));
        assert!(breaker.can_execute());
        breaker.record_failure();
        assert!(!breaker.can_execute(), "failed probe reopens the circuit");
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.can_execute(), "success resets the consecutive counter");
    }

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            CloudBackend::new("", None, None),
            Err(MemoryGraphError::AuthFailure { .. })
        ));
        assert!(CloudBackend::new("mg_test_key", None, None).is_ok());
    }

    #[tokio::test]
    async fn test_circuit_open_fails_fast_without_network() {
        let backend = CloudBackend::new("mg_test_key", Some("http://127.0.0.1:1"), None).unwrap();
        // Force the breaker open
        for _ in 0..5 {
            backend.breaker.record_failure();
        }
        let err = backend.get_memory("m1").await.unwrap_err();
        assert!(matches!(err, MemoryGraphError::CircuitOpen { .. }));
    }
}
