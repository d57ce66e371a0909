//! Statistics sources.
//!
//! The engine never talks to a database itself. Whatever gathers row counts,
//! cardinalities and sizes hands them over through [`StatsProvider`].

use crate::error::ProviderError;
use crate::stats::StatsSnapshot;
use std::path::PathBuf;
use tracing::debug;

/// Supplies one consistent statistics snapshot per call.
pub trait StatsProvider: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    fn snapshot(&self) -> Result<StatsSnapshot, ProviderError>;
}

/// Reads a snapshot serialized as JSON: `{"gathered_at": ..., "tables": [...]}`.
#[derive(Debug, Clone)]
pub struct JsonFileStatsProvider {
    path: PathBuf,
    name: String,
}

impl JsonFileStatsProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("json:{}", path.display());
        Self { path, name }
    }
}

impl StatsProvider for JsonFileStatsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn snapshot(&self) -> Result<StatsSnapshot, ProviderError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| ProviderError::Io {
            path: self.path.clone(),
            source,
        })?;
        let snapshot: StatsSnapshot =
            serde_json::from_str(&content).map_err(|source| ProviderError::Malformed {
                origin: self.path.display().to_string(),
                source,
            })?;
        debug!(
            path = %self.path.display(),
            tables = snapshot.tables.len(),
            "Loaded statistics snapshot"
        );
        Ok(snapshot)
    }
}

/// Serves a snapshot already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatsProvider {
    snapshot: StatsSnapshot,
}

impl InMemoryStatsProvider {
    pub fn new(snapshot: StatsSnapshot) -> Self {
        Self { snapshot }
    }
}

impl StatsProvider for InMemoryStatsProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn snapshot(&self) -> Result<StatsSnapshot, ProviderError> {
        Ok(self.snapshot.clone())
    }
}
