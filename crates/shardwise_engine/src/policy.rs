//! Tunable thresholds consumed by the scorer, the advisor and the aggregator.
//!
//! A [`ThresholdPolicy`] is an immutable value passed into every component;
//! there is no process-wide configuration. Defaults follow the published
//! guidance for the columnar engine: tables become sharding candidates past
//! 55M rows and aim for roughly 20M rows per shard.

use crate::error::PolicyError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shape of the cluster the shards will be spread over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterShape {
    /// Number of nodes serving the cluster
    pub nodes: u32,
    /// CPUs available on each node; the cluster never gets more shards than CPUs
    #[serde(default = "default_cpu_per_node")]
    pub cpu_per_node: u32,
    /// Round shard counts up to a multiple of `nodes`
    #[serde(default)]
    pub align_to_nodes: bool,
}

impl ClusterShape {
    pub fn new(nodes: u32) -> Self {
        Self {
            nodes,
            cpu_per_node: default_cpu_per_node(),
            align_to_nodes: true,
        }
    }

    /// Total CPUs across the cluster.
    pub fn total_cpus(&self) -> u64 {
        self.nodes as u64 * self.cpu_per_node as u64
    }
}

/// Thresholds for shard recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    /// Tables with fewer rows are never worth sharding
    #[serde(default = "default_min_rows_before_sharding")]
    pub min_rows_before_sharding: u64,

    /// Ideal number of rows held by one shard
    #[serde(default = "default_target_rows_per_shard")]
    pub target_rows_per_shard: u64,

    /// Ideal number of bytes held by one shard
    #[serde(default = "default_target_bytes_per_shard")]
    pub target_bytes_per_shard: u64,

    /// Lowest shard count ever recommended
    #[serde(default = "default_minimum_shard_floor")]
    pub minimum_shard_floor: u32,

    /// Hard cap on recommended shards
    #[serde(default = "default_max_shard_count")]
    pub max_shard_count: u32,

    /// Row count above which a table counts as large
    #[serde(default = "default_large_table_rows")]
    pub large_table_rows: u64,

    /// Below this row count, a table without a strong candidate is low priority
    #[serde(default = "default_moderate_table_rows")]
    pub moderate_table_rows: u64,

    /// Lower bound of the preferred cardinality ratio band
    #[serde(default = "default_cardinality_band_lower")]
    pub cardinality_band_lower: f64,

    /// Upper bound of the preferred cardinality ratio band
    #[serde(default = "default_cardinality_band_upper")]
    pub cardinality_band_upper: f64,

    /// Band score of a fully unique column (cardinality ratio 1.0)
    #[serde(default = "default_unique_key_score")]
    pub unique_key_score: f64,

    /// Composite score a candidate must exceed to count as strong
    #[serde(default = "default_strong_candidate_score")]
    pub strong_candidate_score: f64,

    /// Tolerated relative row skew on an already-sharded table
    #[serde(default = "default_skew_tolerance")]
    pub skew_tolerance: f64,

    /// Candidates kept per table
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterShape>,
}

fn default_min_rows_before_sharding() -> u64 {
    55_000_000
}

fn default_target_rows_per_shard() -> u64 {
    20_000_000
}

fn default_target_bytes_per_shard() -> u64 {
    8 * 1024 * 1024 * 1024
}

fn default_minimum_shard_floor() -> u32 {
    1
}

fn default_max_shard_count() -> u32 {
    256
}

fn default_large_table_rows() -> u64 {
    500_000_000
}

fn default_moderate_table_rows() -> u64 {
    110_000_000
}

fn default_cardinality_band_lower() -> f64 {
    0.01
}

fn default_cardinality_band_upper() -> f64 {
    0.5
}

fn default_unique_key_score() -> f64 {
    0.6
}

fn default_strong_candidate_score() -> f64 {
    0.7
}

fn default_skew_tolerance() -> f64 {
    0.25
}

fn default_top_n() -> usize {
    3
}

fn default_cpu_per_node() -> u32 {
    56
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            min_rows_before_sharding: default_min_rows_before_sharding(),
            target_rows_per_shard: default_target_rows_per_shard(),
            target_bytes_per_shard: default_target_bytes_per_shard(),
            minimum_shard_floor: default_minimum_shard_floor(),
            max_shard_count: default_max_shard_count(),
            large_table_rows: default_large_table_rows(),
            moderate_table_rows: default_moderate_table_rows(),
            cardinality_band_lower: default_cardinality_band_lower(),
            cardinality_band_upper: default_cardinality_band_upper(),
            unique_key_score: default_unique_key_score(),
            strong_candidate_score: default_strong_candidate_score(),
            skew_tolerance: default_skew_tolerance(),
            top_n: default_top_n(),
            cluster: None,
        }
    }
}

impl ThresholdPolicy {
    /// Load a policy from a TOML file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Save the policy to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), PolicyError> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse and validate a policy from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, PolicyError> {
        let policy: ThresholdPolicy = toml::from_str(content)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn to_toml_string(&self) -> Result<String, PolicyError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_cluster(mut self, cluster: ClusterShape) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Highest shard count the advisor may return.
    ///
    /// `max_shard_count`, further limited by the cluster's total CPUs when a
    /// cluster shape is configured.
    pub fn shard_cap(&self) -> u32 {
        let cap = self.max_shard_count.max(1);
        match &self.cluster {
            Some(cluster) => {
                let cpus = u32::try_from(cluster.total_cpus()).unwrap_or(u32::MAX);
                cap.min(cpus.max(1))
            }
            None => cap,
        }
    }

    /// Reject policies whose thresholds contradict each other.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let invalid = |msg: String| Err(PolicyError::Invalid(msg));

        if self.target_rows_per_shard == 0 {
            return invalid("target_rows_per_shard must be positive".to_string());
        }
        if self.target_bytes_per_shard == 0 {
            return invalid("target_bytes_per_shard must be positive".to_string());
        }
        if self.max_shard_count == 0 {
            return invalid("max_shard_count must be at least 1".to_string());
        }
        if self.minimum_shard_floor == 0 || self.minimum_shard_floor > self.max_shard_count {
            return invalid(format!(
                "minimum_shard_floor must be in 1..={}, got {}",
                self.max_shard_count, self.minimum_shard_floor
            ));
        }
        if !(self.cardinality_band_lower > 0.0
            && self.cardinality_band_lower < self.cardinality_band_upper
            && self.cardinality_band_upper <= 1.0)
        {
            return invalid(format!(
                "cardinality band must satisfy 0 < lower < upper <= 1, got [{}, {}]",
                self.cardinality_band_lower, self.cardinality_band_upper
            ));
        }
        if self.moderate_table_rows < self.min_rows_before_sharding
            || self.moderate_table_rows > self.large_table_rows
        {
            return invalid(format!(
                "moderate_table_rows ({}) must lie between min_rows_before_sharding ({}) and large_table_rows ({})",
                self.moderate_table_rows, self.min_rows_before_sharding, self.large_table_rows
            ));
        }
        for (name, value) in [
            ("unique_key_score", self.unique_key_score),
            ("strong_candidate_score", self.strong_candidate_score),
            ("skew_tolerance", self.skew_tolerance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.top_n == 0 {
            return invalid("top_n must be at least 1".to_string());
        }
        if let Some(cluster) = &self.cluster {
            if cluster.nodes == 0 {
                return invalid("cluster.nodes must be at least 1".to_string());
            }
            if cluster.cpu_per_node == 0 {
                return invalid("cluster.cpu_per_node must be at least 1".to_string());
            }
            if (self.minimum_shard_floor as u64) > cluster.total_cpus() {
                return invalid(format!(
                    "minimum_shard_floor ({}) exceeds the cluster's {} CPUs",
                    self.minimum_shard_floor,
                    cluster.total_cpus()
                ));
            }
        }
        Ok(())
    }
}
