//! Per-table recommendations and the ranked report.
//!
//! Scoring is a data-parallel map over the input records; the only
//! synchronisation point is the final sort, which needs every per-table
//! result. Records that fail validation are collected next to the
//! recommendations and never abort the run.

use crate::advisor::{ShardCountAdvisor, ShardCountRecommendation};
use crate::error::{PolicyError, ValidationError};
use crate::policy::ThresholdPolicy;
use crate::scorer::{CandidateScore, ShardKeyScorer};
use crate::stats::{StatsRecord, StatsSnapshot};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// How urgently a table should be sharded.
///
/// Variants are declared from least to most urgent so that `Ord` ranks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    NotRecommended,
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::NotRecommended => "not_recommended",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What applying the recommendation would change about the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardAction {
    /// Leave the table as it is
    NoChange,
    /// Shard a currently unsharded table
    Shard,
    /// Change the shard count (or rebalance) of an already-sharded table
    Reshard,
}

/// Recommendation for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecommendation {
    pub table_id: String,
    pub row_count: u64,
    /// Best candidates first, at most `top_n`
    pub candidates: Vec<CandidateScore>,
    pub shard_count: ShardCountRecommendation,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_shards: Option<u32>,
    pub action: ShardAction,
}

impl TableRecommendation {
    pub fn best_candidate(&self) -> Option<&CandidateScore> {
        self.candidates.first()
    }
}

/// A record the engine refused to score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableFailure {
    pub table_id: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: ValidationError,
}

fn serialize_display<S: Serializer>(value: &ValidationError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Output of one run: ranked recommendations plus rejected records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationReport {
    /// Echoed from the input snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gathered_at: Option<DateTime<Utc>>,
    /// Highest priority first, then largest tables first
    pub recommendations: Vec<TableRecommendation>,
    /// In input order
    pub failures: Vec<TableFailure>,
}

impl RecommendationReport {
    pub fn count(&self, priority: Priority) -> usize {
        self.recommendations
            .iter()
            .filter(|r| r.priority == priority)
            .count()
    }

    pub fn get(&self, table_id: &str) -> Option<&TableRecommendation> {
        self.recommendations.iter().find(|r| r.table_id == table_id)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Combines scorer and advisor output into the ranked report.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationAggregator<'a> {
    policy: &'a ThresholdPolicy,
    scorer: ShardKeyScorer<'a>,
    advisor: ShardCountAdvisor<'a>,
}

impl<'a> RecommendationAggregator<'a> {
    /// Fails when `policy` does not pass [`ThresholdPolicy::validate`].
    pub fn new(policy: &'a ThresholdPolicy) -> Result<Self, PolicyError> {
        Ok(Self {
            policy,
            scorer: ShardKeyScorer::new(policy)?,
            advisor: ShardCountAdvisor::new(policy)?,
        })
    }

    pub fn aggregate_snapshot(&self, snapshot: &StatsSnapshot) -> RecommendationReport {
        let mut report = self.aggregate(&snapshot.tables);
        report.gathered_at = snapshot.gathered_at;
        report
    }

    /// Score every record and rank the results.
    pub fn aggregate(&self, records: &[StatsRecord]) -> RecommendationReport {
        let mut seen = HashSet::with_capacity(records.len());
        let duplicate: Vec<bool> = records
            .iter()
            .map(|r| !seen.insert(r.table_id.as_str()))
            .collect();

        let results: Vec<Result<TableRecommendation, ValidationError>> = records
            .par_iter()
            .zip(duplicate.par_iter())
            .map(|(record, &is_duplicate)| {
                if is_duplicate {
                    Err(ValidationError::DuplicateTable {
                        table_id: record.table_id.clone(),
                    })
                } else {
                    self.recommend_table(record)
                }
            })
            .collect();

        let mut recommendations = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(rec) => recommendations.push(rec),
                Err(error) => {
                    warn!(table = error.table_id(), "Skipping table: {}", error);
                    failures.push(TableFailure {
                        table_id: error.table_id().to_string(),
                        error,
                    });
                }
            }
        }

        recommendations.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.row_count.cmp(&a.row_count))
                .then_with(|| a.table_id.cmp(&b.table_id))
        });

        let report = RecommendationReport {
            gathered_at: None,
            recommendations,
            failures,
        };
        info!(
            tables = records.len(),
            high = report.count(Priority::High),
            medium = report.count(Priority::Medium),
            low = report.count(Priority::Low),
            not_recommended = report.count(Priority::NotRecommended),
            failures = report.failures.len(),
            "Shard recommendations computed"
        );
        report
    }

    /// Recommendation for a single table, independent of every other table.
    pub fn recommend_table(&self, record: &StatsRecord) -> Result<TableRecommendation, ValidationError> {
        let mut candidates = self.scorer.score(record)?;
        let row_count = record.rows();
        let shard_count = self.advisor.recommend(row_count, record.row_width());
        let priority = self.classify(row_count, &candidates);
        candidates.truncate(self.policy.top_n);
        let action = self.decide_action(record, &shard_count, priority);

        debug!(
            table = %record.table_id,
            rows = row_count,
            candidates = candidates.len(),
            shards = shard_count.recommended_shards,
            basis = %shard_count.basis,
            priority = %priority,
            "Scored table"
        );

        Ok(TableRecommendation {
            table_id: record.table_id.clone(),
            row_count,
            candidates,
            shard_count,
            priority,
            current_shards: record.current_shard_count(),
            action,
        })
    }

    /// Priority of a table with `row_count` rows and the given eligible candidates.
    pub fn classify(&self, row_count: u64, candidates: &[CandidateScore]) -> Priority {
        let policy = self.policy;
        if candidates.is_empty() || row_count < policy.min_rows_before_sharding {
            return Priority::NotRecommended;
        }

        let strong = candidates
            .iter()
            .any(|c| c.composite_score > policy.strong_candidate_score);

        if row_count > policy.large_table_rows && strong {
            Priority::High
        } else if row_count < policy.moderate_table_rows && !strong {
            Priority::Low
        } else {
            Priority::Medium
        }
    }

    fn decide_action(
        &self,
        record: &StatsRecord,
        shard_count: &ShardCountRecommendation,
        priority: Priority,
    ) -> ShardAction {
        if priority == Priority::NotRecommended {
            return ShardAction::NoChange;
        }

        let current = record.current_shard_count().unwrap_or(1);
        let recommended = shard_count.recommended_shards;
        if current == 1 {
            return if recommended > 1 {
                ShardAction::Shard
            } else {
                ShardAction::NoChange
            };
        }
        if current != recommended || self.skew_exceeded(record, current) {
            ShardAction::Reshard
        } else {
            ShardAction::NoChange
        }
    }

    fn skew_exceeded(&self, record: &StatsRecord, current: u32) -> bool {
        let Some(row_skew) = record.skew_rows() else {
            return false;
        };
        let mean_rows_per_shard = record.rows() as f64 / current as f64;
        if mean_rows_per_shard <= 0.0 {
            return false;
        }
        row_skew as f64 / mean_rows_per_shard > self.policy.skew_tolerance
    }
}
