//! Shard key scoring.
//!
//! Each column of a table is judged on three things:
//!
//! - **Eligibility**: boolean and constant columns cannot spread rows, so they
//!   are dropped outright instead of being scored low.
//! - **Cardinality band**: ratios inside the configured band score 1.0. Below
//!   the band the score falls linearly towards 0 (load concentrates on few
//!   shards); above it the score falls linearly towards `unique_key_score`
//!   (rows spread evenly but related rows scatter across nodes).
//! - **Null penalty**: hash partitioning puts every null on the same shard, so
//!   the banded score is scaled down by the null fraction.

use crate::error::{PolicyError, ValidationError};
use crate::policy::ThresholdPolicy;
use crate::stats::{ColumnStats, StatsRecord};
use serde::{Deserialize, Serialize};

/// Suitability of one column as a shard key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub column_name: String,
    /// `distinct_count / row_count`, in [0, 1]
    pub cardinality_ratio: f64,
    /// `null_count / row_count`, in [0, 1]
    pub null_penalty: f64,
    pub type_eligible: bool,
    /// Higher is better; always in [0, 1]
    pub composite_score: f64,
}

/// Scores candidate shard keys under a validated [`ThresholdPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct ShardKeyScorer<'a> {
    policy: &'a ThresholdPolicy,
}

impl<'a> ShardKeyScorer<'a> {
    pub fn new(policy: &'a ThresholdPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self { policy })
    }

    /// Eligible candidates of `record`, best first.
    ///
    /// Ties keep column declaration order. An empty result is a normal outcome.
    pub fn score(&self, record: &StatsRecord) -> Result<Vec<CandidateScore>, ValidationError> {
        record.validate()?;
        if record.is_empty() {
            return Ok(Vec::new());
        }

        let rows = record.rows();
        let mut candidates = Vec::new();
        for column in &record.columns {
            if !Self::is_eligible(column, rows) {
                continue;
            }
            candidates.push(self.score_column(&record.table_id, column, rows)?);
        }

        // sort_by is stable, which preserves declaration order on ties
        candidates.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
        Ok(candidates)
    }

    /// Whether `column` can be considered as a shard key at all.
    pub fn is_eligible(column: &ColumnStats, row_count: u64) -> bool {
        row_count > 0 && column.data_type.can_distribute() && column.distinct_count > 1
    }

    fn score_column(
        &self,
        table_id: &str,
        column: &ColumnStats,
        rows: u64,
    ) -> Result<CandidateScore, ValidationError> {
        let cardinality_ratio = ratio(table_id, column.distinct_count, rows, "cardinality ratio")?;
        let null_penalty = ratio(table_id, column.null_count, rows, "null ratio")?;
        let composite_score = self.band_score(cardinality_ratio) * (1.0 - null_penalty);

        Ok(CandidateScore {
            column_name: column.name.clone(),
            cardinality_ratio,
            null_penalty,
            type_eligible: true,
            composite_score,
        })
    }

    /// Score of a cardinality ratio relative to the policy's sweet band.
    pub fn band_score(&self, ratio: f64) -> f64 {
        let lower = self.policy.cardinality_band_lower;
        let upper = self.policy.cardinality_band_upper;

        if ratio < lower {
            (ratio / lower).clamp(0.0, 1.0)
        } else if ratio <= upper {
            1.0
        } else {
            let overshoot = (ratio - upper) / (1.0 - upper);
            1.0 - (1.0 - self.policy.unique_key_score) * overshoot.clamp(0.0, 1.0)
        }
    }
}

fn ratio(table_id: &str, count: i64, rows: u64, what: &'static str) -> Result<f64, ValidationError> {
    if rows == 0 {
        return Err(ValidationError::DivisionByZero {
            table_id: table_id.to_string(),
            what,
        });
    }
    Ok((count.max(0) as f64 / rows as f64).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ColumnDataType;

    fn record(columns: Vec<ColumnStats>) -> StatsRecord {
        StatsRecord::new("events", 1_000_000, 120).with_columns(columns)
    }

    #[test]
    fn test_band_score_shape() {
        let policy = ThresholdPolicy::default();
        let scorer = ShardKeyScorer::new(&policy).unwrap();

        assert_eq!(scorer.band_score(0.0), 0.0);
        assert!((scorer.band_score(0.005) - 0.5).abs() < 1e-9);
        assert_eq!(scorer.band_score(0.01), 1.0);
        assert_eq!(scorer.band_score(0.3), 1.0);
        assert_eq!(scorer.band_score(0.5), 1.0);
        assert!((scorer.band_score(1.0) - policy.unique_key_score).abs() < 1e-9);

        let mid = scorer.band_score(0.75);
        assert!(mid < 1.0 && mid > policy.unique_key_score);
    }

    #[test]
    fn test_in_band_column_beats_unique_and_sparse_columns() {
        let policy = ThresholdPolicy::default();
        let scored = ShardKeyScorer::new(&policy).unwrap()
            .score(&record(vec![
                ColumnStats::new("event_id", ColumnDataType::Numeric, 1_000_000),
                ColumnStats::new("country", ColumnDataType::String, 200),
                ColumnStats::new("customer_id", ColumnDataType::Numeric, 100_000),
            ]))
            .unwrap();

        let names: Vec<&str> = scored.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, vec!["customer_id", "event_id", "country"]);
        assert!((scored[0].cardinality_ratio - 0.1).abs() < 1e-9);
        assert!(scored.iter().all(|c| c.type_eligible));
    }

    #[test]
    fn test_null_penalty_scales_score() {
        let policy = ThresholdPolicy::default();
        let scored = ShardKeyScorer::new(&policy).unwrap()
            .score(&record(vec![
                ColumnStats::new("session_id", ColumnDataType::String, 100_000).with_nulls(400_000),
                ColumnStats::new("user_id", ColumnDataType::Numeric, 100_000),
            ]))
            .unwrap();

        assert_eq!(scored[0].column_name, "user_id");
        assert_eq!(scored[1].column_name, "session_id");
        assert!((scored[1].null_penalty - 0.4).abs() < 1e-9);
        assert!((scored[1].composite_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_ineligible_columns_are_excluded() {
        let policy = ThresholdPolicy::default();
        let scored = ShardKeyScorer::new(&policy).unwrap()
            .score(&record(vec![
                ColumnStats::new("is_deleted", ColumnDataType::Boolean, 2),
                ColumnStats::new("tenant", ColumnDataType::String, 1),
                ColumnStats::new("empty", ColumnDataType::String, 0).with_nulls(1_000_000),
            ]))
            .unwrap();
        assert!(scored.is_empty());
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let policy = ThresholdPolicy::default();
        let scored = ShardKeyScorer::new(&policy).unwrap()
            .score(&record(vec![
                ColumnStats::new("b_key", ColumnDataType::Numeric, 50_000),
                ColumnStats::new("a_key", ColumnDataType::Numeric, 60_000),
                ColumnStats::new("c_key", ColumnDataType::Date, 70_000),
            ]))
            .unwrap();

        let names: Vec<&str> = scored.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, vec!["b_key", "a_key", "c_key"]);
    }

    #[test]
    fn test_empty_table_has_no_candidates() {
        let policy = ThresholdPolicy::default();
        let empty = StatsRecord::new("staging", 0, 0)
            .with_column(ColumnStats::new("id", ColumnDataType::Numeric, 0));
        assert!(ShardKeyScorer::new(&policy).unwrap().score(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_record_is_rejected() {
        let policy = ThresholdPolicy::default();
        let bad = record(vec![ColumnStats::new("id", ColumnDataType::Numeric, 2_000_000)]);
        assert!(ShardKeyScorer::new(&policy).unwrap().score(&bad).is_err());
    }

    #[test]
    fn test_band_reaching_one_scores_unique_keys_fully() {
        let policy = ThresholdPolicy {
            cardinality_band_upper: 1.0,
            ..Default::default()
        };
        let scorer = ShardKeyScorer::new(&policy).unwrap();
        assert_eq!(scorer.band_score(1.0), 1.0);
        assert_eq!(scorer.band_score(0.9), 1.0);
    }

    #[test]
    fn test_invalid_policy_rejected_at_construction() {
        let policy = ThresholdPolicy {
            cardinality_band_lower: 0.6,
            cardinality_band_upper: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            ShardKeyScorer::new(&policy),
            Err(PolicyError::Invalid(_))
        ));
    }

    #[test]
    fn test_ratio_guards_division_by_zero() {
        let err = ratio("t", 5, 0, "cardinality ratio").unwrap_err();
        assert!(matches!(err, ValidationError::DivisionByZero { .. }));
    }
}
