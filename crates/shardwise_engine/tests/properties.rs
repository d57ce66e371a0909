//! Property tests for the recommendation engine.
//!
//! Shard counts scale monotonically and respect the floor and the cap for any
//! `u64` inputs; constant columns never become candidates; reports do not
//! depend on input order.

use proptest::prelude::*;
use shardwise_engine::{
    ClusterShape, ColumnDataType, ColumnStats, RecommendationAggregator, ShardBasis,
    ShardCountAdvisor, ShardKeyScorer, StatsRecord, ThresholdPolicy,
};

fn test_policy() -> ThresholdPolicy {
    ThresholdPolicy {
        min_rows_before_sharding: 1_000,
        target_rows_per_shard: 1_000_000,
        target_bytes_per_shard: 500_000_000_000,
        moderate_table_rows: 100_000,
        large_table_rows: 10_000_000,
        max_shard_count: 64,
        ..Default::default()
    }
}

/// Policies that exercise every advisor branch: plain, node-aligned, byte-heavy
/// with a floor, and a small cluster whose CPUs cap the count.
fn policies() -> Vec<ThresholdPolicy> {
    let mut tiny_cluster = ClusterShape::new(3);
    tiny_cluster.cpu_per_node = 4;
    vec![
        test_policy(),
        test_policy().with_cluster(ClusterShape::new(6)),
        ThresholdPolicy {
            target_bytes_per_shard: 100_000_000,
            minimum_shard_floor: 3,
            ..test_policy()
        },
        test_policy().with_cluster(tiny_cluster),
    ]
}

fn policy_strategy() -> impl Strategy<Value = ThresholdPolicy> {
    prop::sample::select(policies())
}

/// A table with `rows` rows and one column per distinct count.
fn table(table_id: &str, rows: i64, distinct_counts: &[i64]) -> StatsRecord {
    let columns = distinct_counts
        .iter()
        .enumerate()
        .map(|(i, &distinct)| ColumnStats::new(format!("c{}", i), ColumnDataType::Numeric, distinct))
        .collect();
    StatsRecord::new(table_id, rows, 100).with_columns(columns)
}

fn table_strategy() -> impl Strategy<Value = (i64, Vec<i64>)> {
    (0i64..20_000_000_000).prop_flat_map(|rows| {
        (
            Just(rows),
            prop::collection::vec(0..=rows, 1..5),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    /// More rows never means fewer shards
    #[test]
    fn test_monotonic_row_count_scaling(
        policy in policy_strategy(),
        a in any::<u64>(),
        b in any::<u64>(),
        bytes in any::<u64>(),
    ) {
        let advisor = ShardCountAdvisor::new(&policy).unwrap();
        let (fewer, more) = (a.min(b), a.max(b));
        let small = advisor.recommend(fewer, bytes).recommended_shards;
        let large = advisor.recommend(more, bytes).recommended_shards;
        prop_assert!(
            large >= small,
            "{} rows gave {} shards but {} rows gave {}",
            more,
            large,
            fewer,
            small
        );
    }

    /// Below the sharding threshold the answer is one shard on the floor basis
    #[test]
    fn test_floor_enforcement(
        floor in 1u32..=64,
        rows in 0u64..1_000,
        bytes in any::<u64>(),
    ) {
        let policy = ThresholdPolicy {
            minimum_shard_floor: floor,
            ..test_policy()
        };
        let rec = ShardCountAdvisor::new(&policy).unwrap().recommend(rows, bytes);
        prop_assert_eq!(rec.recommended_shards, 1);
        prop_assert_eq!(rec.basis, ShardBasis::MinimumFloor);
    }

    /// Above the threshold the count stays between the floor and the cap
    #[test]
    fn test_cap_enforcement(
        policy in policy_strategy(),
        rows in 1_000u64..,
        bytes in any::<u64>(),
    ) {
        let rec = ShardCountAdvisor::new(&policy).unwrap().recommend(rows, bytes);
        prop_assert!(rec.recommended_shards <= policy.shard_cap());
        prop_assert!(rec.recommended_shards <= policy.max_shard_count);
        prop_assert!(rec.recommended_shards >= policy.minimum_shard_floor);
    }

    /// Constant and boolean columns never become candidates, wherever they sit
    #[test]
    fn test_constant_columns_never_scored(
        (rows, distinct_counts) in table_strategy(),
        constant_distinct in 0i64..=1,
        position in 0usize..5,
    ) {
        let policy = test_policy();
        let mut record = table("t", rows, &distinct_counts);
        let at = position.min(record.columns.len());
        record.columns.insert(
            at,
            ColumnStats::new("constant", ColumnDataType::String, constant_distinct.min(rows)),
        );
        record.columns.push(ColumnStats::new("flag", ColumnDataType::Boolean, rows.min(2)));

        let scored = ShardKeyScorer::new(&policy).unwrap().score(&record).unwrap();
        prop_assert!(scored.iter().all(|c| c.column_name != "constant" && c.column_name != "flag"));
        prop_assert!(scored.iter().all(|c| (0.0..=1.0).contains(&c.composite_score)));
    }

    /// Same tables, any order: identical report
    #[test]
    fn test_determinism(
        tables in prop::collection::vec(table_strategy(), 0..12),
    ) {
        let policy = test_policy();
        let aggregator = RecommendationAggregator::new(&policy).unwrap();
        let records: Vec<StatsRecord> = tables
            .iter()
            .enumerate()
            .map(|(i, (rows, distinct_counts))| table(&format!("t{}", i), *rows, distinct_counts))
            .collect();
        let mut reversed = records.clone();
        reversed.reverse();

        let first = serde_json::to_string(&aggregator.aggregate(&records)).unwrap();
        let again = serde_json::to_string(&aggregator.aggregate(&records)).unwrap();
        let flipped = serde_json::to_string(&aggregator.aggregate(&reversed)).unwrap();
        prop_assert_eq!(&first, &again);
        prop_assert_eq!(&first, &flipped);
    }
}
