//! Shard count recommendation.
//!
//! The count is the largest of three lower bounds (rows, bytes, policy floor),
//! capped by the policy. Arithmetic runs in `u128` so that `row_count *
//! average_row_bytes` cannot overflow for any `u64` inputs.

use crate::error::PolicyError;
use crate::policy::{ClusterShape, ThresholdPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU128;

/// Which bound decided the shard count.
///
/// Declaration order is also tie-break precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardBasis {
    RowCountDriven,
    ByteSizeDriven,
    MinimumFloor,
}

impl ShardBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardBasis::RowCountDriven => "row_count_driven",
            ShardBasis::ByteSizeDriven => "byte_size_driven",
            ShardBasis::MinimumFloor => "minimum_floor",
        }
    }
}

impl fmt::Display for ShardBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCountRecommendation {
    /// Always >= 1
    pub recommended_shards: u32,
    pub basis: ShardBasis,
}

impl ShardCountRecommendation {
    /// A single shard: sharding is not worthwhile.
    pub fn unsharded() -> Self {
        Self {
            recommended_shards: 1,
            basis: ShardBasis::MinimumFloor,
        }
    }
}

/// Computes shard counts under a [`ThresholdPolicy`].
///
/// Only built from a policy that passed [`ThresholdPolicy::validate`], so both
/// per-shard targets are non-zero divisors.
#[derive(Debug, Clone, Copy)]
pub struct ShardCountAdvisor<'a> {
    policy: &'a ThresholdPolicy,
    rows_per_shard: NonZeroU128,
    bytes_per_shard: NonZeroU128,
}

impl<'a> ShardCountAdvisor<'a> {
    pub fn new(policy: &'a ThresholdPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        let non_zero = |value: u64, field: &str| {
            NonZeroU128::new(value as u128)
                .ok_or_else(|| PolicyError::Invalid(format!("{} must be positive", field)))
        };
        Ok(Self {
            policy,
            rows_per_shard: non_zero(policy.target_rows_per_shard, "target_rows_per_shard")?,
            bytes_per_shard: non_zero(policy.target_bytes_per_shard, "target_bytes_per_shard")?,
        })
    }

    pub fn recommend(&self, row_count: u64, average_row_bytes: u64) -> ShardCountRecommendation {
        let policy = self.policy;
        if row_count < policy.min_rows_before_sharding {
            return ShardCountRecommendation::unsharded();
        }

        let by_rows = ceil_div(row_count as u128, self.rows_per_shard);
        let by_bytes = ceil_div(
            row_count as u128 * average_row_bytes as u128,
            self.bytes_per_shard,
        );
        let floor = policy.minimum_shard_floor.max(1) as u128;

        let (shards, basis) = if by_rows >= by_bytes && by_rows >= floor {
            (by_rows, ShardBasis::RowCountDriven)
        } else if by_bytes >= floor {
            (by_bytes, ShardBasis::ByteSizeDriven)
        } else {
            (floor, ShardBasis::MinimumFloor)
        };

        let cap = policy.shard_cap();
        let mut recommended_shards = shards.min(cap as u128) as u32;
        if let Some(cluster) = policy.cluster.filter(|c| c.align_to_nodes) {
            recommended_shards = align_to_nodes(recommended_shards, &cluster, floor as u32, cap);
        }

        ShardCountRecommendation {
            recommended_shards,
            basis,
        }
    }
}

/// Round `shards` up to a multiple of the node count without crossing `cap`.
///
/// When the rounded value would cross the cap, the largest multiple of the
/// node count under the cap is used, or the cap itself if that multiple would
/// fall below the floor.
fn align_to_nodes(shards: u32, cluster: &ClusterShape, floor: u32, cap: u32) -> u32 {
    let nodes = NonZeroU128::new(cluster.nodes as u128).unwrap_or(NonZeroU128::MIN);
    let aligned = ceil_div(shards as u128, nodes) * nodes.get();
    if aligned <= cap as u128 {
        return aligned as u32;
    }
    let below_cap = (cap as u128 / nodes) * nodes.get();
    if below_cap >= floor as u128 && below_cap > 0 {
        below_cap as u32
    } else {
        cap
    }
}

fn ceil_div(numerator: u128, denominator: NonZeroU128) -> u128 {
    numerator.div_ceil(denominator.get())
}
