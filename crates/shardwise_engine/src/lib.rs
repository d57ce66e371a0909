//! Shard Recommendation Engine
//!
//! Turns per-table statistics into sharding advice for a columnar,
//! in-memory database cluster: which column to shard on, how many shards to
//! use, and how urgently.
//!
//! # Flow
//!
//! ```text
//! ┌───────────────┐     ┌───────────────────┐     ┌──────────────────────────┐
//! │ StatsProvider │────▶│  ShardKeyScorer   │────▶│                          │
//! │  (snapshot)   │     ├───────────────────┤     │ RecommendationAggregator │──▶ report
//! │               │────▶│ ShardCountAdvisor │────▶│                          │
//! └───────────────┘     └───────────────────┘     └──────────────────────────┘
//! ```
//!
//! Every component takes an explicit [`ThresholdPolicy`]. The engine performs
//! no I/O of its own beyond what the provider does, and holds no state
//! between runs: the same snapshot and policy always give the same report.
//!
//! # Modules
//!
//! - [`stats`]: input records ([`StatsRecord`], [`ColumnStats`])
//! - [`policy`]: tunable thresholds
//! - [`scorer`]: shard key candidates
//! - [`advisor`]: shard counts
//! - [`aggregate`]: priorities, actions and the ranked report
//! - [`provider`]: where statistics come from

pub mod advisor;
pub mod aggregate;
pub mod error;
pub mod policy;
pub mod provider;
pub mod scorer;
pub mod stats;

pub use advisor::{ShardBasis, ShardCountAdvisor, ShardCountRecommendation};
pub use aggregate::{
    Priority, RecommendationAggregator, RecommendationReport, ShardAction, TableFailure,
    TableRecommendation,
};
pub use error::{EngineError, PolicyError, ProviderError, Result, ValidationError};
pub use policy::{ClusterShape, ThresholdPolicy};
pub use provider::{InMemoryStatsProvider, JsonFileStatsProvider, StatsProvider};
pub use scorer::{CandidateScore, ShardKeyScorer};
pub use stats::{ColumnDataType, ColumnStats, StatsRecord, StatsSnapshot};

use tracing::info;

/// Run the engine over one snapshot from `provider`.
///
/// Fails only if the policy is incoherent or the provider cannot deliver a
/// snapshot. Bad individual records end up in [`RecommendationReport::failures`].
pub fn recommend(
    provider: &dyn StatsProvider,
    policy: &ThresholdPolicy,
) -> Result<RecommendationReport> {
    let aggregator = RecommendationAggregator::new(policy)?;
    let snapshot = provider.snapshot()?;
    info!(
        provider = provider.name(),
        tables = snapshot.tables.len(),
        "Computing shard recommendations"
    );
    Ok(aggregator.aggregate_snapshot(&snapshot))
}
