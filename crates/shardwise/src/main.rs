//! Shardwise launcher
//!
//! Thin driver around the recommendation engine: load a statistics snapshot
//! and a policy, print or write the ranked report as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shardwise_engine::{
    ClusterShape, JsonFileStatsProvider, Priority, RecommendationReport, ThresholdPolicy,
};
use shardwise_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "shardwise", about = "Shard recommendations for columnar database tables")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors to stderr
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute recommendations from a statistics snapshot
    Recommend {
        /// JSON statistics snapshot produced by the gathering step
        #[arg(short, long)]
        stats: PathBuf,

        /// TOML threshold policy (defaults apply to missing fields)
        #[arg(short, long, env = "SHARDWISE_POLICY")]
        policy: Option<PathBuf>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override how many candidate keys are kept per table
        #[arg(long)]
        top_n: Option<usize>,

        /// Number of cluster nodes; shard counts are aligned to a multiple of it
        #[arg(long)]
        nodes: Option<u32>,
    },

    /// Print the default policy as TOML
    Policy {
        /// Write the policy to this file instead of stdout
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "shardwise",
        verbose: cli.verbose,
        quiet: cli.quiet,
    }) {
        eprintln!("warning: {:#}", err);
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Recommend {
            stats,
            policy,
            output,
            top_n,
            nodes,
        } => {
            let policy = build_policy(policy, top_n, nodes)?;
            let provider = JsonFileStatsProvider::new(&stats);
            let report = shardwise_engine::recommend(&provider, &policy)
                .with_context(|| format!("Failed to compute recommendations from {}", stats.display()))?;
            log_summary(&report);
            write_report(&report, output)
        }
        Commands::Policy { write } => {
            let content = ThresholdPolicy::default()
                .to_toml_string()
                .context("Failed to render default policy")?;
            match write {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write policy to {}", path.display()))?;
                    info!(path = %path.display(), "Wrote default policy");
                }
                None => print!("{}", content),
            }
            Ok(())
        }
    }
}

fn build_policy(
    path: Option<PathBuf>,
    top_n: Option<usize>,
    nodes: Option<u32>,
) -> Result<ThresholdPolicy> {
    let mut policy = match path {
        Some(path) => ThresholdPolicy::load(&path)
            .with_context(|| format!("Failed to load policy from {}", path.display()))?,
        None => ThresholdPolicy::default(),
    };
    if let Some(top_n) = top_n {
        policy = policy.with_top_n(top_n);
    }
    if let Some(nodes) = nodes {
        let cluster = match policy.cluster {
            Some(existing) => ClusterShape {
                nodes,
                align_to_nodes: true,
                ..existing
            },
            None => ClusterShape::new(nodes),
        };
        policy = policy.with_cluster(cluster);
    }
    policy.validate().context("Invalid policy")?;
    Ok(policy)
}

fn log_summary(report: &RecommendationReport) {
    for failure in &report.failures {
        warn!(table = %failure.table_id, "Rejected statistics: {}", failure.error);
    }
    for rec in report
        .recommendations
        .iter()
        .filter(|r| r.priority == Priority::High)
    {
        if let Some(best) = rec.best_candidate() {
            info!(
                table = %rec.table_id,
                key = %best.column_name,
                shards = rec.shard_count.recommended_shards,
                "High priority"
            );
        }
    }
    info!(
        high = report.count(Priority::High),
        medium = report.count(Priority::Medium),
        low = report.count(Priority::Low),
        not_recommended = report.count(Priority::NotRecommended),
        rejected = report.failures.len(),
        "Recommendation summary"
    );
}

fn write_report(report: &RecommendationReport, output: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!(path = %path.display(), "Wrote report");
        }
        None => println!("{}", json),
    }
    Ok(())
}
