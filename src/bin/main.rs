#![allow(clippy::expect_used)]
//! `claw-rollout` binary entrypoint.
//!
//! A CLI front end over the rolling deployment engine: `deploy` drives a
//! fleet document toward a desired-state document; `rollback` restores a
//! fleet from a previously written snapshot document.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use claw_rollout::error::{DeployError, DeployResult};
use claw_rollout::executor::ProductionExecutor;
use claw_rollout::orchestrator::deploy as run_deploy;
use claw_rollout::persist::{load_desired, load_fleet, load_snapshot, save_fleet};
use claw_rollout::rollback::rollback as run_rollback;
use claw_rollout::types::{DeploymentConfig, SystemState};

/// Bundled example fleet, used by `rollback` when `--instances` is omitted.
const BUNDLED_FLEET: &str = r#"[
  {"instance_id": "web-01", "code_version": "v1.0.0", "configuration_version": "cfg-1"},
  {"instance_id": "web-02", "code_version": "v1.0.0", "configuration_version": "cfg-1"},
  {"instance_id": "web-03", "code_version": "v1.0.0", "configuration_version": "cfg-1"}
]"#;

const SAFETY_NET_SNAPSHOT_PATH: &str = ".snapshot.json";

/// `claw-rollout` - rolling deployment engine for Clawbernetes fleets.
#[derive(Parser, Debug)]
#[command(name = "claw-rollout")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive a fleet to a desired (code, configuration) pair.
    Deploy {
        /// Path to the fleet document.
        #[arg(long)]
        instances: PathBuf,

        /// Path to the desired-state document.
        #[arg(long)]
        desired: PathBuf,

        /// Number of instances updated concurrently per batch.
        #[arg(long, default_value_t = 5)]
        batch_size: i64,

        /// Absolute number of failures that trips an abort.
        #[arg(long)]
        max_failures: Option<u64>,

        /// Percentage of failures among updated instances that trips an abort.
        #[arg(long)]
        failure_percentage: Option<f64>,

        /// Per-instance update timeout, in seconds.
        #[arg(long)]
        timeout_s: Option<f64>,

        /// Number of retries after the first attempt.
        #[arg(long, default_value_t = 0)]
        retry_max_attempts: u32,

        /// Base delay in seconds for the exponential backoff between retries.
        #[arg(long, default_value_t = 0.1)]
        retry_base_delay_s: f64,

        /// Report what would happen without mutating any instance.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Log verbosity (e.g. `info`, `debug`, `warn`).
        #[arg(long, default_value = "info")]
        log_level: String,
    },

    /// Restore a fleet from a previously written snapshot document.
    Rollback {
        /// Path to the snapshot document.
        #[arg(long)]
        snapshot: PathBuf,

        /// Path to the fleet document to restore in place. Falls back to a
        /// bundled example fleet when omitted.
        #[arg(long)]
        instances: Option<PathBuf>,

        /// Log verbosity (e.g. `info`, `debug`, `warn`).
        #[arg(long, default_value = "info")]
        log_level: String,
    },
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("claw_rollout={log_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();
}

async fn run_deploy_command(
    instances: PathBuf,
    desired: PathBuf,
    batch_size: i64,
    max_failures: Option<u64>,
    failure_percentage: Option<f64>,
    timeout_s: Option<f64>,
    retry_max_attempts: u32,
    retry_base_delay_s: f64,
    dry_run: bool,
) -> DeployResult<()> {
    let mut fleet = load_fleet(&instances)?;
    let desired_state = load_desired(&desired)?;

    info!(path = %SAFETY_NET_SNAPSHOT_PATH, "writing safety-net snapshot before deploy");
    let safety_net = claw_rollout::types::take_snapshot(&fleet);
    claw_rollout::persist::save_snapshot(&PathBuf::from(SAFETY_NET_SNAPSHOT_PATH), &safety_net)?;

    let mut current = fleet.first().map_or_else(
        || SystemState::new(String::new(), String::new()),
        |first| SystemState::new(first.code_version.clone(), first.configuration_version.clone()),
    );

    let config = DeploymentConfig {
        batch_size,
        max_failures,
        failure_percentage,
        timeout_s,
        retry_max_attempts,
        retry_base_delay_s,
    };
    let executor = ProductionExecutor;

    let result = run_deploy(&mut fleet, &desired_state, &mut current, &config, dry_run, &executor).await?;

    if dry_run {
        let instances_planned = result
            .history
            .iter()
            .find_map(|event| match event {
                claw_rollout::types::Event::DryRun { instances_planned } => Some(*instances_planned),
                _ => None,
            })
            .unwrap_or(0);
        info!(instances_planned, "dry run complete, no files written");
    } else {
        save_fleet(&instances, &fleet)?;
    }

    let report = serde_json::to_string_pretty(&result).unwrap_or_else(|_| format!("{result:?}"));
    println!("{report}");

    if !result.success {
        info!("deployment finished unsuccessfully; see result above");
    }

    Ok(())
}

fn run_rollback_command(
    snapshot: PathBuf,
    instances: Option<PathBuf>,
) -> DeployResult<()> {
    let snap = load_snapshot(&snapshot)?;

    let (mut fleet, write_back_path) = match instances {
        Some(path) => (load_fleet(&path)?, Some(path)),
        None => {
            let fleet: Vec<_> = serde_json::from_str(BUNDLED_FLEET)?;
            (fleet, None)
        }
    };

    run_rollback(&mut fleet, &snap);

    if let Some(path) = &write_back_path {
        save_fleet(path, &fleet)?;
    }

    let report = serde_json::to_string_pretty(&fleet).unwrap_or_else(|_| format!("{fleet:?}"));
    println!("{report}");
    Ok(())
}

async fn run(cli: Cli) -> DeployResult<()> {
    match cli.command {
        Command::Deploy {
            instances,
            desired,
            batch_size,
            max_failures,
            failure_percentage,
            timeout_s,
            retry_max_attempts,
            retry_base_delay_s,
            dry_run,
            log_level,
        } => {
            init_tracing(&log_level);
            info!("claw-rollout deploy starting");
            run_deploy_command(
                instances,
                desired,
                batch_size,
                max_failures,
                failure_percentage,
                timeout_s,
                retry_max_attempts,
                retry_base_delay_s,
                dry_run,
            )
            .await
        }
        Command::Rollback {
            snapshot,
            instances,
            log_level,
        } => {
            init_tracing(&log_level);
            info!("claw-rollout rollback starting");
            run_rollback_command(snapshot, instances)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    if let Err(e) = runtime.block_on(run(cli)) {
        error!("claw-rollout error: {e}");
        eprintln!("claw-rollout error: {e}");
        std::process::exit(exit_code_for(&e));
    }
}

fn exit_code_for(err: &DeployError) -> i32 {
    match err {
        DeployError::Config(_) | DeployError::ConcurrentDeployment => 2,
        DeployError::Io(_) | DeployError::Json(_) => 3,
    }
}
