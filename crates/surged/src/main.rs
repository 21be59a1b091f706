//! surged — the Surge daemon.
//!
//! Single binary that assembles the scaling control plane:
//! - Request ledger (redb)
//! - Orchestration platform client (in-memory or HTTP)
//! - One-shot trigger scheduler
//! - Workflow engine
//! - Intake service + REST API
//!
//! # Usage
//!
//! ```text
//! surged run --port 8088 --data-dir /var/lib/surge
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use surge_api::ApiState;
use surge_check::CheckOracle;
use surge_intake::IntakeService;
use surge_ledger::{Ledger, WorkflowJob};
use surge_platform::config::keys;
use surge_platform::{
    ConfigStore, FileConfigStore, HttpPlatform, InMemoryPlatform, MemoryConfigStore, PlatformClient,
};
use surge_trigger::TriggerScheduler;
use surge_workflow::{WorkflowConfig, WorkflowEngine};

#[derive(Parser)]
#[command(name = "surged", about = "Surge daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control plane (API, triggers, and workflow runs in one process).
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Port to listen on.
    #[arg(long, default_value = "8088")]
    port: u16,

    /// Data directory for the request ledger.
    #[arg(long, default_value = "/var/lib/surge")]
    data_dir: PathBuf,

    /// TOML file for the configuration store; without it the ref flags
    /// below make up the whole configuration.
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Cluster the managed service runs in.
    #[arg(long, default_value = "cluster-a")]
    cluster_ref: String,

    /// Service whose desired count gets scaled.
    #[arg(long, default_value = "svc-default")]
    service_ref: String,

    /// Base URL (http) of the orchestration platform API; without it an
    /// in-memory platform backs the daemon.
    #[arg(long)]
    platform_url: Option<String>,

    /// Desired count seeded into the in-memory platform.
    #[arg(long, default_value = "1")]
    seed_desired: u32,

    /// Seconds between settle polls.
    #[arg(long, default_value = "10")]
    poll_interval: u64,

    /// Pending polls allowed before a settle loop times out.
    #[arg(long, default_value = "60")]
    max_poll_attempts: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,surged=debug,surge_intake=debug,surge_workflow=debug,surge_trigger=debug"
                    .parse()
                    .unwrap()
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    info!("surge daemon starting");

    // Ensure data directory exists.
    std::fs::create_dir_all(&args.data_dir)?;

    // ── Initialize subsystems ──────────────────────────────────

    // Configuration store.
    let config: Arc<dyn ConfigStore> = match &args.config_file {
        Some(path) => {
            let store = FileConfigStore::load(path)?;
            info!(path = ?path, "configuration loaded");
            Arc::new(store)
        }
        None => Arc::new(
            MemoryConfigStore::new()
                .with(keys::CLUSTER_REF, &args.cluster_ref)
                .with(keys::SERVICE_REF, &args.service_ref),
        ),
    };

    // Request ledger. The configuration store may override the path.
    let ledger_path = config
        .get(keys::LEDGER_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| args.data_dir.join("surge.redb"));
    let ledger = Ledger::open(&ledger_path)?;
    info!(path = ?ledger_path, "request ledger opened");

    // Platform client.
    let platform: Arc<dyn PlatformClient> = match &args.platform_url {
        Some(url) => {
            let authority = url
                .strip_prefix("http://")
                .unwrap_or(url)
                .trim_end_matches('/');
            info!(%authority, "using HTTP platform client");
            Arc::new(HttpPlatform::new(authority))
        }
        None => {
            let cluster_ref = config.get(keys::CLUSTER_REF)?;
            let service_ref = config.get(keys::SERVICE_REF)?;
            let memory = InMemoryPlatform::new();
            memory.register_service(&cluster_ref, &service_ref, args.seed_desired);
            info!(
                %cluster_ref,
                %service_ref,
                desired = args.seed_desired,
                "using in-memory platform client"
            );
            Arc::new(memory)
        }
    };

    // Workflow engine.
    let workflow_config = WorkflowConfig {
        poll_interval: Duration::from_secs(args.poll_interval),
        max_poll_attempts: args.max_poll_attempts,
        ..WorkflowConfig::default()
    };
    let engine = Arc::new(WorkflowEngine::new(
        ledger.clone(),
        platform.clone(),
        workflow_config,
    ));
    info!(
        poll_interval = args.poll_interval,
        max_poll_attempts = args.max_poll_attempts,
        "workflow engine initialized"
    );

    // Trigger scheduler. A fired trigger starts the workflow run.
    let trigger = {
        let engine = engine.clone();
        Arc::new(TriggerScheduler::new(Arc::new(move |job: WorkflowJob| {
            let engine = engine.clone();
            Box::pin(async move {
                if let Err(e) = engine.start(job).await {
                    tracing::warn!(error = %e, "fired trigger did not start a run");
                }
            })
        })))
    };
    info!("trigger scheduler initialized");

    // Intake service.
    let intake = Arc::new(IntakeService::new(
        ledger.clone(),
        platform.clone(),
        config.clone(),
        trigger.clone(),
    ));

    // Recovery pass: restart in-flight runs, re-arm rows still waiting
    // to fire.
    let resumed = engine.resume_in_flight().await?;
    let rearmed = intake.rearm_scheduled().await?;
    info!(resumed, rearmed, "recovery pass complete");

    // ── Start API server ───────────────────────────────────────

    let state = ApiState {
        intake,
        ledger,
        oracle: CheckOracle::new(platform),
        config,
    };
    let router = surge_api::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
    });

    server.await?;

    // Drain subsystems. Interrupted runs park at their persisted rows
    // and resume on the next start.
    trigger.shutdown_all().await;
    engine.shutdown_all().await;

    info!("surge daemon stopped");
    Ok(())
}
