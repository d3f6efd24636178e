//! `wine_service` CLI: local entry point driving `WineService`'s
//! `IngestionApi`/`MovementApi` directly (spec §6 — no HTTP framing),
//! plus a `scheduler-run` command for the daily report job (spec §4.K).
//! Logging setup follows the teacher's dual-layer tracing-subscriber
//! pattern (rolling JSON file + stderr mirror), reused via
//! `wine_logging::init_logging`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use wine_service::config::Config;
use wine_service::{FileAdminNotifier, IngestionApi, MovementApi, WineService};
use wine_store::MovementType;

#[derive(Parser)]
#[command(name = "wine_service", about = "Wine inventory ingestion and stock-movement service")]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Path to a TOML file whose values override every flag/env default.
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Mirror the file log's full verbosity to stderr as well.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a file for ingestion and print the assigned job id.
    Ingest {
        #[arg(long)]
        tenant_user_id: i64,
        #[arg(long)]
        business_name: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        client_msg_id: Option<String>,
    },
    /// Print a job's current status as JSON.
    JobStatus {
        #[arg(long)]
        job_id: String,
    },
    /// Apply one stock movement (consumo/rifornimento).
    Movement {
        #[arg(long)]
        tenant_user_id: i64,
        #[arg(long)]
        business_name: String,
        #[arg(long)]
        wine: String,
        #[arg(long, value_parser = parse_movement_type)]
        movement_type: MovementType,
        #[arg(long)]
        quantity: i64,
    },
    /// Print a tenant's full inventory snapshot as JSON.
    Snapshot {
        #[arg(long)]
        tenant_user_id: i64,
        #[arg(long)]
        business_name: String,
    },
    /// Administrative quantity override (spec §4.I "set field"): set a
    /// wine's quantity to an absolute value, looked up by wine id.
    SetQuantity {
        #[arg(long)]
        tenant_user_id: i64,
        #[arg(long)]
        business_name: String,
        #[arg(long)]
        wine_id: String,
        #[arg(long)]
        new_value: i64,
    },
    /// Mark a tenant onboarded, making it eligible for the daily report run.
    OnboardTenant {
        #[arg(long)]
        tenant_user_id: i64,
        #[arg(long)]
        business_name: String,
    },
    /// Run the daily report job once, immediately, ignoring the fire window.
    SchedulerRun,
    /// Run the daily report scheduler forever (spec §4.K).
    SchedulerServe,
    /// Print the resolved configuration.
    PrintConfig,
}

fn parse_movement_type(value: &str) -> Result<MovementType, String> {
    match value {
        "consumo" => Ok(MovementType::Consumo),
        "rifornimento" => Ok(MovementType::Rifornimento),
        other => Err(format!("unknown movement type {other:?}, expected \"consumo\" or \"rifornimento\"")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    wine_logging::init_logging(wine_logging::LogConfig {
        app_name: "wine_service",
        verbose: cli.verbose,
        quiet_console: false,
    })?;

    let mut config = cli.config;
    if let Some(path) = &cli.config_file {
        config = Config::from_toml_file(path)?;
    }

    let db_path = config.resolved_db_path();
    let pool = wine_db::create_pool(
        wine_db::DbConfig::file(db_path.to_string_lossy()).with_max_connections(config.db_max_connections),
    )
    .await?;

    let admin_notifier = Arc::new(FileAdminNotifier::new(config.resolved_wine_home().join("notifications.jsonl")));
    let service = WineService::bootstrap(
        pool.clone(),
        &config,
        admin_notifier,
        Arc::new(wine_service::clients::UnconfiguredLlmClient),
        Arc::new(wine_service::clients::UnconfiguredOcrClient),
    )
    .await?;

    match cli.command {
        Command::Ingest { tenant_user_id, business_name, file, client_msg_id } => {
            let tenant = wine_protocol::Tenant::new(tenant_user_id, business_name);
            let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let file_name = file.file_name().and_then(|n| n.to_str()).unwrap_or("upload").to_string();
            let job_id = service.submit_ingestion(&tenant, &file_name, bytes, client_msg_id.as_deref()).await?;
            println!("{}", serde_json::json!({ "job_id": job_id.as_str() }));
        }
        Command::JobStatus { job_id } => {
            let job_id = wine_ids::JobId::parse(&job_id).with_context(|| format!("parsing job id {job_id:?}"))?;
            let job = service.job_status(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::Movement { tenant_user_id, business_name, wine, movement_type, quantity } => {
            let tenant = wine_protocol::Tenant::new(tenant_user_id, business_name);
            let outcome = service.apply_movement(&tenant, &wine, movement_type, quantity).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Snapshot { tenant_user_id, business_name } => {
            let tenant = wine_protocol::Tenant::new(tenant_user_id, business_name);
            let snapshot = service.snapshot(&tenant).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::SetQuantity { tenant_user_id, business_name, wine_id, new_value } => {
            let tenant = wine_protocol::Tenant::new(tenant_user_id, business_name);
            let outcome = service.set_quantity(&tenant, &wine_id, new_value).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::OnboardTenant { tenant_user_id, business_name } => {
            let tenant = wine_protocol::Tenant::new(tenant_user_id, business_name);
            service.complete_onboarding(&tenant).await?;
            println!("{}", serde_json::json!({ "onboarded": tenant.business_name }));
        }
        Command::SchedulerRun => {
            let scheduler = wine_scheduler::DailyReportScheduler::with_logging_sink(pool, wine_scheduler::ScheduleConfig::default());
            let summary = scheduler.run_once().await?;
            println!("{}", serde_json::json!({
                "sent": summary.sent,
                "skipped": summary.skipped,
                "errors": summary.errors,
            }));
        }
        Command::SchedulerServe => {
            let scheduler = Arc::new(wine_scheduler::DailyReportScheduler::with_logging_sink(
                pool,
                wine_scheduler::ScheduleConfig::default(),
            ));
            scheduler.run_forever().await;
        }
        Command::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("wine_home: {}", config.resolved_wine_home().display());
            println!("db_path: {}", db_path.display());
        }
    }

    Ok(())
}
