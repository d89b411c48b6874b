//! tenantq CLI - Operator interface for the tenantq job runner
//! Talks to the shared SQLite store directly; no worker needs to be running

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tabled::{Table, Tabled};

use tenantq_core::application::worker::constants::{CONTEXT_MARKER_PATH, DEFAULT_MAX_ATTEMPTS};
use tenantq_core::application::{DispatchRequest, DispatchService, RetryPolicy};
use tenantq_core::domain::{
    HasDatabase, HasDomains, Job, JobState, Tenant, TenantContext, DEFAULT_QUEUE,
};
use tenantq_core::port::id_provider::UuidProvider;
use tenantq_core::port::time_provider::SystemTimeProvider;
use tenantq_core::port::{JobQueue, RestartSignal, StaticTenancy, TenantDirectory, TimeProvider};
use tenantq_infra_sqlite::{
    create_pool, file_url, run_migrations, SqliteJobQueue, SqliteRestartSignal,
    SqliteTenantDirectory,
};
use tenantq_infra_system::FsMarkerWriter;

const DEFAULT_DB_PATH: &str = "~/.tenantq/tenantq.db";
const DEFAULT_BASE_PATH: &str = "~/.tenantq/storage";

#[derive(Parser)]
#[command(name = "tenantq")]
#[command(about = "tenantq job runner CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database shared with the workers
    #[arg(long, env = "TENANTQ_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db_path: String,

    /// Directory the workers write markers into
    #[arg(long, env = "TENANTQ_BASE_PATH", default_value = DEFAULT_BASE_PATH)]
    base_path: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a job
    Dispatch {
        #[command(subcommand)]
        job: DispatchCommand,
    },

    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        action: TenantCommand,
    },

    /// Inspect and retry jobs in the dead set
    Dead {
        #[command(subcommand)]
        action: DeadCommand,
    },

    /// Ask every running worker to exit after its current job
    Restart,

    /// Show queue status
    Status,

    /// Print a marker written by the workers
    Marker {
        /// Marker path relative to the base path
        #[arg(default_value = CONTEXT_MARKER_PATH)]
        path: String,
    },
}

#[derive(Args)]
struct DispatchOptions {
    /// Dispatch inside this tenant (central context when omitted)
    #[arg(short, long)]
    tenant: Option<String>,

    /// Queue name
    #[arg(short, long, default_value = DEFAULT_QUEUE)]
    queue: String,

    /// Attempts before the job lands in the dead set
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: i32,
}

#[derive(Subcommand)]
enum DispatchCommand {
    /// Create a user with random credentials
    CreateUser {
        #[command(flatten)]
        options: DispatchOptions,
    },

    /// Write a tenant attribute to a marker
    LogValue {
        #[command(flatten)]
        options: DispatchOptions,

        /// Tenant attribute to read
        #[arg(short, long, default_value = "abc")]
        attribute: String,

        /// Marker path (defaults to the attribute name)
        #[arg(long)]
        target: Option<String>,
    },
}

#[derive(Subcommand)]
enum TenantCommand {
    /// Register a tenant
    Add {
        /// Tenant ID
        id: String,

        /// Domain routed to this tenant (repeatable)
        #[arg(short, long)]
        domain: Vec<String>,

        /// Attribute as key=value (repeatable)
        #[arg(short, long, value_parser = parse_attribute)]
        attr: Vec<(String, String)>,
    },

    /// List tenants
    List,
}

#[derive(Subcommand)]
enum DeadCommand {
    /// List jobs that exhausted their attempts
    List,

    /// Re-queue a dead job with a fresh attempt budget
    Retry {
        /// Job ID
        job_id: String,
    },
}

#[derive(Tabled)]
struct DispatchView {
    job_id: String,
    kind: String,
    context: String,
    queue: String,
}

#[derive(Tabled)]
struct TenantView {
    id: String,
    database: String,
    domains: String,
    attributes: String,
}

#[derive(Tabled)]
struct DeadJobView {
    id: String,
    kind: String,
    context: String,
    attempts: String,
    last_error: String,
}

#[derive(Tabled)]
struct QueueView {
    queue: String,
    state: String,
    jobs: i64,
}

fn parse_attribute(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

/// Wired store handles for one CLI invocation
struct Store {
    queue: Arc<SqliteJobQueue>,
    tenants: Arc<SqliteTenantDirectory>,
    restart: SqliteRestartSignal,
    time_provider: Arc<dyn TimeProvider>,
}

async fn open_store(db_path: &str) -> Result<Store> {
    let db_path = shellexpand::tilde(db_path).into_owned();
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }

    let pool = create_pool(&file_url(&db_path))
        .await
        .with_context(|| format!("Failed to open {}", db_path))?;
    run_migrations(&pool).await.context("Migration failed")?;

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    // CLI never settles jobs, the policy only satisfies the constructor
    let retry_policy = Arc::new(RetryPolicy::new(time_provider.clone(), 0));

    Ok(Store {
        queue: Arc::new(SqliteJobQueue::new(
            pool.clone(),
            time_provider.clone(),
            retry_policy,
        )),
        tenants: Arc::new(SqliteTenantDirectory::new(pool.clone())),
        restart: SqliteRestartSignal::new(pool),
        time_provider,
    })
}

fn job_context(job: &Job) -> String {
    job.tenant_context().marker()
}

async fn dispatch(store: &Store, job: DispatchCommand) -> Result<()> {
    let (options, request) = match job {
        DispatchCommand::CreateUser { options } => (options, DispatchRequest::create_user()),
        DispatchCommand::LogValue {
            options,
            attribute,
            target,
        } => {
            let target = target.unwrap_or_else(|| attribute.clone());
            (options, DispatchRequest::log_value(attribute, target))
        }
    };

    if let Some(tenant) = &options.tenant {
        store
            .tenants
            .find(tenant)
            .await?
            .with_context(|| format!("Unknown tenant '{}'", tenant))?;
    }

    let kind = request.kind;
    let service = DispatchService::new(
        store.queue.clone(),
        Arc::new(StaticTenancy::new(options.tenant.clone())),
        Arc::new(UuidProvider),
        store.time_provider.clone(),
    );
    let job_id = service
        .dispatch(
            request
                .on_queue(options.queue.clone())
                .with_max_attempts(options.max_attempts),
        )
        .await?;

    println!("{}", "✓ Job dispatched".green().bold());
    println!();
    let view = DispatchView {
        job_id,
        kind: kind.to_string(),
        context: TenantContext::from_tenant_id(options.tenant).marker(),
        queue: options.queue,
    };
    println!("{}", Table::new(vec![view]));
    Ok(())
}

async fn tenant(store: &Store, action: TenantCommand) -> Result<()> {
    match action {
        TenantCommand::Add { id, domain, attr } => {
            let now = store.time_provider.now_millis();
            let mut tenant = Tenant::new(id.clone(), now);
            for host in domain {
                tenant = tenant.with_domain(host);
            }
            for (key, value) in attr {
                tenant = tenant.with_attribute(key, value);
            }
            store.tenants.create(&tenant).await?;
            println!("{}", format!("✓ Tenant {} created", id).green().bold());
        }
        TenantCommand::List => {
            let tenants = store.tenants.list().await?;
            if tenants.is_empty() {
                println!("{}", "No tenants registered".yellow());
                return Ok(());
            }
            let views: Vec<TenantView> = tenants
                .iter()
                .map(|t| TenantView {
                    id: t.id.clone(),
                    database: t.database_name().to_string(),
                    domains: t.domains().hosts().join(", "),
                    attributes: t
                        .data
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<_>>()
                        .join(", "),
                })
                .collect();
            println!("{}", Table::new(views));
        }
    }
    Ok(())
}

async fn dead(store: &Store, action: DeadCommand) -> Result<()> {
    match action {
        DeadCommand::List => {
            let jobs = store.queue.find_by_state(JobState::Failed).await?;
            if jobs.is_empty() {
                println!("{}", "Dead set is empty".green());
                return Ok(());
            }
            let views: Vec<DeadJobView> = jobs
                .iter()
                .map(|job| DeadJobView {
                    id: job.id.clone(),
                    kind: job.kind.to_string(),
                    context: job_context(job),
                    attempts: format!("{}/{}", job.attempts, job.max_attempts),
                    last_error: job.last_error.clone().unwrap_or_default(),
                })
                .collect();
            println!("{}", Table::new(views));
        }
        DeadCommand::Retry { job_id } => {
            store.queue.retry_dead(&job_id).await?;
            println!("{}", format!("✓ Job {} re-queued", job_id).green().bold());
        }
    }
    Ok(())
}

async fn status(store: &Store, db_path: &str) -> Result<()> {
    println!("{}", "System Status".cyan().bold());
    println!();
    println!("  {} {}", "Database:".bold(), db_path);
    println!(
        "  {} {}",
        "Tenants:".bold(),
        store.tenants.list().await?.len()
    );

    let restart = match store.restart.last_restart().await? {
        Some(at) => chrono::DateTime::from_timestamp_millis(at)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| at.to_string()),
        None => "never".to_string(),
    };
    println!("  {} {}", "Last restart:".bold(), restart);
    println!();

    let counts = store.queue.state_counts().await?;
    if counts.is_empty() {
        println!("  {}", "No jobs".yellow());
        return Ok(());
    }
    let views: Vec<QueueView> = counts
        .into_iter()
        .map(|(queue, state, jobs)| QueueView {
            queue,
            state: match state {
                JobState::Failed => state.to_string().red().to_string(),
                JobState::Done => state.to_string().green().to_string(),
                _ => state.to_string(),
            },
            jobs,
        })
        .collect();
    println!("{}", Table::new(views));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Marker { path } = &cli.command {
        let base_path = shellexpand::tilde(&cli.base_path).into_owned();
        let markers = FsMarkerWriter::new(base_path);
        match markers.read_marker(path).await? {
            Some(content) => println!("{}", content),
            None => println!("{}", format!("Marker {} not written yet", path).yellow()),
        }
        return Ok(());
    }

    let store = open_store(&cli.db_path).await?;

    match cli.command {
        Commands::Dispatch { job } => dispatch(&store, job).await?,
        Commands::Tenant { action } => tenant(&store, action).await?,
        Commands::Dead { action } => dead(&store, action).await?,
        Commands::Restart => {
            let now = store.time_provider.now_millis();
            store.restart.broadcast(now).await?;
            println!(
                "{}",
                "✓ Restart broadcast. Workers exit after their current job."
                    .green()
                    .bold()
            );
        }
        Commands::Status => status(&store, &cli.db_path).await?,
        Commands::Marker { .. } => {}
    }

    Ok(())
}
