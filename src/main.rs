use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use queuectl::dashboard::{run_dashboard, DashboardState};
use queuectl::error::Result;
use queuectl::pool::WorkerPool;
use queuectl::scheduler::{Job, JobSpec, JobState};
use queuectl::store::Store;

#[derive(Parser, Debug)]
#[command(name = "queuectl")]
#[command(about = "A persistent background job queue with retries and a dead letter queue")]
#[command(version)]
struct Cli {
    /// Database path (defaults to $QUEUECTL_DB, then queuectl.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enqueue a new job from a JSON payload
    ///
    /// Example: queuectl enqueue '{"id":"job1","command":"echo hello"}'
    Enqueue {
        /// JSON document with id, command and optional max_retries,
        /// priority, run_at, timeout_seconds
        job_json: String,
    },
    /// List jobs, optionally filtered by state
    List {
        /// One of: pending, processing, completed, failed, dead
        #[arg(long)]
        state: Option<String>,
        /// Maximum number of jobs to show
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show detailed information about one job
    Info { job_id: String },
    /// Show a summary of job states, workers and metrics
    Status,
    /// Manage worker processes
    #[command(subcommand)]
    Worker(WorkerCommand),
    /// Inspect the worker registry
    #[command(subcommand)]
    Workers(WorkersCommand),
    /// Show or change persisted configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage the dead letter queue
    #[command(subcommand)]
    Dlq(DlqCommand),
    /// Web dashboard for monitoring
    #[command(subcommand)]
    Web(WebCommand),
}

#[derive(Subcommand, Debug)]
enum WorkerCommand {
    /// Start worker processes (Ctrl+C stops them gracefully)
    Start {
        /// Number of workers to start
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[derive(Subcommand, Debug)]
enum WorkersCommand {
    /// List registered workers and their heartbeat age
    List,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Set a configuration value
    ///
    /// Keys: max-retries, backoff-base, worker-poll-interval
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum DlqCommand {
    /// List all jobs in the dead letter queue
    List,
    /// Move a dead job back to pending with a clean slate
    Retry { job_id: String },
}

#[derive(Subcommand, Debug)]
enum WebCommand {
    /// Start the web dashboard
    Start {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn resolve_db_path(db: Option<PathBuf>) -> PathBuf {
    db.or_else(|| std::env::var_os("QUEUECTL_DB").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("queuectl.db"))
}

async fn run(cli: Cli) -> Result<()> {
    let db_path = resolve_db_path(cli.db);

    match cli.command {
        Command::Enqueue { job_json } => {
            let spec = JobSpec::parse(&job_json)?;
            let mut store = Store::open(&db_path)?;
            let config = store.load_config()?;
            let job = store.insert(&spec, config.max_retries, Utc::now())?;
            println!("Job '{}' enqueued successfully", job.id);
            println!("  Command: {}", job.command);
            println!("  Max retries: {}", job.max_retries);
            if let Some(run_at) = job.run_at {
                println!("  Run at: {}", run_at.to_rfc3339());
            }
            if job.priority != 0 {
                println!("  Priority: {}", job.priority);
            }
            if let Some(timeout) = job.timeout_seconds {
                println!("  Timeout: {timeout}s");
            }
        }
        Command::List { state, limit } => {
            let filter = state.as_deref().map(JobState::from_str).transpose()?;
            let store = Store::open(&db_path)?;
            let jobs = store.list(filter, limit)?;
            match filter {
                Some(state) => println!("Jobs with state: {state}"),
                None => println!("All jobs"),
            }
            if jobs.is_empty() {
                println!("No jobs found.");
                return Ok(());
            }
            print_job_table(&jobs);
            println!("Total: {} job(s)", jobs.len());
        }
        Command::Info { job_id } => {
            let store = Store::open(&db_path)?;
            let job = store
                .get(&job_id)?
                .ok_or(queuectl::error::QueueError::JobNotFound(job_id))?;
            print_job_details(&job);
        }
        Command::Status => {
            let store = Store::open(&db_path)?;
            let now = Utc::now();
            let counts = store.counts_by_state()?;
            let active_workers = store.active_workers(now, 10)?;
            let metrics = store.metrics(now)?;

            println!("QueueCTL Status");
            println!();
            println!("  {:<20} {}", "Total Jobs", counts.total());
            println!("  {:<20} {}", "Pending", counts.pending);
            println!("  {:<20} {}", "Processing", counts.processing);
            println!("  {:<20} {}", "Completed", counts.completed);
            println!("  {:<20} {}", "Failed (Retrying)", counts.failed);
            println!("  {:<20} {}", "Dead (DLQ)", counts.dead);
            println!();
            println!("  {:<20} {}", "Active Workers", active_workers);
            println!(
                "  {:<20} {}",
                "Avg Duration",
                metrics
                    .avg_duration_ms
                    .map(|ms| format!("{ms} ms"))
                    .unwrap_or_else(|| "n/a".to_string())
            );
            println!(
                "  {:<20} {}",
                "Completed Last Min", metrics.completed_last_min
            );

            let recent = store.list(None, Some(10))?;
            if !recent.is_empty() {
                println!();
                println!("Recent jobs:");
                print_job_table(&recent);
            }
        }
        Command::Worker(WorkerCommand::Start { count }) => {
            let pool = WorkerPool::new(&db_path, count)?;
            pool.stop_on_signals()?;
            println!("Starting {count} worker(s), press Ctrl+C to stop gracefully");
            pool.run().await?;
        }
        Command::Workers(WorkersCommand::List) => {
            let store = Store::open(&db_path)?;
            let workers = store.list_workers()?;
            if workers.is_empty() {
                println!("No workers found.");
                return Ok(());
            }
            let now = Utc::now();
            println!(
                "{:<28} {:>8} {:<27} {:>14} {}",
                "ID", "PID", "Started", "Heartbeat Age", "Status"
            );
            for worker in workers {
                let age = now
                    .signed_duration_since(worker.last_heartbeat)
                    .num_seconds();
                let status = if worker.stopped_at.is_some() {
                    "stopped"
                } else if worker.is_active(now, 10) {
                    "active"
                } else {
                    "stale"
                };
                println!(
                    "{:<28} {:>8} {:<27} {:>13}s {}",
                    worker.id,
                    worker.pid,
                    worker.started_at.to_rfc3339(),
                    age,
                    status
                );
            }
        }
        Command::Config(ConfigCommand::Show) => {
            let store = Store::open(&db_path)?;
            let config = store.load_config()?;
            println!("Current configuration:");
            for (key, value) in config.entries() {
                println!("  {key:<22} {value}");
            }
        }
        Command::Config(ConfigCommand::Set { key, value }) => {
            let mut store = Store::open(&db_path)?;
            store.config_set(&key, &value)?;
            println!("Configuration updated: {key} = {value}");
        }
        Command::Dlq(DlqCommand::List) => {
            let store = Store::open(&db_path)?;
            let jobs = store.list(Some(JobState::Dead), None)?;
            println!("Dead Letter Queue");
            if jobs.is_empty() {
                println!("No jobs in DLQ.");
                return Ok(());
            }
            print_job_table(&jobs);
            println!("Total: {} job(s) in DLQ", jobs.len());
        }
        Command::Dlq(DlqCommand::Retry { job_id }) => {
            let mut store = Store::open(&db_path)?;
            let job = store.dlq_retry(&job_id, Utc::now())?;
            println!("Job '{}' moved from DLQ to pending queue", job.id);
        }
        Command::Web(WebCommand::Start { port }) => {
            let store = Store::open(&db_path)?;
            let addr: SocketAddr = ([0, 0, 0, 0], port).into();
            let state = DashboardState {
                store: Arc::new(Mutex::new(store)),
            };
            run_dashboard(addr, state).await;
        }
    }

    Ok(())
}

fn print_job_table(jobs: &[Job]) {
    println!(
        "{:<20} {:<32} {:<10} {:>8} {:<19} {}",
        "Job ID", "Command", "State", "Attempts", "Created At", "Error"
    );
    for job in jobs {
        let attempts = format!("{}/{}", job.attempts, job.max_retries);
        println!(
            "{:<20} {:<32} {:<10} {:>8} {:<19} {}",
            ellipsize(&job.id, 20),
            ellipsize(&job.command, 32),
            job.state,
            attempts,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            ellipsize(job.error_message.as_deref().unwrap_or(""), 40),
        );
    }
}

fn print_job_details(job: &Job) {
    println!("Job details:");
    println!("  ID:            {}", job.id);
    println!("  Command:       {}", job.command);
    println!("  State:         {}", job.state);
    println!("  Attempts:      {}/{}", job.attempts, job.max_retries);
    println!("  Priority:      {}", job.priority);
    println!(
        "  Created At:    {}",
        job.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Updated At:    {}",
        job.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(run_at) = job.run_at {
        println!("  Run At:        {}", run_at.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(timeout) = job.timeout_seconds {
        println!("  Timeout:       {timeout}s");
    }
    if let Some(completed_at) = job.completed_at {
        println!(
            "  Completed At:  {}",
            completed_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if let Some(next_retry_at) = job.next_retry_at {
        println!(
            "  Next Retry At: {}",
            next_retry_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if let Some(duration_ms) = job.duration_ms {
        println!("  Duration:      {duration_ms} ms");
    }
    if let Some(error) = &job.error_message {
        println!();
        println!("Error message:");
        println!("{error}");
    }
    if let Some(stdout) = &job.last_stdout {
        println!();
        println!("Stdout (tail):");
        println!("{stdout}");
    }
    if let Some(stderr) = &job.last_stderr {
        println!();
        println!("Stderr (tail):");
        println!("{stderr}");
    }
}

fn ellipsize(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
