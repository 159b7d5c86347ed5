//! Tether
//!
//! Runs script files on a remote worker through the scheduler, then prints
//! the final state of every job as JSON.
//!
//! Configuration comes from the environment (see `SchedulerConfig::from_env`),
//! with command-line flags taking precedence.

mod script;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::script::ScriptJob;
use tether_client::HttpRemoteWorker;
use tether_scheduler::{
    Job, JobSnapshot, JobStatus, Scheduler, SchedulerConfig, SchedulerListener,
};

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Run scripts on a remote worker", long_about = None)]
struct Cli {
    /// Worker URL
    #[arg(long, env = "TETHER_WORKER_URL")]
    worker_url: Option<String>,

    /// Maximum number of jobs on the worker at once
    #[arg(short = 'c', long)]
    max_concurrency: Option<usize>,

    /// Script files to run, in submission order
    #[arg(required = true)]
    scripts: Vec<PathBuf>,
}

/// Logs jobs as they start and finish
struct LoggingListener;

impl SchedulerListener for LoggingListener {
    fn job_started(&self, scheduler: &Scheduler, job: &Job) {
        info!("[{}] job {} started", scheduler.name(), job.id());
    }

    fn job_finished(&self, scheduler: &Scheduler, job: &Job) {
        info!(
            "[{}] job {} finished: {}",
            scheduler.name(),
            job.id(),
            job.status()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether=info,tether_scheduler=info,tether_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = SchedulerConfig::from_env().context("Failed to load configuration")?;
    if let Some(worker_url) = cli.worker_url {
        config.worker_url = worker_url;
    }
    if let Some(max_concurrency) = cli.max_concurrency {
        config.max_concurrency = max_concurrency;
    }
    config.validate()?;
    info!(
        "Loaded configuration: name={}, worker_url={}, max_concurrency={}",
        config.name, config.worker_url, config.max_concurrency
    );

    let mut scripts = Vec::with_capacity(cli.scripts.len());
    for path in &cli.scripts {
        let script = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        scripts.push((path, script));
    }

    let worker = Arc::new(HttpRemoteWorker::new(config.worker_url.clone()));
    worker.reference();

    let listener: Arc<dyn SchedulerListener> = Arc::new(LoggingListener);
    let scheduler = Scheduler::new(&config, worker.clone(), Some(listener));
    let dispatch = scheduler.start();

    let mut jobs = Vec::with_capacity(scripts.len());
    for (path, script) in scripts {
        let job = Arc::new(Job::new(ScriptJob::new(worker.client(), script)));
        info!("Submitting {} as job {}", path.display(), job.id());
        scheduler.submit(Arc::clone(&job))?;
        jobs.push(job);
    }

    wait_for_jobs(&scheduler, &jobs).await;

    scheduler.stop();
    dispatch.await.context("Dispatch loop panicked")?;
    worker.dereference();

    let snapshots: Vec<JobSnapshot> = jobs.iter().map(|job| job.snapshot()).collect();
    println!("{}", serde_json::to_string_pretty(&snapshots)?);

    let unfinished = snapshots
        .iter()
        .filter(|snapshot| snapshot.status != JobStatus::Finished)
        .count();
    if unfinished > 0 {
        anyhow::bail!("{} of {} job(s) did not finish", unfinished, snapshots.len());
    }

    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
/// Waits until nothing is queued or running and every job has settled
async fn wait_for_jobs(scheduler: &Scheduler, jobs: &[Arc<Job>]) {
    let mut ticker = time::interval(Duration::from_millis(200));

    loop {
        ticker.tick().await;

        let idle = scheduler.jobs_waiting().is_empty() && scheduler.jobs_running().is_empty();
        if idle && jobs.iter().all(|job| job.status().is_terminal()) {
            return;
        }
    }
}
