//! opqueue CLI — drive a serial operation queue from the terminal.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use opqueue::config::Config;
use opqueue::dispatch::ChannelDispatcher;
use opqueue::executor::{SerialExecutor, TokioPool};
use opqueue::queue::OperationQueue;
use opqueue::telemetry::{TelemetryConfig, init_telemetry};
use opqueue::{CancellationToken, Operation, OperationId, Outcome};
use tracing::info;

#[derive(Parser)]
#[command(name = "opqueue", about = "Serial operation queue")]
struct Cli {
    /// TOML config file (environment variables are used otherwise)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit sleeping operations and report the order they finish in
    Demo {
        /// Number of operations, identified "0".."count-1"
        #[arg(long, default_value_t = 26)]
        count: usize,
        /// How long each body sleeps
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
        /// Identifiers to cancel right after submission
        #[arg(long)]
        cancel: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

/// Sleeps in short slices, checking for cancellation between them.
struct SleepOperation {
    id: OperationId,
    delay: Duration,
    log: Arc<Mutex<Vec<String>>>,
}

impl Operation for SleepOperation {
    fn id(&self) -> &OperationId {
        &self.id
    }

    fn run(&self, cancel: &CancellationToken) -> Outcome {
        let slice = Duration::from_millis(10);
        let mut slept = Duration::ZERO;
        while slept < self.delay {
            if cancel.is_cancelled() {
                return Outcome::new("CANCELLED");
            }
            std::thread::sleep(slice);
            slept += slice;
        }
        Outcome::new(self.id.to_string())
    }

    fn on_complete(&self, outcome: Outcome) {
        if let Ok(mut log) = self.log.lock() {
            log.push(outcome.status().to_string());
        }
    }

    fn on_cancel(&self) {
        println!("cancelled: {}", self.id);
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    match cli.command {
        Command::Config => {
            println!("{config:#?}");
            Ok(())
        }
        Command::Demo {
            count,
            delay_ms,
            cancel,
        } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .max_blocking_threads(config.worker_threads)
                .enable_all()
                .build()?;
            runtime.block_on(cmd_demo(config, count, delay_ms, cancel))
        }
    }
}

async fn cmd_demo(
    config: Config,
    count: usize,
    delay_ms: u64,
    cancel: Vec<String>,
) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "opqueue".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let (dispatcher, mut callbacks) = ChannelDispatcher::new();
    let executor = SerialExecutor::new(Arc::new(TokioPool::current()?));
    let queue = OperationQueue::with_options(executor, Arc::new(dispatcher), config.queue_options());

    let log = Arc::new(Mutex::new(Vec::new()));
    for i in 0..count {
        queue.add(Arc::new(SleepOperation {
            id: OperationId::from(i.to_string()),
            delay: Duration::from_millis(delay_ms),
            log: Arc::clone(&log),
        }));
    }
    info!(count = queue.count(), pending = queue.count_pending(), "operations submitted");

    for id in &cancel {
        let accepted = queue.cancel(id);
        println!("cancel {id}: {}", if accepted { "accepted" } else { "not found" });
    }

    // Act as the owning thread: drain callbacks until the queue is empty.
    while queue.count() > 0 {
        callbacks.run_pending();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    callbacks.run_pending();

    let finished = log.lock().map(|log| log.clone()).unwrap_or_default();
    println!("completed in order: {}", finished.join(" "));
    Ok(())
}
