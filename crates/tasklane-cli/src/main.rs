use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::{Duration, Instant, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tasklane_core::domain::{HandlerError, NewTask, Priority, TaskId};
use tasklane_core::handlers::{BUILTIN_TASK_TYPES, register_builtin_handlers};
use tasklane_core::impls::{CannedAiBackend, JsonFileTaskStore};
use tasklane_core::typed::{Handler, TaskContext, TaskParams};
use tasklane_core::{Processor, ProcessorBuilder, ProcessorConfig};

#[derive(Debug, Parser)]
#[command(name = "tasklane", about = "Background task processor")]
struct Cli {
    /// JSON config file. `TASKLANE_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Persist tasks to this JSON file instead of memory.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit the demo tasks and poll until they settle.
    Run {
        /// Give up waiting after this many seconds.
        #[arg(long, default_value_t = 90)]
        wait_secs: u64,
    },
    /// Print one persisted task.
    Status { task_id: TaskId },
    /// Print recent execution log entries.
    History {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

/// Fails a fixed number of times before succeeding, to show the retry path.
#[derive(Debug, Serialize, Deserialize)]
struct Flaky {
    name: String,
}

impl TaskParams for Flaky {
    const TYPE: &'static str = "demo.flaky";
}

struct FlakyHandler {
    remaining_failures: AtomicU32,
}

impl FlakyHandler {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Handler<Flaky> for FlakyHandler {
    async fn handle(&self, params: Flaky, ctx: TaskContext) -> Result<Value, HandlerError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(HandlerError::failed(format!(
                "intentional failure (left={left})"
            )));
        }
        ctx.report_progress(100.0, "greeted").await;
        Ok(json!({ "success": true, "greeting": format!("Hello, {}!", params.name) }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let processor = Arc::new(build_processor(&cli).await?);

    match cli.command {
        Command::Run { wait_secs } => run_demo(&processor, Duration::from_secs(wait_secs)).await,
        Command::Status { task_id } => {
            let record = processor
                .get_task_status(task_id)
                .await?
                .with_context(|| format!("task {task_id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::History { owner, limit } => {
            let entries = processor.get_task_history(owner.as_deref(), limit).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(())
        }
    }
}

async fn build_processor(cli: &Cli) -> Result<Processor> {
    let config = ProcessorConfig::load(cli.config.as_deref()).context("loading config")?;

    let ai = Arc::new(
        CannedAiBackend::new().with_response("ping", "pong from the canned backend"),
    );
    let mut builder = register_builtin_handlers(ProcessorBuilder::new().config(config), ai)?
        .register::<Flaky, _>(FlakyHandler::new(1))?
        .expect_tasks(&BUILTIN_TASK_TYPES);

    if let Some(path) = &cli.store {
        let store = JsonFileTaskStore::open(path)
            .await
            .with_context(|| format!("opening task store {}", path.display()))?;
        builder = builder.store(Arc::new(store));
    }

    Ok(builder.build()?)
}

async fn run_demo(processor: &Arc<Processor>, wait: Duration) -> Result<()> {
    processor.start().await?;

    let submissions = vec![
        NewTask::new("file_processing", json!({ "file_type": "csv" })),
        NewTask::new("ai_processing", json!({ "prompt": "ping" }))
            .priority(Priority::High)
            .owner("demo"),
        NewTask::new("data_analysis", json!({ "dataset": [3.0, 1.0, 4.0, 1.0, 5.0] }))
            .priority(Priority::Urgent),
        NewTask::new(Flaky::TYPE, json!({ "name": "tasklane" })).owner("demo"),
        NewTask::new("report_generation", json!({ "sections": ["usage", "errors"] }))
            .priority(Priority::Low),
    ];

    let mut ids = Vec::with_capacity(submissions.len());
    for task in submissions {
        let id = processor.submit_task(task).await?;
        info!(task_id = %id, "demo task submitted");
        ids.push(id);
    }

    // Depends on the first task, so it runs only after that one completes.
    let dependent = processor
        .submit_task(
            NewTask::new("email_processing", json!({ "message_ids": ["m-1", "m-2"] }))
                .depends_on([ids[0]]),
        )
        .await?;
    ids.push(dependent);

    let settled = tokio::select! {
        settled = wait_until_settled(processor, &ids, wait) => settled?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, shutting down");
            false
        }
    };

    for id in &ids {
        if let Some(record) = processor.get_task_status(*id).await? {
            println!(
                "{} {:<20} {:<10} retries={} error={:?}",
                record.id, record.task_type, record.status, record.retry_count, record.error_message
            );
        }
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&processor.get_statistics().await?)?
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&processor.get_task_history(Some("demo"), 10).await?)?
    );

    if !processor.stop(Duration::from_secs(10)).await {
        warn!("some loops did not stop in time");
    }
    if !settled {
        anyhow::bail!("demo tasks did not settle within {}s", wait.as_secs());
    }
    Ok(())
}

async fn wait_until_settled(
    processor: &Processor,
    ids: &[TaskId],
    wait: Duration,
) -> Result<bool> {
    let deadline = Instant::now() + wait;
    loop {
        let mut pending = 0;
        for id in ids {
            match processor.get_task_status(*id).await? {
                Some(record) if record.status.is_terminal() => {}
                _ => pending += 1,
            }
        }
        if pending == 0 {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(Duration::from_millis(200)).await;
    }
}
