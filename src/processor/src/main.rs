//! Drains the pipeline's main queue, committing each message through the
//! sink behind the retry policy and circuit breaker.
//!
//! `--rabbitmq` switches the transport from the process-local queue to a
//! RabbitMQ-backed one. Exit code is 0 whenever the drain loop completes,
//! independent of how many messages ended up in the dead-letter queue.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use pipeline_circuitbreaker::CircuitBreaker;
use pipeline_core::{
    AuditStore, CoreError, ErrorLog, LocalQueue, PipelineConfig, Queue, SqliteAuditStore,
    SqliteSink,
};
use pipeline_retry::RetryPolicy;
use pipeline_transport_rabbitmq::RabbitMqQueue;
use pipeline_worker::{ProcessOutcome, Worker};

#[derive(Parser, Debug)]
#[command(name = "processor")]
#[command(about = "Drains the pipeline's main queue, committing messages through the sink")]
struct Cli {
    /// Consume from RabbitMQ instead of the process-local queue.
    #[arg(long)]
    rabbitmq: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "processor=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();

    let queue: Arc<dyn Queue> = if cli.rabbitmq {
        match RabbitMqQueue::connect(&config.amqp_url, &config.queue_name).await {
            Ok(queue) => Arc::new(queue),
            Err(e) => {
                error!(error = %e, "failed to connect to RabbitMQ");
                std::process::exit(1);
            }
        }
    } else {
        Arc::new(LocalQueue::default())
    };

    let sink = Arc::new(SqliteSink::connect(&config.sqlite_path).await?);
    let audit = Arc::new(SqliteAuditStore::connect(&config.audit_sqlite_path).await?);
    let error_log = Arc::new(ErrorLog::new(&config.error_log_path)?);
    let retry = RetryPolicy::builder()
        .max_retries(config.max_retries as i64)
        .build()?;
    let breaker = Arc::new(
        CircuitBreaker::builder()
            .failure_threshold(config.breaker_failure_threshold)
            .timeout(config.breaker_timeout)
            .build::<CoreError>()
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    let worker = Worker::builder()
        .queue(Arc::clone(&queue))
        .sink(sink)
        .error_log(error_log)
        .audit(Arc::clone(&audit) as Arc<dyn AuditStore>)
        .retry(retry)
        .breaker(breaker)
        .build()?;

    let outcomes = worker.process_all().await;
    let mut completed = 0usize;
    let mut failed = 0usize;
    for outcome in &outcomes {
        match outcome {
            ProcessOutcome::Completed => {
                completed += 1;
                println!("completed");
            }
            ProcessOutcome::Failed => {
                failed += 1;
                println!("failed (moved to DLQ)");
            }
            ProcessOutcome::NoWork => {}
        }
    }

    let stats = audit.statistics().await?;
    println!(
        "processed {completed} completed, {failed} failed; audit: total={} success_rate={:.1}%",
        stats.total, stats.success_rate
    );
    info!(completed, failed, "processor finished");

    Ok(())
}
