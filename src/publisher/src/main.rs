//! Publishes a scripted batch of messages onto the pipeline's main queue.
//!
//! `--rabbitmq` switches the transport from the process-local queue to a
//! RabbitMQ-backed one; the snapshot store records the batch before
//! publishing so it can be replayed if the process crashes mid-batch.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use pipeline_core::{LocalQueue, Message, PipelineConfig, Queue, SnapshotStore};
use pipeline_transport_rabbitmq::RabbitMqQueue;

#[derive(Parser, Debug)]
#[command(name = "publisher")]
#[command(about = "Publishes a scripted batch of messages onto the pipeline's main queue")]
struct Cli {
    /// Publish through RabbitMQ instead of the process-local queue.
    #[arg(long)]
    rabbitmq: bool,
}

fn scripted_batch() -> Vec<Message> {
    vec![
        Message::new("TestSystem", "Test payload"),
        Message::new("OrderSystem", "Order #1042 created"),
        Message::new("BillingSystem", "Invoice #77 issued"),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "publisher=info".into()),
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

    let batch = scripted_batch();

    let snapshot = SnapshotStore::new(&config.snapshot_path)?;
    snapshot.save(&batch)?;

    let mut published = 0usize;
    for msg in batch {
        let id = msg.id;
        match queue.enqueue(msg).await {
            Ok(()) => {
                published += 1;
                info!(message_id = %id, "published");
            }
            Err(e) => error!(message_id = %id, error = %e, "failed to publish"),
        }
    }

    info!(published, "publisher finished");
    Ok(())
}
