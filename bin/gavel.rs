use std::sync::Arc;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use gavel::{
    CronScheduler, Database, IngestMessage, IngestService, LedgerWriter, OutboxRelay,
    PriceResolver, RedpandaPublisher, Settings, TakeEnricher,
};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    let cancellation_token = CancellationToken::new();

    let db = Arc::new(
        Database::new(settings.clone())
            .await
            .context("Failed to initialize database connection")?,
    );

    // Ingestion channel: the chain scanner and price-source adapters push
    // lifecycle events, price observations, and scan checkpoints here.
    let (ingest_tx, ingest_rx) = mpsc::channel::<IngestMessage>(128);

    let writer = LedgerWriter::new(db.postgres.clone());
    let ingest_service = IngestService::new(writer, db.postgres.clone(), ingest_rx);

    let ingest_token = cancellation_token.child_token();
    let ingest_handle = tokio::spawn(async move {
        if let Err(e) = ingest_service.run(ingest_token).await {
            error!("Ingest service failed: {:#}", e);
        }
    });

    info!("Ingest service started");

    // Read-side enrichment stack, shared by the cron refresh job.
    let resolver = PriceResolver::new(db.postgres.clone());
    let enricher = TakeEnricher::new(resolver);

    // Outbox relay workers drain accepted writes to the stream consumer.
    let mut relay_handles = Vec::new();
    if let Some(redpanda) = settings.redpanda.as_ref() {
        if let Some(publisher) = RedpandaPublisher::new(redpanda) {
            let publisher = Arc::new(publisher);
            for worker_id in 0..settings.relay.workers {
                let relay = OutboxRelay::new(
                    db.postgres.clone(),
                    publisher.clone(),
                    settings.relay.clone(),
                    worker_id,
                );
                let relay_token = cancellation_token.child_token();
                relay_handles.push(tokio::spawn(async move {
                    if let Err(e) = relay.run(relay_token).await {
                        error!("Outbox relay worker failed: {:#}", e);
                    }
                }));
            }
            info!("Outbox relay started ({} workers)", settings.relay.workers);
        }
    } else {
        info!("Redpanda not configured - outbox entries will accumulate until a relay runs");
    }

    // Create and spawn cron scheduler for background jobs
    // (taker summary cache refresh)
    let cron_scheduler = CronScheduler::new(db.clone(), enricher, settings.cron.clone());

    let cron_token = cancellation_token.child_token();
    let cron_handle = tokio::spawn(async move {
        if let Err(e) = cron_scheduler.run(cron_token).await {
            error!("Cron scheduler failed: {:#}", e);
        }
    });

    info!("Cron scheduler started - background jobs will run periodically");

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    // Set up graceful shutdown signal handler
    info!("Ledger running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    // Cancel all running tasks
    info!("Finishing all tasks...");

    cancellation_token.cancel();

    // Wait for cron scheduler to stop
    info!("Waiting for cron scheduler to stop...");
    let _ = cron_handle.await;

    // Wait for relay workers to finish their in-flight pages
    info!("Waiting for outbox relay to stop...");
    for handle in relay_handles {
        let _ = handle.await;
    }

    // Shutdown the ingest service
    info!("Shutting down ingest service...");
    let _ = ingest_tx.send(IngestMessage::Shutdown).await;
    let _ = ingest_handle.await;

    info!("All services stopped");
    Ok(())
}
