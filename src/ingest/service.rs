//! Ingestion service loop.
//!
//! Receives pushed messages from the external collaborators (chain scanner,
//! price-source adapters) over an mpsc channel and applies them: lifecycle
//! events go through the ledger writer, price observations and scan
//! checkpoints go straight to their append-only tables.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::db::models::{ScanCheckpoint, TokenPrice};
use crate::db::PostgresClient;
use crate::ingest::event::{IngestOutcome, LifecycleEvent};
use crate::ingest::writer::LedgerWriter;

/// Message pushed into the ingestion channel.
#[derive(Debug)]
pub enum IngestMessage {
    /// Lifecycle event from the chain scanner
    Event(LifecycleEvent),
    /// Price observation from a price-source adapter
    Price(TokenPrice),
    /// Scan progress update on behalf of the scanner
    Checkpoint(ScanCheckpoint),
    /// Shutdown signal
    Shutdown,
}

/// Drains the ingestion channel until cancellation or shutdown.
pub struct IngestService {
    writer: LedgerWriter,
    postgres: Arc<PostgresClient>,
    rx: mpsc::Receiver<IngestMessage>,
}

impl IngestService {
    pub fn new(
        writer: LedgerWriter,
        postgres: Arc<PostgresClient>,
        rx: mpsc::Receiver<IngestMessage>,
    ) -> Self {
        Self {
            writer,
            postgres,
            rx,
        }
    }

    pub async fn run(mut self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Ingest service cancelled, draining remaining messages...");
                    // Drain whatever is already queued so accepted scanner
                    // pushes are not lost on shutdown.
                    while let Ok(message) = self.rx.try_recv() {
                        if matches!(message, IngestMessage::Shutdown) {
                            break;
                        }
                        self.handle(message).await;
                    }
                    return Ok(());
                },
                message = self.rx.recv() => {
                    match message {
                        Some(IngestMessage::Shutdown) | None => {
                            info!("Ingest service shutting down");
                            return Ok(());
                        },
                        Some(message) => self.handle(message).await,
                    }
                },
            }
        }
    }

    async fn handle(&self, message: IngestMessage) {
        match message {
            IngestMessage::Event(event) => match self.writer.ingest(&event).await {
                Ok(IngestOutcome::Accepted) => {
                    debug!(
                        "Accepted {} {}:{} on chain {}",
                        event.event_type(),
                        event.transaction_hash(),
                        event.log_index(),
                        event.chain_id()
                    );
                },
                Ok(IngestOutcome::Duplicate) => {
                    debug!(
                        "Duplicate {} {}:{} on chain {}",
                        event.event_type(),
                        event.transaction_hash(),
                        event.log_index(),
                        event.chain_id()
                    );
                },
                Ok(IngestOutcome::Inconsistent) => {
                    // Already parked in the operator queue by the writer.
                    warn!(
                        "Inconsistent {} {}:{} on chain {}",
                        event.event_type(),
                        event.transaction_hash(),
                        event.log_index(),
                        event.chain_id()
                    );
                },
                Err(e) => {
                    error!("Failed to ingest {}: {:#}", event.event_type(), e);
                },
            },
            IngestMessage::Price(price) => {
                if let Err(e) = self.postgres.record_price_observation(&price).await {
                    error!(
                        "Failed to record price observation for {} on chain {}: {:#}",
                        price.token_address, price.chain_id, e
                    );
                }
            },
            IngestMessage::Checkpoint(checkpoint) => {
                if let Err(e) = self.postgres.set_scan_checkpoint(&checkpoint).await {
                    error!(
                        "Failed to persist scan checkpoint for chain {} source {}: {:#}",
                        checkpoint.chain_id, checkpoint.source_id, e
                    );
                }
            },
            IngestMessage::Shutdown => {},
        }
    }
}
