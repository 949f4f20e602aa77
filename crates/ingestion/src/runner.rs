//! Source runner - background loop feeding the relay channel

use std::sync::Arc;

use contracts::{ContractError, Message, MessageSource, OffsetPolicy, RecordOrigin};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{IngestionMetrics, SourceConfig};
use crate::error::{CompletionReason, IngestionError, SourceExit};
use crate::offsets::OffsetTracker;

/// Publish tasks report settled offsets through this sender
pub type SettlementSender = mpsc::UnboundedSender<RecordOrigin>;

/// Owns a `MessageSource` until it is started
pub struct SourceRunner<S> {
    source: S,
    config: SourceConfig,
    metrics: Arc<IngestionMetrics>,
}

impl<S: MessageSource + 'static> SourceRunner<S> {
    /// Create a new runner
    pub fn new(source: S, config: SourceConfig) -> Self {
        Self {
            source,
            config,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Create the outbound channel and start the loop
    pub fn spawn(self) -> (SourceHandle, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        (self.start(tx), rx)
    }

    /// Start polling into `outbound`
    ///
    /// The loop runs until the stream ends, a fatal error occurs, `stop` is
    /// requested or `outbound` is closed. `outbound` is dropped on exit, which
    /// the dispatcher observes as completion.
    pub fn start(self, outbound: mpsc::Sender<Message>) -> SourceHandle {
        let name = self.source.name().to_string();
        let (stop_tx, stop_rx) = watch::channel(false);

        let (settle_tx, settle_rx) = match self.config.offset_policy {
            OffsetPolicy::AfterPublish => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Some(tx), Some(rx))
            }
            OffsetPolicy::Auto => (None, None),
        };

        let worker_metrics = Arc::clone(&self.metrics);
        let task = tokio::spawn(source_loop(
            self.source,
            outbound,
            stop_rx,
            settle_rx,
            worker_metrics,
        ));

        SourceHandle {
            name,
            stop_tx,
            settle_tx,
            metrics: self.metrics,
            task,
        }
    }
}

/// Handle to a running source task
pub struct SourceHandle {
    name: String,
    stop_tx: watch::Sender<bool>,
    settle_tx: Option<SettlementSender>,
    metrics: Arc<IngestionMetrics>,
    task: JoinHandle<SourceExit>,
}

impl SourceHandle {
    /// Source name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// Settlement channel, present under `OffsetPolicy::AfterPublish`
    pub fn settlement_sender(&self) -> Option<SettlementSender> {
        self.settle_tx.clone()
    }

    /// Ask the loop to stop after the current poll
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the task and return its exit status
    ///
    /// Under `AfterPublish`, pending settlements are committed before the
    /// task ends, so call this after the dispatcher has drained.
    #[instrument(name = "source_handle_join", skip(self), fields(source = %self.name))]
    pub async fn join(self) -> SourceExit {
        let Self {
            name,
            stop_tx,
            settle_tx,
            task,
            ..
        } = self;
        drop(settle_tx);

        let exit = match task.await {
            Ok(exit) => exit,
            Err(e) => {
                error!(source = %name, error = ?e, "Source task panicked");
                SourceExit::Failed(IngestionError::TaskAborted { source_name: name })
            }
        };
        drop(stop_tx);
        exit
    }
}

enum Step {
    Stop,
    Settled(Option<RecordOrigin>),
    Polled(Option<Result<Message, ContractError>>),
}

async fn next_settlement(
    rx: &mut Option<mpsc::UnboundedReceiver<RecordOrigin>>,
) -> Option<RecordOrigin> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[instrument(
    name = "source_loop",
    skip_all,
    fields(source = %source.name())
)]
async fn source_loop<S: MessageSource>(
    mut source: S,
    outbound: mpsc::Sender<Message>,
    mut stop_rx: watch::Receiver<bool>,
    mut settle_rx: Option<mpsc::UnboundedReceiver<RecordOrigin>>,
    metrics: Arc<IngestionMetrics>,
) -> SourceExit {
    let name = source.name().to_string();
    let mut tracker = OffsetTracker::new();
    let track_offsets = settle_rx.is_some();

    info!(source = %name, track_offsets, "Source started");

    let exit = loop {
        let step = tokio::select! {
            biased;
            _ = stop_rx.changed() => Step::Stop,
            settled = next_settlement(&mut settle_rx) => Step::Settled(settled),
            polled = source.poll() => Step::Polled(polled),
        };

        match step {
            Step::Stop => {
                info!(source = %name, "Stop requested");
                break SourceExit::Completed(CompletionReason::Stopped);
            }
            Step::Settled(Some(origin)) => {
                commit_settled(&mut source, &mut tracker, &origin, &metrics);
            }
            Step::Settled(None) => {
                settle_rx = None;
            }
            Step::Polled(Some(Ok(message))) => {
                metrics.record_received(&name);
                if track_offsets {
                    tracker.track(&message.origin);
                }
                if outbound.send(message).await.is_err() {
                    warn!(source = %name, "Outbound channel closed");
                    break SourceExit::Completed(CompletionReason::DownstreamClosed);
                }
            }
            Step::Polled(Some(Err(e))) if e.is_fatal() => {
                error!(source = %name, error = %e, "Fatal source error, terminating");
                break SourceExit::Failed(IngestionError::SourceFailed {
                    source_name: name.clone(),
                    error: e,
                });
            }
            Step::Polled(Some(Err(e))) => {
                metrics.record_poll_error(&name);
                warn!(source = %name, error = %e, "Poll failed, retrying");
            }
            Step::Polled(None) => {
                info!(source = %name, "Stream ended");
                break SourceExit::Completed(CompletionReason::EndOfStream);
            }
        }
    };

    // Closing the channel lets the dispatcher drain and finish
    drop(outbound);

    if exit.is_clean() && track_offsets {
        if let Some(mut rx) = settle_rx {
            while let Some(origin) = rx.recv().await {
                commit_settled(&mut source, &mut tracker, &origin, &metrics);
            }
        }
        match source.flush_commits() {
            Ok(()) => debug!(source = %name, "Final offsets flushed"),
            Err(e) => {
                metrics.record_commit(false);
                warn!(source = %name, error = %e, "Final offset flush failed");
            }
        }
    }

    let pending = tracker.pending_count();
    if pending > 0 {
        debug!(source = %name, pending, "Offsets left uncommitted");
    }
    info!(source = %name, exit = ?exit, "Source stopped");
    exit
}

fn commit_settled<S: MessageSource>(
    source: &mut S,
    tracker: &mut OffsetTracker,
    origin: &RecordOrigin,
    metrics: &IngestionMetrics,
) {
    let Some(next_offset) = tracker.settle(origin) else {
        return;
    };
    match source.commit(&origin.topic, origin.partition, next_offset) {
        Ok(()) => {
            metrics.record_commit(true);
            debug!(
                topic = %origin.topic,
                partition = origin.partition,
                next_offset,
                "Offset committed"
            );
        }
        Err(e) => {
            metrics.record_commit(false);
            warn!(
                topic = %origin.topic,
                partition = origin.partition,
                next_offset,
                error = %e,
                "Offset commit failed"
            );
        }
    }
}
