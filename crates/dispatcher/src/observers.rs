//! Local observers for relayed payloads

use std::io::{self, Write};

use contracts::{Message, Observer, ObserverKind};
use tracing::{info, warn};

/// Prints each payload as lossy UTF-8 on its own stdout line
///
/// A write error (closed pipe) disables printing for the rest of the run;
/// relaying continues.
#[derive(Debug, Default)]
pub struct StdoutObserver {
    disabled: bool,
}

impl StdoutObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_payload<W: Write>(&mut self, out: &mut W, message: &Message) {
        if self.disabled {
            return;
        }
        if let Err(e) = writeln!(out, "{}", message.payload_text()) {
            warn!(error = %e, "stdout unavailable, payloads are no longer printed");
            self.disabled = true;
        }
    }
}

impl Observer for StdoutObserver {
    fn name(&self) -> &str {
        "stdout"
    }

    fn observe(&mut self, message: &Message) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_payload(&mut out, message);
    }
}

/// Emits each payload through tracing at info level
#[derive(Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn name(&self) -> &str {
        "log"
    }

    fn observe(&mut self, message: &Message) {
        info!(
            topic = %message.origin.topic,
            partition = message.origin.partition,
            offset = message.origin.offset,
            payload = %message.payload_text(),
            "Relayed"
        );
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn name(&self) -> &str {
        "none"
    }

    fn observe(&mut self, _message: &Message) {}
}

/// Build the observer selected in configuration
pub fn observer_for(kind: ObserverKind) -> Box<dyn Observer> {
    match kind {
        ObserverKind::Stdout => Box::new(StdoutObserver::new()),
        ObserverKind::Log => Box::new(LogObserver),
        ObserverKind::None => Box::new(NullObserver),
    }
}
