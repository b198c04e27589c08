//! # Run Context
//!
//! Per-run state passed explicitly to the batch transcoder and the auditor:
//! the tracing span that tags every log line of the run, the cancellation
//! receiver and the output switches.
//!
//! ## Cancellation
//! A `tokio::sync::broadcast` channel. The sender side is kept by whoever can
//! stop the run (the CLI wires Ctrl-C to it); the receiver lives here and is
//! polled once per entry with [`RunContext::should_stop`].

use tokio::sync::broadcast;
use tracing::{debug, Span};

pub struct RunContext {
    span: Span,
    stop_receiver: Option<broadcast::Receiver<()>>,
    stopped: bool,
    /// Emit JSON events on stdout
    pub json_output: bool,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl RunContext {
    /// Context for the operation named `operation`, without cancellation
    pub fn new(operation: &'static str) -> Self {
        Self {
            span: tracing::info_span!("run", operation),
            stop_receiver: None,
            stopped: false,
            json_output: false,
            show_progress: false,
        }
    }

    pub fn with_cancellation(mut self, stop_receiver: broadcast::Receiver<()>) -> Self {
        self.stop_receiver = Some(stop_receiver);
        self
    }

    pub fn with_json_output(mut self, json_output: bool) -> Self {
        self.json_output = json_output;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Span every log line of this run is recorded under
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Progress bar is drawn only for human output
    pub fn progress_enabled(&self) -> bool {
        self.show_progress && !self.json_output
    }

    /// Check whether a stop was requested. Once true, stays true.
    pub fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }

        if let Some(ref mut receiver) = self.stop_receiver {
            match receiver.try_recv() {
                Ok(()) => {
                    debug!("Stop signal received");
                    self.stopped = true;
                }
                Err(broadcast::error::TryRecvError::Empty) => {}
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    debug!("Stop signal received (lagged)");
                    self.stopped = true;
                }
                // Sender gone without sending: nobody can stop us anymore
                Err(broadcast::error::TryRecvError::Closed) => {
                    self.stop_receiver = None;
                }
            }
        }

        self.stopped
    }

    /// Create a cancellation channel for a run
    pub fn create_cancellation_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
        broadcast::channel(1)
    }
}
