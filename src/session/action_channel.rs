//! Action Channel for asynchronous event processing
//!
//! Input sources (stdin reader, Ctrl+C handler) only forward messages here;
//! the session manager is the single consumer.

use anyhow::Result;
use tokio::sync::mpsc;

/// Session events for communication between components
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Shutdown request
    ShutdownRequested,
    /// Error raised by an input source
    Error { message: String },
    /// A line typed by the user
    UserLine { text: String },
    /// Standard input reached end of file
    InputClosed,
}

/// Action channel for event processing
pub struct ActionChannel {
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl Clone for ActionChannel {
    fn clone(&self) -> Self {
        Self {
            event_tx: self.event_tx.clone(),
            event_rx: None, // Receivers cannot be cloned
        }
    }
}

impl ActionChannel {
    /// Create a new ActionChannel
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Send event to channel
    pub fn send_event(&self, event: SessionEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .map_err(|e| anyhow::anyhow!("Failed to send event: {}", e))
    }

    /// Get next event from channel
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if let Some(event_rx) = &mut self.event_rx {
            event_rx.recv().await
        } else {
            None
        }
    }

    /// Get event sender for input sources
    pub fn event_tx(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.event_tx.clone()
    }

    /// Forward a typed line
    pub fn send_line(&self, text: impl Into<String>) -> Result<()> {
        self.send_event(SessionEvent::UserLine { text: text.into() })
    }

    /// Send error event
    pub fn send_error(&self, message: String) -> Result<()> {
        self.send_event(SessionEvent::Error { message })
    }

    /// Send shutdown request
    pub fn request_shutdown(&self) -> Result<()> {
        self.send_event(SessionEvent::ShutdownRequested)
    }
}

impl Default for ActionChannel {
    fn default() -> Self {
        Self::new()
    }
}
