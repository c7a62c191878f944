//! Output sinks for the interactive session
//!
//! The session only ever talks to an [`OutputSink`]: the console sink for the
//! terminal and the memory sink for tests.

/// Colored console output
pub mod cli;

/// Recording sink used by tests
pub mod memory;

pub use cli::ConsoleSink;
pub use memory::MemorySink;

/// Role of an appended line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Echo of what the user typed
    User,
    /// Pipeline output and prompts
    Assistant,
    /// Client notices and acknowledgements
    System,
    Error,
    /// Plan awaiting approval
    Confirmation,
}

/// Write-only rendering target
pub trait OutputSink {
    /// Append a line or block to the visible log
    fn append(&mut self, kind: LineKind, text: &str);

    /// Replace the transient status line; `None` clears it
    fn set_status(&mut self, status: Option<&str>);

    fn set_input_enabled(&mut self, enabled: bool);

    fn set_connection(&mut self, connected: bool);
}
