use super::{LineKind, OutputSink};

/// Sink that records everything it receives
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub lines: Vec<(LineKind, String)>,
    pub status: Option<String>,
    /// Every status value ever set, including clears
    pub status_history: Vec<Option<String>>,
    pub input_enabled: bool,
    pub connected: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texts of all lines of one kind
    pub fn texts(&self, kind: LineKind) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    /// Whether any line contains the needle
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|(_, text)| text.contains(needle))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.status_history.clear();
    }
}

impl OutputSink for MemorySink {
    fn append(&mut self, kind: LineKind, text: &str) {
        self.lines.push((kind, text.to_string()));
    }

    fn set_status(&mut self, status: Option<&str>) {
        self.status = status.map(str::to_string);
        self.status_history.push(self.status.clone());
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    fn set_connection(&mut self, connected: bool) {
        self.connected = connected;
    }
}
