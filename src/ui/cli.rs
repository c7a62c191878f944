//! Console output
//!
//! Chat lines are appended to stdout; the transient status line is redrawn in
//! place with crossterm line clearing.

use std::io::{self, Stdout, Write};

use colored::Colorize;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use super::{LineKind, OutputSink};
use crate::config::Config;

const PROMPT: &str = "> ";

/// Terminal sink
pub struct ConsoleSink<W: Write = Stdout> {
    out: W,
    status: Option<String>,
    /// Whatever currently sits on the last line: status text or prompt
    transient_visible: bool,
    input_enabled: bool,
    connected: bool,
}

impl ConsoleSink<Stdout> {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for ConsoleSink<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            status: None,
            transient_visible: false,
            input_enabled: false,
            connected: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn clear_transient(&mut self) {
        if self.transient_visible {
            queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
            self.transient_visible = false;
        }
    }

    fn draw_transient(&mut self) {
        self.clear_transient();
        let line = match (&self.status, self.input_enabled) {
            (Some(status), _) => format!("⏳ {}", status).dimmed().to_string(),
            (None, true) => PROMPT.bold().to_string(),
            (None, false) => String::new(),
        };
        if !line.is_empty() {
            queue!(self.out, Print(line)).ok();
            self.transient_visible = true;
        }
        self.out.flush().ok();
    }
}

impl<W: Write> OutputSink for ConsoleSink<W> {
    fn append(&mut self, kind: LineKind, text: &str) {
        let rendered = match kind {
            // The terminal already shows what the user typed
            LineKind::User => return,
            LineKind::Assistant => text.normal().to_string(),
            LineKind::System => text.dimmed().to_string(),
            LineKind::Error => text.red().to_string(),
            LineKind::Confirmation => text.yellow().bold().to_string(),
        };
        self.clear_transient();
        for line in rendered.lines() {
            queue!(self.out, Print(line), Print("\n")).ok();
        }
        self.draw_transient();
    }

    fn set_status(&mut self, status: Option<&str>) {
        self.status = status.filter(|s| !s.is_empty()).map(str::to_string);
        self.draw_transient();
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        if self.input_enabled != enabled {
            self.input_enabled = enabled;
            self.draw_transient();
        }
    }

    fn set_connection(&mut self, connected: bool) {
        if self.connected == connected {
            return;
        }
        self.connected = connected;
        if connected {
            if self.status.as_deref() == Some("Disconnected, reconnecting...") {
                self.status = None;
            }
        } else {
            self.status = Some("Disconnected, reconnecting...".to_string());
        }
        self.draw_transient();
    }
}

/// Display welcome page for interactive mode
pub fn display_welcome_page(config: &Config) {
    println!();
    println!("{}", "ezpocket".bold());
    println!("{}", "Ask a question in plain language; the pipeline does the rest.".dimmed());
    println!();
    println!("  Server:  {}", config.server.url);
    println!(
        "  User:    {} / project {}",
        config.identity.username, config.identity.projeto
    );
    println!("  Mode:    {}", config.display_mode);
    println!();
    println!(
        "{}",
        "Type /help for commands, /quit to exit.".dimmed()
    );
    println!();
}
