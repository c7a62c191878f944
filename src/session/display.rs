//! Display mode policy
//!
//! Decides what reaches the output sink verbatim and what is collapsed into
//! the transient status line. The policy never touches session state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Verbosity mode, fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Development,
    #[default]
    Production,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Development => "development",
            DisplayMode::Production => "production",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(DisplayMode::Development),
            "production" | "prod" => Ok(DisplayMode::Production),
            other => Err(format!(
                "invalid display mode '{}', expected development or production",
                other
            )),
        }
    }
}

/// Modules that production mode reports only on the status line
pub const STATUS_ONLY_MODULES: [&str; 11] = [
    "intent_validator",
    "history_preferences",
    "plan_builder",
    "plan_refiner",
    "plan_confirm",
    "user_proposed_plan",
    "analysis_orchestrator",
    "sql_validator",
    "athena_executor",
    "python_runtime",
    "response_composer",
];

const MODULE_LABELS: &[(&str, &str)] = &[
    ("intent_validator", "Validating the question"),
    ("history_preferences", "Checking history and preferences"),
    ("plan_builder", "Building a plan"),
    ("plan_refiner", "Refining the plan"),
    ("plan_confirm", "Confirming the plan"),
    ("user_proposed_plan", "Applying your suggestion"),
    ("analysis_orchestrator", "Orchestrating the analysis"),
    ("sql_validator", "Validating the query"),
    ("athena_executor", "Running the query"),
    ("python_runtime", "Running the analysis"),
    ("response_composer", "Writing the answer"),
];

const MODULE_EMOJIS: &[(&str, &str)] = &[
    ("intent_validator", "🛡️"),
    ("plan_builder", "📋"),
    ("plan_confirm", "✅"),
    ("history_preferences", "🧠"),
    ("router", "🔀"),
    ("generator", "⚙️"),
    ("sql_validator", "🔍"),
    ("auto_correction", "🔧"),
    ("athena_executor", "⚡"),
    ("python_runtime", "🐍"),
    ("response_composer", "🎨"),
    ("user_feedback", "📊"),
];

/// Human-readable label for a module tag
pub fn module_label(module: &str) -> String {
    MODULE_LABELS
        .iter()
        .find(|(tag, _)| *tag == module)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| module.replace('_', " "))
}

pub fn module_emoji(module: &str) -> &'static str {
    MODULE_EMOJIS
        .iter()
        .find(|(tag, _)| *tag == module)
        .map(|(_, emoji)| *emoji)
        .unwrap_or("📦")
}

/// How a `module_update` should be shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleDisposition {
    /// Render the module and its message as a chat line
    Verbatim,
    /// Only refresh the status line with this label
    StatusOnly(String),
}

/// Pure filter over what the output sink receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayPolicy {
    mode: DisplayMode,
}

impl DisplayPolicy {
    pub fn new(mode: DisplayMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn module_disposition(&self, module: &str) -> ModuleDisposition {
        match self.mode {
            DisplayMode::Production if STATUS_ONLY_MODULES.contains(&module) => {
                ModuleDisposition::StatusOnly(module_label(module))
            }
            _ => ModuleDisposition::Verbatim,
        }
    }

    /// Connection notices and per-step acknowledgements
    pub fn shows_chrome(&self) -> bool {
        self.mode == DisplayMode::Development
    }

    /// Raw plans, job metadata and pipeline status text
    pub fn shows_technical_detail(&self) -> bool {
        self.mode == DisplayMode::Development
    }
}
