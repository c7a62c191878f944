//! Interactive session management module
//!
//! The session state machine lives here: the controller classifies typed
//! lines, the dispatcher reacts to server events, the display policy filters
//! what reaches the console and the session manager drives all of it.

pub mod action_channel;
pub mod command_router;
pub mod controller;
pub mod dispatcher;
pub mod display;
pub mod session_manager;
pub mod state;

pub use action_channel::{ActionChannel, SessionEvent};
pub use command_router::{CommandOutcome, CommandRouter, InteractiveCommand};
pub use controller::{CLASSIFICATION_ORDER, Decision, SessionController, Submission, classify};
pub use dispatcher::{DispatchOptions, EventDispatcher, ReconnectPolicy};
pub use display::{DisplayMode, DisplayPolicy, ModuleDisposition};
pub use session_manager::{SessionManager, SessionState, SessionStats};
pub use state::{InteractionKind, Job, PendingInteraction, Rating, Session, SessionIdentity};
