//! Wire protocol for the orchestrator's Socket.IO channel

pub mod client;
pub mod codec;
pub mod types;

pub use client::{ChannelError, ReconnectSettings, SocketIoClient};
pub use types::*;
