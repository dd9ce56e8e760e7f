//! TCP control channel.
//!
//! A viewer connects to the command port and sends short text commands
//! that toggle image streaming:
//!
//! ```text
//! startvideo…   → streaming on,  reply = bytes received
//! stopvideo…    → streaming off, reply = bytes received
//! status…       → reply = "ready"
//! anything else → ignored
//! ```
//!
//! Matching is a case-sensitive prefix match on each individual read.

pub mod command;
pub mod server;

pub use command::{ControlCommand, READY_REPLY};
pub use server::{CommandServer, DEFAULT_COMMAND_PORT, spawn_command_server};
