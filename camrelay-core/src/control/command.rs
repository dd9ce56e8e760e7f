//! Command vocabulary of the control channel.

use crate::relay::context::StreamingFlag;

/// Reply to `status`.
pub const READY_REPLY: &[u8] = b"ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    StartVideo,
    StopVideo,
    Status,
}

impl ControlCommand {
    /// Match the start of one received chunk against the vocabulary.
    ///
    /// Trailing bytes (a NUL terminator, a newline, junk) are allowed.
    pub fn parse(received: &[u8]) -> Option<Self> {
        if received.starts_with(b"startvideo") {
            Some(ControlCommand::StartVideo)
        } else if received.starts_with(b"stopvideo") {
            Some(ControlCommand::StopVideo)
        } else if received.starts_with(b"status") {
            Some(ControlCommand::Status)
        } else {
            None
        }
    }

    /// Apply the command and return the reply for `received`.
    pub fn apply<'a>(self, streaming: &StreamingFlag, received: &'a [u8]) -> &'a [u8] {
        match self {
            ControlCommand::StartVideo => {
                streaming.set(true);
                received
            }
            ControlCommand::StopVideo => {
                streaming.set(false);
                received
            }
            ControlCommand::Status => READY_REPLY,
        }
    }
}
