//! Connector I/O between transport workers and the registry
//!
//! The registry never touches sockets. A transport worker reads frames
//! with [`read_frame`] or [`forward_frames`] and pushes them through a
//! [`FrameSender`]; the periodic handler drains the matching inbox.

pub mod inbox;
pub mod reader;

pub use inbox::{FrameInbox, FrameSender, InboxStats};
pub use reader::{forward_frames, is_disconnect, read_frame};
