//! Shared types and interfaces for the chat system.

pub mod errors;
pub mod events;
pub mod requests;
pub mod responses;

pub use errors::{ChatError, ChatResult};
pub use events::{ChatEvent, EventSink, NoopSink, RecordingSink};
pub use requests::*;
pub use responses::*;
