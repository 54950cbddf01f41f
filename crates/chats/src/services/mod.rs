//! Business logic services for the chat system.
//!
//! Services coordinate the repositories and enforce the membership and
//! authorization rules. State changes are announced on an `EventSink`.

pub mod chat_resolver;
pub mod group_service;
pub mod invitation_service;
pub mod message_service;
pub mod workspace_service;

pub use chat_resolver::{welcome_text, ChatResolver};
pub use group_service::GroupService;
pub use invitation_service::InvitationService;
pub use message_service::MessageService;
pub use workspace_service::WorkspaceService;
