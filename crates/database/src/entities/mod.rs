//! Domain entities for the messaging store

pub mod chat;
pub mod group;
pub mod invitation;
pub mod message;
pub mod session;
pub mod user;
pub mod workspace;

pub use chat::{pair_key, scope_key, Chat, ChatWithMembers};
pub use group::{MAX_PINNED_MESSAGES, Group, GroupMember, GroupRole, GroupSettings, GroupSettingsPatch, Permission, PinnedMessage};
pub use invitation::{Invitation, InvitationStatus};
pub use message::{Attachment, Message, MessageTarget, MessageType, NewMessage, Reaction, ReadReceipt};
pub use session::Session;
pub use user::{User, UserSummary};
pub use workspace::{Workspace, WorkspaceMember, WorkspaceRole};
