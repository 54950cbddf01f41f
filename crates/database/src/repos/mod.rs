//! Database repository implementations

pub mod chat_repository;
pub mod group_repository;
pub mod invitation_repository;
pub mod message_repository;
pub mod session_repository;
pub mod user_repository;
pub mod workspace_repository;

pub use chat_repository::ChatRepository;
pub use group_repository::GroupRepository;
pub use invitation_repository::InvitationRepository;
pub use message_repository::MessageRepository;
pub use session_repository::SessionRepository;
pub use user_repository::UserRepository;
pub use workspace_repository::WorkspaceRepository;
