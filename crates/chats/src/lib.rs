//! # TeamHub Chats Crate
//!
//! Business logic for private chats, groups, messages and workspace
//! invitations.
//!
//! ## Architecture
//!
//! - **Services**: chat resolution, group membership, messaging, invitations
//! - **Types**: errors, events, request and response shapes
//! - **Utils**: reference validation and permission checks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use teamhub_chats::{ChatServices, NoopSink};
//!
//! let services = ChatServices::new(pool, Arc::new(NoopSink));
//! let resolution = services.resolver.resolve_private_chat(&me, Some(&you), None, None).await?;
//! ```

use std::sync::Arc;

use sqlx::SqlitePool;

pub mod services;
pub mod types;
pub mod utils;

pub use services::{
    welcome_text, ChatResolver, GroupService, InvitationService, MessageService, WorkspaceService,
};
pub use types::{
    AcceptedInvitation, ChatError, ChatEvent, ChatResult, CreateGroupRequest, DeletedMessage,
    EventSink, GroupMessagesPage, InvitationOutcome, InvitationStatusReport, MessageDraft,
    NoopSink, PageRequest, Pagination, RecordingSink, Resolution, UpdateGroupRequest,
    UserWorkspaces,
};
pub use utils::{GroupAction, PermissionChecker, Validator};

/// All chat services wired to one pool and one event sink.
#[derive(Clone)]
pub struct ChatServices {
    pub resolver: ChatResolver,
    pub groups: GroupService,
    pub messages: MessageService,
    pub invitations: InvitationService,
    pub workspaces: WorkspaceService,
}

impl ChatServices {
    pub fn new(pool: SqlitePool, events: Arc<dyn EventSink>) -> Self {
        let resolver = ChatResolver::new(pool.clone(), events.clone());
        Self {
            groups: GroupService::new(pool.clone(), events.clone()),
            invitations: InvitationService::new(pool.clone(), resolver.clone(), events.clone()),
            messages: MessageService::new(pool.clone(), events),
            workspaces: WorkspaceService::new(pool, resolver.clone()),
            resolver,
        }
    }
}
