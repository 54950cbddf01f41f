//! Domain events published after state changes.
//!
//! Services publish through an [`EventSink`]; the realtime gateway is the
//! production sink and turns each event into socket frames for a room.

use std::sync::Mutex;

use teamhub_database::{Group, Message, MessageTarget};

/// State change notification emitted by the chat services.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    MessageCreated {
        message: Message,
    },

    MessageUpdated {
        message: Message,
    },

    MessageDeleted {
        message_id: String,
        target: MessageTarget,
    },

    GroupMembersAdded {
        group_id: String,
        added_by: String,
        members: Vec<String>,
    },

    GroupMemberRemoved {
        group_id: String,
        removed_user_id: String,
        removed_by: String,
    },

    GroupMemberLeft {
        group_id: String,
        user_id: String,
        user_name: String,
    },

    GroupUpdated {
        group_id: String,
        updated_by: String,
        group: Group,
    },
}

impl ChatEvent {
    /// Event type name for logging
    pub fn event_type_name(&self) -> &'static str {
        match self {
            ChatEvent::MessageCreated { .. } => "message_created",
            ChatEvent::MessageUpdated { .. } => "message_updated",
            ChatEvent::MessageDeleted { .. } => "message_deleted",
            ChatEvent::GroupMembersAdded { .. } => "group_members_added",
            ChatEvent::GroupMemberRemoved { .. } => "group_member_removed",
            ChatEvent::GroupMemberLeft { .. } => "group_member_left",
            ChatEvent::GroupUpdated { .. } => "group_updated",
        }
    }

    /// The conversation the event concerns.
    pub fn target(&self) -> MessageTarget {
        match self {
            ChatEvent::MessageCreated { message } | ChatEvent::MessageUpdated { message } => {
                message.target.clone()
            }
            ChatEvent::MessageDeleted { target, .. } => target.clone(),
            ChatEvent::GroupMembersAdded { group_id, .. }
            | ChatEvent::GroupMemberRemoved { group_id, .. }
            | ChatEvent::GroupMemberLeft { group_id, .. }
            | ChatEvent::GroupUpdated { group_id, .. } => MessageTarget::Group(group_id.clone()),
        }
    }
}

/// Receiver of [`ChatEvent`]s. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ChatEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: ChatEvent) {}
}

/// Sink that keeps every event in memory, for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChatEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<ChatEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: ChatEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_events_target_the_group() {
        let event = ChatEvent::GroupMemberLeft {
            group_id: "g".into(),
            user_id: "u".into(),
            user_name: "Ada".into(),
        };
        assert_eq!(event.target(), MessageTarget::Group("g".into()));
        assert_eq!(event.event_type_name(), "group_member_left");
    }

    #[test]
    fn test_recording_sink_drains() {
        let sink = RecordingSink::new();
        sink.publish(ChatEvent::MessageDeleted {
            message_id: "m".into(),
            target: MessageTarget::Chat("c".into()),
        });

        assert_eq!(sink.take().len(), 1);
        assert!(sink.take().is_empty());
    }
}
