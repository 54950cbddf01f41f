//! Connection registry, rooms and presence.
//!
//! All hub state sits behind one mutex and no critical section awaits.
//! Outbound frames go through each connection's bounded channel with
//! `try_send`; a full or closed channel drops the frame for that connection
//! only.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use teamhub_chats::{ChatEvent, EventSink};
use teamhub_database::{now_timestamp, MessageTarget};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::events::{
    DeletedNotice, GroupDeletedNotice, GroupRoomNotice, GroupUpdatedNotice, MembersAddedNotice,
    MemberRemovedNotice, PresenceStatus, ServerEvent, StatusNotice,
};

/// Room of a chat.
pub fn chat_room(chat_id: &str) -> String {
    chat_id.to_string()
}

/// Room of a group.
pub fn group_room(group_id: &str) -> String {
    format!("group_{group_id}")
}

/// Room a message target fans out to.
pub fn target_room(target: &MessageTarget) -> String {
    match target {
        MessageTarget::Chat(chat_id) => chat_room(chat_id),
        MessageTarget::Group(group_id) => group_room(group_id),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceEntry {
    pub socket_id: String,
    pub user_name: String,
    pub status: PresenceStatus,
    pub last_active: String,
}

struct Connection {
    user_id: String,
    sender: mpsc::Sender<ServerEvent>,
    rooms: HashSet<String>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<String, Connection>,
    rooms: HashMap<String, HashSet<String>>,
    presence: HashMap<String, PresenceEntry>,
    socket_users: HashMap<String, String>,
}

impl HubState {
    fn deliver(&self, connection_id: &str, event: &ServerEvent) {
        let Some(connection) = self.connections.get(connection_id) else {
            return;
        };
        if let Err(error) = connection.sender.try_send(event.clone()) {
            warn!(
                connection_id = %connection_id,
                event = event.name(),
                error = %error,
                "dropping socket frame"
            );
        }
    }

    fn deliver_room(&self, room: &str, event: &ServerEvent, except: Option<&str>) {
        let Some(members) = self.rooms.get(room) else {
            return;
        };
        for connection_id in members {
            if Some(connection_id.as_str()) != except {
                self.deliver(connection_id, event);
            }
        }
    }

    fn deliver_all(&self, event: &ServerEvent) {
        for connection_id in self.connections.keys() {
            self.deliver(connection_id, event);
        }
    }

    fn leave(&mut self, connection_id: &str, room: &str) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(connection_id);
        if members.is_empty() {
            self.rooms.remove(room);
        }
        if let Some(connection) = self.connections.get_mut(connection_id) {
            connection.rooms.remove(room);
        }
        removed
    }

    /// Remove every connection of `user_id` from `room`.
    fn evict_user(&mut self, room: &str, user_id: &str) -> usize {
        let evicted: Vec<String> = self
            .connections
            .iter()
            .filter(|(_, connection)| connection.user_id == user_id && connection.rooms.contains(room))
            .map(|(connection_id, _)| connection_id.clone())
            .collect();
        for connection_id in &evicted {
            self.leave(connection_id, room);
        }
        evicted.len()
    }
}

/// Process-local registry of live sockets.
#[derive(Clone)]
pub struct Hub {
    state: Arc<Mutex<HubState>>,
    buffer: usize,
}

impl Hub {
    /// `buffer` bounds the outbound queue of each connection.
    pub fn new(buffer: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            buffer: buffer.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection for `user_id`; returns its id and outbound queue.
    pub fn connect(&self, user_id: &str) -> (String, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let connection_id = uuid::Uuid::new_v4().to_string();

        self.lock().connections.insert(
            connection_id.clone(),
            Connection {
                user_id: user_id.to_string(),
                sender,
                rooms: HashSet::new(),
            },
        );

        debug!(connection_id = %connection_id, user_id = %user_id, "socket connected");
        (connection_id, receiver)
    }

    /// Drop a connection from every room and clear presence it owns.
    pub fn disconnect(&self, connection_id: &str) {
        let mut state = self.lock();
        let Some(connection) = state.connections.remove(connection_id) else {
            return;
        };
        for room in &connection.rooms {
            if let Some(members) = state.rooms.get_mut(room) {
                members.remove(connection_id);
                if members.is_empty() {
                    state.rooms.remove(room);
                }
            }
        }

        let Some(user_id) = state.socket_users.remove(connection_id) else {
            debug!(connection_id = %connection_id, "anonymous socket disconnected");
            return;
        };
        let owns_presence = state
            .presence
            .get(&user_id)
            .is_some_and(|entry| entry.socket_id == connection_id);
        if !owns_presence {
            return;
        }

        state.presence.remove(&user_id);
        info!(user_id = %user_id, "user went offline");
        state.deliver_all(&ServerEvent::UserStatusChange(StatusNotice {
            user_id,
            status: PresenceStatus::Offline,
            timestamp: now_timestamp(),
        }));
    }

    /// Mark the connection's user online and tell everyone.
    pub fn set_online(&self, connection_id: &str, user_id: &str, user_name: &str) {
        let mut state = self.lock();
        if !state.connections.contains_key(connection_id) {
            return;
        }

        let now = now_timestamp();
        state
            .socket_users
            .insert(connection_id.to_string(), user_id.to_string());
        state.presence.insert(
            user_id.to_string(),
            PresenceEntry {
                socket_id: connection_id.to_string(),
                user_name: user_name.to_string(),
                status: PresenceStatus::Online,
                last_active: now.clone(),
            },
        );

        info!(user_id = %user_id, connection_id = %connection_id, "user online");
        state.deliver_all(&ServerEvent::UserStatusChange(StatusNotice {
            user_id: user_id.to_string(),
            status: PresenceStatus::Online,
            timestamp: now,
        }));
    }

    /// Update a present user's status; users without presence are ignored.
    pub fn set_status(&self, user_id: &str, status: PresenceStatus) -> bool {
        let mut state = self.lock();
        let now = now_timestamp();
        let Some(entry) = state.presence.get_mut(user_id) else {
            return false;
        };
        entry.status = status;
        entry.last_active = now.clone();

        state.deliver_all(&ServerEvent::UserStatusChange(StatusNotice {
            user_id: user_id.to_string(),
            status,
            timestamp: now,
        }));
        true
    }

    pub fn presence(&self, user_id: &str) -> Option<PresenceEntry> {
        self.lock().presence.get(user_id).cloned()
    }

    /// Status of every present user.
    pub fn statuses(&self) -> BTreeMap<String, PresenceStatus> {
        self.lock()
            .presence
            .iter()
            .map(|(user_id, entry)| (user_id.clone(), entry.status))
            .collect()
    }

    /// Add the connection to a room; false if the connection is gone.
    pub fn join(&self, connection_id: &str, room: &str) -> bool {
        let mut state = self.lock();
        let Some(connection) = state.connections.get_mut(connection_id) else {
            return false;
        };
        connection.rooms.insert(room.to_string());
        state
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id.to_string());
        true
    }

    pub fn leave(&self, connection_id: &str, room: &str) -> bool {
        self.lock().leave(connection_id, room)
    }

    /// Take all of a user's connections out of a room.
    pub fn evict_user(&self, room: &str, user_id: &str) -> usize {
        self.lock().evict_user(room, user_id)
    }

    pub fn is_in_room(&self, connection_id: &str, room: &str) -> bool {
        self.lock()
            .rooms
            .get(room)
            .is_some_and(|members| members.contains(connection_id))
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.lock().rooms.get(room).map_or(0, HashSet::len)
    }

    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    /// User a connection was opened for.
    pub fn connection_user(&self, connection_id: &str) -> Option<String> {
        self.lock()
            .connections
            .get(connection_id)
            .map(|connection| connection.user_id.clone())
    }

    pub fn send_to(&self, connection_id: &str, event: ServerEvent) {
        self.lock().deliver(connection_id, &event);
    }

    /// Send to every connection in the room, optionally skipping one.
    pub fn broadcast_room(&self, room: &str, event: ServerEvent, except: Option<&str>) {
        self.lock().deliver_room(room, &event, except);
    }

    pub fn broadcast_all(&self, event: ServerEvent) {
        self.lock().deliver_all(&event);
    }

    /// Close every connection queue and forget all rooms and presence.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        let connections = state.connections.len();
        *state = HubState::default();
        info!(connections, "realtime hub shut down");
    }
}

impl EventSink for Hub {
    fn publish(&self, event: ChatEvent) {
        let room = target_room(&event.target());
        let mut departed = None;
        let frame = match event {
            ChatEvent::MessageCreated { message } => match message.target {
                MessageTarget::Chat(_) => ServerEvent::NewMessage(message),
                MessageTarget::Group(_) => ServerEvent::GroupNewMessage(message),
            },
            ChatEvent::MessageUpdated { message } => match message.target {
                MessageTarget::Chat(_) => ServerEvent::UpdatedMessage(message),
                MessageTarget::Group(_) => ServerEvent::GroupUpdatedMessage(message),
            },
            ChatEvent::MessageDeleted { message_id, target } => match target {
                MessageTarget::Chat(_) => ServerEvent::DeletedMessage(DeletedNotice { message_id }),
                MessageTarget::Group(group_id) => {
                    ServerEvent::GroupDeletedMessage(GroupDeletedNotice { message_id, group_id })
                }
            },
            ChatEvent::GroupMembersAdded {
                group_id,
                added_by,
                members,
            } => ServerEvent::GroupMembersAdded(MembersAddedNotice {
                group_id,
                added_by,
                members,
            }),
            ChatEvent::GroupMemberRemoved {
                group_id,
                removed_user_id,
                removed_by,
            } => {
                departed = Some(removed_user_id.clone());
                ServerEvent::GroupMemberRemoved(MemberRemovedNotice {
                    group_id,
                    removed_user_id,
                    removed_by,
                })
            }
            ChatEvent::GroupMemberLeft {
                group_id,
                user_id,
                user_name,
            } => {
                departed = Some(user_id.clone());
                ServerEvent::UserLeftGroup(GroupRoomNotice {
                    group_id,
                    user_id,
                    user_name: Some(user_name),
                    is_leaving: true,
                    timestamp: now_timestamp(),
                })
            }
            ChatEvent::GroupUpdated {
                group_id,
                updated_by,
                group,
            } => ServerEvent::GroupUpdated(GroupUpdatedNotice {
                group_id,
                updated_by,
                updates: group,
            }),
        };

        debug!(room = %room, event = frame.name(), "fanning out chat event");
        let mut state = self.lock();
        state.deliver_room(&room, &frame, None);

        if let Some(user_id) = departed {
            let evicted = state.evict_user(&room, &user_id);
            debug!(room = %room, user_id = %user_id, evicted, "departed member left room");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(receiver: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_room_broadcast_can_skip_origin() {
        let hub = Hub::new(8);
        let (alice, mut alice_rx) = hub.connect("alice");
        let (bob, mut bob_rx) = hub.connect("bob");
        let (_carol, mut carol_rx) = hub.connect("carol");

        assert!(hub.join(&alice, "c1"));
        assert!(hub.join(&bob, "c1"));
        hub.broadcast_room("c1", ServerEvent::error("typing"), Some(&alice));

        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(drain(&mut bob_rx).len(), 1);
        assert!(drain(&mut carol_rx).is_empty());
    }

    #[test]
    fn test_disconnect_only_clears_owned_presence() {
        let hub = Hub::new(8);
        let (first, _first_rx) = hub.connect("alice");
        let (second, _second_rx) = hub.connect("alice");
        let (_observer, mut observer_rx) = hub.connect("bob");

        hub.set_online(&first, "alice", "Alice");
        hub.set_online(&second, "alice", "Alice");
        drain(&mut observer_rx);

        hub.disconnect(&first);
        assert_eq!(hub.presence("alice").map(|entry| entry.socket_id), Some(second.clone()));
        assert!(drain(&mut observer_rx).is_empty());

        hub.disconnect(&second);
        assert!(hub.presence("alice").is_none());
        let events = drain(&mut observer_rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ServerEvent::UserStatusChange(notice) if notice.status == PresenceStatus::Offline
        ));
    }

    #[test]
    fn test_disconnect_removes_connection_from_rooms() {
        let hub = Hub::new(8);
        let (alice, _rx) = hub.connect("alice");
        hub.join(&alice, "c1");
        hub.join(&alice, &group_room("g1"));

        hub.disconnect(&alice);

        assert_eq!(hub.room_size("c1"), 0);
        assert_eq!(hub.room_size("group_g1"), 0);
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn test_full_queue_drops_frames_without_blocking() {
        let hub = Hub::new(1);
        let (alice, mut alice_rx) = hub.connect("alice");

        hub.send_to(&alice, ServerEvent::error("first"));
        hub.send_to(&alice, ServerEvent::error("second"));

        let events = drain(&mut alice_rx);
        assert_eq!(events, vec![ServerEvent::error("first")]);
    }

    #[test]
    fn test_status_change_requires_presence() {
        let hub = Hub::new(8);
        let (alice, _rx) = hub.connect("alice");

        assert!(!hub.set_status("alice", PresenceStatus::Away));
        hub.set_online(&alice, "alice", "Alice");
        assert!(hub.set_status("alice", PresenceStatus::Away));
        assert_eq!(hub.statuses().get("alice"), Some(&PresenceStatus::Away));
    }

    #[test]
    fn test_chat_events_fan_out_to_target_room() {
        let hub = Hub::new(8);
        let (alice, mut alice_rx) = hub.connect("alice");
        hub.join(&alice, &group_room("g1"));

        hub.publish(ChatEvent::MessageDeleted {
            message_id: "m1".to_string(),
            target: MessageTarget::Group("g1".to_string()),
        });
        hub.publish(ChatEvent::MessageDeleted {
            message_id: "m2".to_string(),
            target: MessageTarget::Chat("c1".to_string()),
        });

        let events = drain(&mut alice_rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "group-deleted-message");
    }

    #[test]
    fn test_member_removal_evicts_every_connection_of_that_user() {
        let hub = Hub::new(8);
        let room = group_room("g1");
        let (phone, mut phone_rx) = hub.connect("bob");
        let (laptop, mut laptop_rx) = hub.connect("bob");
        let (alice, mut alice_rx) = hub.connect("alice");
        for connection in [&phone, &laptop, &alice] {
            hub.join(connection, &room);
        }

        hub.publish(ChatEvent::GroupMemberRemoved {
            group_id: "g1".to_string(),
            removed_user_id: "bob".to_string(),
            removed_by: "alice".to_string(),
        });

        assert_eq!(drain(&mut phone_rx).len(), 1);
        assert_eq!(drain(&mut laptop_rx).len(), 1);
        assert_eq!(drain(&mut alice_rx).len(), 1);
        assert!(!hub.is_in_room(&phone, &room));
        assert!(!hub.is_in_room(&laptop, &room));
        assert!(hub.is_in_room(&alice, &room));

        hub.publish(ChatEvent::MessageDeleted {
            message_id: "m1".to_string(),
            target: MessageTarget::Group("g1".to_string()),
        });
        assert!(drain(&mut phone_rx).is_empty());
        assert_eq!(drain(&mut alice_rx).len(), 1);
    }

    #[test]
    fn test_shutdown_closes_queues() {
        let hub = Hub::new(8);
        let (_alice, mut alice_rx) = hub.connect("alice");

        hub.shutdown();

        assert_eq!(hub.connection_count(), 0);
        assert!(matches!(
            alice_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
