//! Socket connection loop and client event dispatch.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use teamhub_chats::{ChatError, MessageDraft};
use teamhub_database::{now_timestamp, MessageTarget, MessageType};
use tracing::{debug, info, warn};

use super::events::*;
use super::hub::{chat_room, group_room};
use crate::state::{AuthUser, GatewayState};

/// Upgrade an authenticated request to a socket.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, user: AuthUser) {
    let (connection_id, mut outbound) = state.hub.connect(&user.id);
    let (mut sender, mut receiver) = socket.split();
    info!(user_id = %user.id, connection_id = %connection_id, "socket opened");

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(error) => {
                    warn!(event = event.name(), error = %error, "failed to encode socket frame");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
        if let Err(error) = sender.close().await {
            debug!(error = %error, "socket already closed");
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => dispatch(&state, &user, &connection_id, event).await,
                Err(error) => {
                    debug!(connection_id = %connection_id, error = %error, "unreadable client frame");
                    state
                        .hub
                        .send_to(&connection_id, ServerEvent::error(format!("Invalid event: {error}")));
                }
            },
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(connection_id = %connection_id, error = %error, "socket read failed");
                break;
            }
        }
    }

    state.hub.disconnect(&connection_id);
    writer.abort();
    info!(user_id = %user.id, connection_id = %connection_id, "socket closed");
}

/// Error text when a payload claims to act for someone else.
fn impersonation(claimed: Option<&str>, user: &AuthUser) -> Option<String> {
    match claimed {
        Some(claimed) if claimed != user.id => {
            Some("Payload user does not match the authenticated user".to_string())
        }
        _ => None,
    }
}

fn display_name(requested: Option<String>, user: &AuthUser) -> String {
    requested
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| user.name.clone())
}

/// Handle one client event for `connection_id`.
///
/// Replies and failures go to the originating connection; room traffic is
/// produced by the hub, either here or through the chat event sink.
pub async fn dispatch(state: &GatewayState, user: &AuthUser, connection_id: &str, event: ClientEvent) {
    let hub = &state.hub;
    let messages = &state.chats.messages;

    match event {
        ClientEvent::UserConnected(payload) => {
            if let Some(error) = impersonation(payload.user_id.as_deref(), user) {
                hub.send_to(connection_id, ServerEvent::UserConnectedError(Failure { error }));
                return;
            }
            hub.set_online(connection_id, &user.id, &display_name(payload.user_name, user));
        }

        ClientEvent::JoinChat(room) => {
            let chat_id = room.id().to_string();
            let target = MessageTarget::Chat(chat_id.clone());
            match messages.can_access(&user.id, &target).await {
                Ok(true) => {
                    let room = chat_room(&chat_id);
                    hub.join(connection_id, &room);
                    hub.broadcast_room(
                        &room,
                        ServerEvent::UserJoinedChat(ChatRoomNotice {
                            chat_id,
                            socket_id: connection_id.to_string(),
                            timestamp: now_timestamp(),
                        }),
                        Some(connection_id),
                    );
                }
                Ok(false) => hub.send_to(
                    connection_id,
                    ServerEvent::JoinChatError(ChatFailure {
                        error: "You are not a member of this chat".to_string(),
                        chat_id,
                    }),
                ),
                Err(error) => hub.send_to(
                    connection_id,
                    ServerEvent::JoinChatError(ChatFailure {
                        error: error.to_string(),
                        chat_id,
                    }),
                ),
            }
        }

        ClientEvent::LeaveChat(room) => {
            let chat_id = room.id().to_string();
            let room = chat_room(&chat_id);
            if hub.leave(connection_id, &room) {
                hub.broadcast_room(
                    &room,
                    ServerEvent::UserLeftChat(ChatRoomNotice {
                        chat_id,
                        socket_id: connection_id.to_string(),
                        timestamp: now_timestamp(),
                    }),
                    Some(connection_id),
                );
            }
        }

        ClientEvent::JoinGroup(room) => {
            let group_id = room.id().to_string();
            let target = MessageTarget::Group(group_id.clone());
            let failure = match messages.can_access(&user.id, &target).await {
                Ok(true) => None,
                Ok(false) => Some("You are not a member of this group".to_string()),
                Err(error) => Some(error.to_string()),
            };
            if let Some(error) = failure {
                hub.send_to(
                    connection_id,
                    ServerEvent::JoinGroupError(GroupFailure { error, group_id }),
                );
                return;
            }

            let room = group_room(&group_id);
            hub.join(connection_id, &room);
            hub.broadcast_room(
                &room,
                ServerEvent::UserJoinedGroup(GroupRoomNotice {
                    group_id,
                    user_id: user.id.clone(),
                    user_name: Some(user.name.clone()),
                    is_leaving: false,
                    timestamp: now_timestamp(),
                }),
                Some(connection_id),
            );
        }

        ClientEvent::LeaveGroup(room) => {
            let group_id = room.id().to_string();
            let room = group_room(&group_id);
            if hub.leave(connection_id, &room) {
                hub.broadcast_room(
                    &room,
                    ServerEvent::UserLeftGroup(GroupRoomNotice {
                        group_id,
                        user_id: user.id.clone(),
                        user_name: Some(user.name.clone()),
                        is_leaving: false,
                        timestamp: now_timestamp(),
                    }),
                    Some(connection_id),
                );
            }
        }

        ClientEvent::TypingStart(payload) => chat_typing(state, user, connection_id, payload, true),
        ClientEvent::TypingStop(payload) => chat_typing(state, user, connection_id, payload, false),
        ClientEvent::TypingStartGroup(payload) => {
            group_typing(state, user, connection_id, payload, true)
        }
        ClientEvent::TypingStopGroup(payload) => {
            group_typing(state, user, connection_id, payload, false)
        }

        ClientEvent::SendMessage(payload) => {
            let original_message = serde_json::to_value(&payload).unwrap_or_default();
            let result = match impersonation(payload.sender.as_deref(), user) {
                Some(error) => Err(error),
                None => messages
                    .send(
                        &user.id,
                        MessageTarget::Chat(payload.chat_id),
                        MessageDraft {
                            content: payload.content,
                            attachment: None,
                            reply_to: payload.reply_to,
                        },
                    )
                    .await
                    .map_err(|error| error.to_string()),
            };
            if let Err(error) = result {
                hub.send_to(
                    connection_id,
                    ServerEvent::MessageError(MessageFailure {
                        error,
                        original_message,
                    }),
                );
            }
        }

        ClientEvent::SendGroupMessage(payload) => {
            let original_message = serde_json::to_value(&payload).unwrap_or_default();
            let result = match impersonation(payload.sender.as_deref(), user) {
                Some(error) => Err(error),
                None => messages
                    .send(
                        &user.id,
                        MessageTarget::Group(payload.group_id),
                        MessageDraft {
                            content: payload.content,
                            attachment: None,
                            reply_to: payload.reply_to,
                        },
                    )
                    .await
                    .map_err(|error| error.to_string()),
            };
            if let Err(error) = result {
                hub.send_to(
                    connection_id,
                    ServerEvent::GroupMessageError(MessageFailure {
                        error,
                        original_message,
                    }),
                );
            }
        }

        ClientEvent::EditMessage(payload) => {
            let message_id = payload.message_id.clone();
            match edit(state, user, payload, MessageType::Direct).await {
                Ok(()) => hub.send_to(
                    connection_id,
                    ServerEvent::EditMessageSuccess(MessageAck { message_id }),
                ),
                Err(error) => hub.send_to(
                    connection_id,
                    ServerEvent::EditMessageError(MessageIdFailure { error, message_id }),
                ),
            }
        }

        ClientEvent::EditGroupMessage(payload) => {
            let message_id = payload.message_id.clone();
            match edit(state, user, payload, MessageType::Group).await {
                Ok(()) => hub.send_to(
                    connection_id,
                    ServerEvent::EditMessageSuccess(MessageAck { message_id }),
                ),
                Err(error) => hub.send_to(
                    connection_id,
                    ServerEvent::EditGroupMessageError(MessageIdFailure { error, message_id }),
                ),
            }
        }

        ClientEvent::DeleteMessage(payload) => {
            let message_id = payload.message_id.clone();
            match delete(state, user, payload, MessageType::Direct).await {
                Ok(()) => hub.send_to(
                    connection_id,
                    ServerEvent::DeleteMessageSuccess(MessageAck { message_id }),
                ),
                Err(error) => hub.send_to(
                    connection_id,
                    ServerEvent::DeleteMessageError(MessageIdFailure { error, message_id }),
                ),
            }
        }

        ClientEvent::DeleteGroupMessage(payload) => {
            let message_id = payload.message_id.clone();
            match delete(state, user, payload, MessageType::Group).await {
                Ok(()) => hub.send_to(
                    connection_id,
                    ServerEvent::DeleteMessageSuccess(MessageAck { message_id }),
                ),
                Err(error) => hub.send_to(
                    connection_id,
                    ServerEvent::DeleteGroupMessageError(MessageIdFailure { error, message_id }),
                ),
            }
        }

        ClientEvent::FetchMessages(payload) => {
            match messages.list_chat_messages(&payload.chat_id, &user.id).await {
                Ok(history) => hub.send_to(
                    connection_id,
                    ServerEvent::ChatMessages(ChatMessages {
                        chat_id: payload.chat_id,
                        messages: history,
                    }),
                ),
                Err(error) => hub.send_to(
                    connection_id,
                    ServerEvent::FetchMessagesError(ChatFailure {
                        error: error.to_string(),
                        chat_id: payload.chat_id,
                    }),
                ),
            }
        }

        ClientEvent::StatusChange(payload) => {
            if let Some(error) = impersonation(payload.user_id.as_deref(), user) {
                hub.send_to(connection_id, ServerEvent::error(error));
                return;
            }
            if !hub.set_status(&user.id, payload.status) {
                debug!(user_id = %user.id, "status change without presence ignored");
            }
        }

        ClientEvent::GetUserStatuses => {
            hub.send_to(connection_id, ServerEvent::UserStatuses(hub.statuses()));
        }
    }
}

fn chat_typing(
    state: &GatewayState,
    user: &AuthUser,
    connection_id: &str,
    payload: TypingPayload,
    is_typing: bool,
) {
    let hub = &state.hub;
    if let Some(error) = impersonation(payload.user_id.as_deref(), user) {
        hub.send_to(connection_id, ServerEvent::error(error));
        return;
    }

    let room = chat_room(&payload.chat_id);
    if !hub.is_in_room(connection_id, &room) {
        hub.send_to(connection_id, ServerEvent::error("Join the chat before typing"));
        return;
    }

    hub.broadcast_room(
        &room,
        ServerEvent::UserTyping(TypingNotice {
            chat_id: payload.chat_id,
            user_id: user.id.clone(),
            user_name: display_name(payload.user_name, user),
            is_typing,
        }),
        Some(connection_id),
    );
}

fn group_typing(
    state: &GatewayState,
    user: &AuthUser,
    connection_id: &str,
    payload: GroupTypingPayload,
    is_typing: bool,
) {
    let hub = &state.hub;
    if let Some(error) = impersonation(payload.user_id.as_deref(), user) {
        hub.send_to(connection_id, ServerEvent::error(error));
        return;
    }

    let room = group_room(&payload.group_id);
    if !hub.is_in_room(connection_id, &room) {
        hub.send_to(connection_id, ServerEvent::error("Join the group before typing"));
        return;
    }

    hub.broadcast_room(
        &room,
        ServerEvent::UserTypingGroup(GroupTypingNotice {
            group_id: payload.group_id,
            user_id: user.id.clone(),
            user_name: display_name(payload.user_name, user),
            is_typing,
        }),
        Some(connection_id),
    );
}

async fn edit(
    state: &GatewayState,
    user: &AuthUser,
    payload: EditMessagePayload,
    kind: MessageType,
) -> Result<(), String> {
    if let Some(error) = impersonation(payload.user_id.as_deref(), user) {
        return Err(error);
    }
    state
        .chats
        .messages
        .edit_of_kind(&payload.message_id, &user.id, &payload.content, kind)
        .await
        .map(|_| ())
        .map_err(|error: ChatError| error.to_string())
}

async fn delete(
    state: &GatewayState,
    user: &AuthUser,
    payload: DeleteMessagePayload,
    kind: MessageType,
) -> Result<(), String> {
    if let Some(error) = impersonation(payload.user_id.as_deref(), user) {
        return Err(error);
    }
    state
        .chats
        .messages
        .delete_of_kind(&payload.message_id, &user.id, kind)
        .await
        .map(|_| ())
        .map_err(|error: ChatError| error.to_string())
}
