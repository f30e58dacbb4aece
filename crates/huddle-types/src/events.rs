use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageType, PresenceStatus, ReactionGroup};

/// Events sent from the server over the realtime channel.
///
/// Wire format is `{"event": "...", "data": {...}}`; variant names map to the
/// channel's snake_case event names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A message was posted; also how the sender's own message comes back.
    NewMessage(Message),

    MessageDeleted {
        room_id: i64,
        message_id: i64,
    },

    MessageEdited {
        room_id: i64,
        message_id: i64,
        content: String,
        encrypted: bool,
    },

    /// A member read up to `message_id` in a room.
    ReadUpdated {
        room_id: i64,
        message_id: i64,
        user_id: i64,
    },

    UserTyping {
        room_id: i64,
        user_id: i64,
        nickname: String,
        is_typing: bool,
    },

    UserStatus {
        user_id: i64,
        status: PresenceStatus,
    },

    /// Something about a room changed; the client reloads the room list.
    RoomUpdated {
        room_id: i64,
    },

    RoomNameUpdated {
        room_id: i64,
        name: String,
    },

    RoomMembersUpdated {
        room_id: i64,
    },

    UserProfileUpdated {
        user_id: i64,
        #[serde(default)]
        nickname: Option<String>,
        #[serde(default)]
        profile_image: Option<String>,
    },

    ReactionUpdated {
        room_id: i64,
        message_id: i64,
        reactions: Vec<ReactionGroup>,
    },

    PinUpdated {
        room_id: i64,
    },

    PollCreated {
        room_id: i64,
    },

    PollUpdated {
        room_id: i64,
    },

    AdminUpdated {
        room_id: i64,
    },

    /// Server acknowledgement of a join_room command.
    JoinedRoom {
        room_id: i64,
    },

    /// Application-level error; logged, never fatal.
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// The room this event is scoped to, if any. Events returning `None`
    /// (presence, profile, errors) apply globally.
    pub fn room_id(&self) -> Option<i64> {
        match self {
            Self::NewMessage(msg) => Some(msg.room_id),
            Self::MessageDeleted { room_id, .. }
            | Self::MessageEdited { room_id, .. }
            | Self::ReadUpdated { room_id, .. }
            | Self::UserTyping { room_id, .. }
            | Self::RoomUpdated { room_id }
            | Self::RoomNameUpdated { room_id, .. }
            | Self::RoomMembersUpdated { room_id }
            | Self::ReactionUpdated { room_id, .. }
            | Self::PinUpdated { room_id }
            | Self::PollCreated { room_id }
            | Self::PollUpdated { room_id }
            | Self::AdminUpdated { room_id }
            | Self::JoinedRoom { room_id } => Some(*room_id),
            Self::UserStatus { .. } | Self::UserProfileUpdated { .. } | Self::Error { .. } => None,
        }
    }
}

/// Body of a `send_message` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub room_id: i64,
    /// Ciphertext when `encrypted` is set; empty for file/image messages.
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub encrypted: bool,
    #[serde(default)]
    pub reply_to: Option<i64>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Commands sent from the client to the server over the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinRoom { room_id: i64 },

    LeaveRoom { room_id: i64 },

    SendMessage(OutgoingMessage),

    EditMessage {
        message_id: i64,
        room_id: i64,
        content: String,
        encrypted: bool,
    },

    DeleteMessage {
        message_id: i64,
        room_id: i64,
    },

    Typing { room_id: i64, is_typing: bool },

    /// Mark everything up to `message_id` in a room as read.
    MessageRead { room_id: i64, message_id: i64 },

    ToggleReaction { message_id: i64, emoji: String },

    /// Tell other clients to refresh this user's profile.
    ProfileUpdated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_event_wire_names_are_snake_case() {
        let json = r#"{"event": "user_typing", "data": {
            "room_id": 4, "user_id": 9, "nickname": "mina", "is_typing": true
        }}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::UserTyping { room_id, nickname, is_typing, .. } => {
                assert_eq!(room_id, 4);
                assert_eq!(nickname, "mina");
                assert!(is_typing);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn client_command_round_trips() {
        let cmd = ClientCommand::Typing { room_id: 2, is_typing: false };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""event":"typing""#));
        let back: ClientCommand = serde_json::from_str(&json).unwrap();
        match back {
            ClientCommand::Typing { room_id, is_typing } => {
                assert_eq!(room_id, 2);
                assert!(!is_typing);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn room_scope_covers_message_events() {
        let ev = ServerEvent::MessageDeleted { room_id: 11, message_id: 90 };
        assert_eq!(ev.room_id(), Some(11));
        let ev = ServerEvent::UserStatus { user_id: 1, status: PresenceStatus::Online };
        assert_eq!(ev.room_id(), None);
    }
}
