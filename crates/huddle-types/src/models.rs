use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl Default for PresenceStatus {
    fn default() -> Self {
        Self::Offline
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    #[serde(default)]
    pub status: PresenceStatus,
    #[serde(default)]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Direct,
    Group,
}

/// A conversation channel. The room list is server-owned: clients replace the
/// whole list on every reload and never merge entries locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: RoomKind,
    #[serde(default)]
    pub name: Option<String>,
    /// The other participant of a direct room.
    #[serde(default)]
    pub partner: Option<User>,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub muted: bool,
    /// Opaque room-scoped key for the message-body cipher, issued by the
    /// backend and trusted as-is.
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_message_preview: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    File,
    System,
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub user_ids: Vec<i64>,
}

/// A chat message as the server ships it. `id` is server-assigned and
/// monotonic within a room; ordering and resync dedup both key off it.
/// `content` is ciphertext whenever `encrypted` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reply_to: Option<i64>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub reactions: Vec<ReactionGroup>,
    /// How many room members have not read this message yet.
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub edited: bool,
}

impl Message {
    pub fn is_own(&self, user_id: i64) -> bool {
        self.sender_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_defaults_fill_optional_fields() {
        let json = r#"{
            "id": 7, "room_id": 1, "sender_id": 2, "sender_name": "jisoo",
            "content": "hello", "created_at": "2026-01-05T09:30:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_type, MessageType::Text);
        assert!(!msg.encrypted);
        assert!(msg.reactions.is_empty());
        assert_eq!(msg.reply_to, None);
        assert!(!msg.edited);
    }

    #[test]
    fn room_kind_uses_wire_names() {
        let json = r#"{"id": 3, "type": "direct"}"#;
        let room: Room = serde_json::from_str(json).unwrap();
        assert_eq!(room.kind, RoomKind::Direct);
        assert!(room.encryption_key.is_none());
    }
}
