use serde::{Deserialize, Serialize};

use crate::models::{Message, Room, User};

// -- Auth --

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    /// Injected into mutating requests as the `X-CSRFToken` header.
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub user: User,
}

// -- Rooms --

#[derive(Debug, Deserialize)]
pub struct RoomListResponse {
    pub rooms: Vec<Room>,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomRequest {
    #[serde(rename = "type")]
    pub kind: crate::models::RoomKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub member_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomResponse {
    pub room: Room,
}

#[derive(Debug, Serialize)]
pub struct RenameRoomRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct InviteRequest {
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomMember {
    pub id: i64,
    pub nickname: String,
    #[serde(default)]
    pub status: crate::models::PresenceStatus,
    /// Highest message id this member has read, server-authoritative.
    #[serde(default)]
    pub last_read_message_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RoomInfoResponse {
    pub members: Vec<RoomMember>,
}

// -- Messages --

/// Payload of `GET /api/rooms/{id}/messages`. The encryption key rides along
/// so opening a room is a single round trip.
#[derive(Debug, Deserialize)]
pub struct RoomMessagesResponse {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub members: Vec<RoomMember>,
}

#[derive(Debug, Deserialize)]
pub struct ReactionToggleResponse {
    pub message_id: i64,
    pub reactions: Vec<crate::models::ReactionGroup>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub messages: Vec<Message>,
}

// -- Uploads --

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub upload_token: Option<String>,
    #[serde(default)]
    pub scan_status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// -- Profile / presence --

#[derive(Debug, Serialize)]
pub struct ProfileUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OnlineUsersResponse {
    pub users: Vec<User>,
}

/// Error body the API returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}
