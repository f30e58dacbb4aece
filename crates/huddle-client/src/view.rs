//! View-model rendering: pure functions from server state to what a
//! front-end draws. No I/O, no side effects.

use chrono::{DateTime, NaiveDate, Utc};

use huddle_crypto::Opened;
use huddle_types::models::{Message, MessageType, PresenceStatus, Room, RoomKind, User};

use crate::notify::mentions;

/// Shown in place of a direct room with no resolvable name.
const FALLBACK_ROOM_TITLE: &str = "Conversation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionChip {
    pub emoji: String,
    pub count: usize,
    /// Whether the current user is among the reactors.
    pub mine: bool,
}

#[derive(Debug, Clone)]
pub struct MessageView {
    pub id: i64,
    pub sender_name: String,
    pub mine: bool,
    /// Best-effort plaintext; the raw ciphertext when undecryptable.
    pub body: String,
    pub undecryptable: bool,
    pub kind: MessageType,
    pub edited: bool,
    pub reply_to: Option<i64>,
    pub file_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub mentions_me: bool,
    pub reactions: Vec<ReactionChip>,
    /// Remaining members who have not read this (own messages only).
    pub unread_count: u32,
}

pub fn message_view(msg: &Message, key: Option<&str>, me: &User) -> MessageView {
    let opened = if msg.encrypted {
        huddle_crypto::open(&msg.content, key.unwrap_or(""))
    } else {
        Opened::Plaintext(msg.content.clone())
    };
    let undecryptable = opened.is_undecryptable();
    let body = opened.into_string();
    let mine = msg.is_own(me.id);

    MessageView {
        id: msg.id,
        sender_name: msg.sender_name.clone(),
        mine,
        mentions_me: !mine && mentions(&body, &me.nickname),
        body,
        undecryptable,
        kind: msg.message_type,
        edited: msg.edited,
        reply_to: msg.reply_to,
        file_name: msg.file_name.clone(),
        timestamp: msg.created_at,
        reactions: msg
            .reactions
            .iter()
            .map(|r| ReactionChip {
                emoji: r.emoji.clone(),
                count: r.user_ids.len(),
                mine: r.user_ids.contains(&me.id),
            })
            .collect(),
        unread_count: if mine { msg.unread_count } else { 0 },
    }
}

#[derive(Debug, Clone)]
pub enum TranscriptItem {
    /// A new calendar day starts here.
    DateDivider(NaiveDate),
    /// Everything below arrived after the user's last read mark.
    UnreadDivider,
    Message(MessageView),
}

/// Render a message list the way the chat pane draws it: date dividers on
/// day changes and a single unread divider before the first unseen message
/// from someone else.
pub fn transcript(
    messages: &[Message],
    key: Option<&str>,
    me: &User,
    last_read_id: i64,
) -> Vec<TranscriptItem> {
    let mut items = Vec::with_capacity(messages.len() + 4);
    let mut last_date: Option<NaiveDate> = None;
    let mut unread_divider_shown = false;

    for msg in messages {
        let date = msg.created_at.date_naive();
        if last_date != Some(date) {
            items.push(TranscriptItem::DateDivider(date));
            last_date = Some(date);
        }

        if !unread_divider_shown
            && last_read_id > 0
            && msg.id > last_read_id
            && !msg.is_own(me.id)
        {
            items.push(TranscriptItem::UnreadDivider);
            unread_divider_shown = true;
        }

        items.push(TranscriptItem::Message(message_view(msg, key, me)));
    }
    items
}

#[derive(Debug, Clone)]
pub struct RoomEntryView {
    pub id: i64,
    pub title: String,
    pub preview: Option<String>,
    pub unread_count: u32,
    pub pinned: bool,
    pub muted: bool,
    /// Presence dot for direct rooms; groups have none.
    pub online: Option<bool>,
}

pub fn room_entry(room: &Room) -> RoomEntryView {
    let title = room
        .name
        .clone()
        .or_else(|| room.partner.as_ref().map(|p| p.nickname.clone()))
        .unwrap_or_else(|| FALLBACK_ROOM_TITLE.to_string());

    let preview = room.last_message_preview.as_ref().map(|raw| {
        huddle_crypto::open(raw, room.encryption_key.as_deref().unwrap_or(""))
            .into_string()
    });

    RoomEntryView {
        id: room.id,
        title,
        preview,
        unread_count: room.unread_count,
        pinned: room.pinned,
        muted: room.muted,
        online: match room.kind {
            RoomKind::Direct => room
                .partner
                .as_ref()
                .map(|p| p.status == PresenceStatus::Online),
            RoomKind::Group => None,
        },
    }
}

/// Sidebar order: pinned rooms first, then most recent activity, then id.
pub fn sorted_entries(rooms: &[Room]) -> Vec<RoomEntryView> {
    let mut sorted: Vec<&Room> = rooms.iter().collect();
    sorted.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then(b.last_message_time.cmp(&a.last_message_time))
            .then(b.id.cmp(&a.id))
    });
    sorted.into_iter().map(room_entry).collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use huddle_types::models::ReactionGroup;

    use super::*;

    fn me() -> User {
        User {
            id: 10,
            nickname: "dana".into(),
            status: PresenceStatus::Online,
            profile_image: None,
        }
    }

    fn message(id: i64, sender_id: i64, content: &str, day: u32) -> Message {
        Message {
            id,
            room_id: 1,
            sender_id,
            sender_name: "amy".into(),
            content: content.into(),
            message_type: MessageType::Text,
            encrypted: false,
            created_at: Utc.with_ymd_and_hms(2026, 1, day, 9, 0, 0).unwrap(),
            reply_to: None,
            file_path: None,
            file_name: None,
            reactions: vec![],
            unread_count: 0,
            edited: false,
        }
    }

    #[test]
    fn encrypted_body_is_opened_for_display() {
        let key = "room-key";
        let mut msg = message(1, 2, "", 5);
        msg.content = huddle_crypto::seal("hello", key);
        msg.encrypted = true;

        let view = message_view(&msg, Some(key), &me());
        assert_eq!(view.body, "hello");
        assert!(!view.undecryptable);
    }

    #[test]
    fn undecryptable_body_keeps_ciphertext_and_flags_it() {
        let mut msg = message(1, 2, "", 5);
        msg.content = huddle_crypto::seal("hello", "their-key");
        msg.encrypted = true;

        let view = message_view(&msg, Some("not-the-key"), &me());
        assert!(view.undecryptable);
        assert_eq!(view.body, msg.content);
    }

    #[test]
    fn mention_flag_only_fires_on_others_messages() {
        let view = message_view(&message(1, 2, "lunch @dana?", 5), None, &me());
        assert!(view.mentions_me);

        let view = message_view(&message(2, 10, "note to self @dana", 5), None, &me());
        assert!(!view.mentions_me);
    }

    #[test]
    fn reaction_chips_count_and_mark_mine() {
        let mut msg = message(1, 2, "hi", 5);
        msg.reactions = vec![ReactionGroup {
            emoji: "👍".into(),
            user_ids: vec![2, 10],
        }];

        let view = message_view(&msg, None, &me());
        assert_eq!(view.reactions.len(), 1);
        assert_eq!(view.reactions[0].count, 2);
        assert!(view.reactions[0].mine);
    }

    #[test]
    fn transcript_inserts_date_and_unread_dividers() {
        let messages = vec![
            message(1, 2, "day one", 5),
            message(2, 2, "still day one", 5),
            message(3, 2, "day two", 6),
        ];

        let items = transcript(&messages, None, &me(), 2);
        let shape: Vec<&str> = items
            .iter()
            .map(|item| match item {
                TranscriptItem::DateDivider(_) => "date",
                TranscriptItem::UnreadDivider => "unread",
                TranscriptItem::Message(_) => "msg",
            })
            .collect();

        assert_eq!(shape, vec!["date", "msg", "msg", "date", "unread", "msg"]);
    }

    #[test]
    fn transcript_without_read_mark_has_no_unread_divider() {
        let messages = vec![message(1, 2, "a", 5), message(2, 2, "b", 5)];
        let items = transcript(&messages, None, &me(), 0);
        assert!(
            !items
                .iter()
                .any(|i| matches!(i, TranscriptItem::UnreadDivider))
        );
    }

    fn room(id: i64, pinned: bool, last: Option<i64>) -> Room {
        Room {
            id,
            kind: RoomKind::Group,
            name: Some(format!("room {}", id)),
            partner: None,
            member_count: 3,
            pinned,
            muted: false,
            encryption_key: None,
            unread_count: 0,
            last_message_time: last.map(|day| {
                Utc.with_ymd_and_hms(2026, 1, day as u32, 0, 0, 0).unwrap()
            }),
            last_message_preview: None,
        }
    }

    #[test]
    fn pinned_rooms_sort_first_then_recency() {
        let rooms = vec![
            room(1, false, Some(9)),
            room(2, true, Some(3)),
            room(3, false, Some(12)),
        ];

        let order: Vec<i64> = sorted_entries(&rooms).iter().map(|r| r.id).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn direct_room_titles_fall_back_to_partner() {
        let mut direct = room(4, false, None);
        direct.kind = RoomKind::Direct;
        direct.name = None;
        direct.partner = Some(User {
            id: 7,
            nickname: "bo".into(),
            status: PresenceStatus::Offline,
            profile_image: None,
        });

        let entry = room_entry(&direct);
        assert_eq!(entry.title, "bo");
        assert_eq!(entry.online, Some(false));
    }
}
