//! Notices for the front-end: toasts, mention alerts, and background-room
//! message notifications, deduplicated by tag the way OS notifications are.

use std::collections::{HashSet, VecDeque};

/// Mention/notification previews are clipped to this many characters.
const PREVIEW_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Toast {
        level: ToastLevel,
        message: String,
    },
    /// The current user was @-mentioned in the open room.
    Mention {
        room_id: i64,
        message_id: i64,
        sender: String,
        preview: String,
    },
    /// A message landed in a room that is not open (and not muted).
    RoomMessage {
        room_id: i64,
        title: String,
        body: String,
        tag: String,
    },
}

#[derive(Debug, Default)]
pub struct Notifier {
    queue: VecDeque<Notice>,
    seen_tags: HashSet<String>,
}

impl Notifier {
    pub fn toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.queue.push_back(Notice::Toast {
            level,
            message: message.into(),
        });
    }

    pub fn mention(&mut self, room_id: i64, message_id: i64, sender: &str, body: &str) {
        let tag = format!("mention-{}", message_id);
        if !self.seen_tags.insert(tag) {
            return;
        }
        self.queue.push_back(Notice::Mention {
            room_id,
            message_id,
            sender: sender.to_string(),
            preview: clip(body),
        });
    }

    pub fn room_message(&mut self, room_id: i64, title: &str, body: &str, tag: String) {
        if !self.seen_tags.insert(tag.clone()) {
            return;
        }
        self.queue.push_back(Notice::RoomMessage {
            room_id,
            title: title.to_string(),
            body: clip(body),
            tag,
        });
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.queue.drain(..).collect()
    }
}

fn clip(body: &str) -> String {
    body.chars().take(PREVIEW_LEN).collect()
}

/// Does `content` @-mention `nickname`? The mention must end the text or be
/// followed by whitespace, so "@bo" does not fire inside "@bob".
pub fn mentions(content: &str, nickname: &str) -> bool {
    if nickname.is_empty() {
        return false;
    }
    let haystack = content.to_lowercase();
    let needle = format!("@{}", nickname.to_lowercase());

    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&needle) {
        let end = from + pos + needle.len();
        match haystack[end..].chars().next() {
            None => return true,
            Some(c) if c.is_whitespace() => return true,
            _ => from = end,
        }
    }
    false
}
