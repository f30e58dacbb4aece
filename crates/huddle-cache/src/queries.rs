use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::params;
use serde_json::Value;
use tracing::{info, warn};

use huddle_types::models::{Message, Room};

use crate::Cache;

impl Cache {
    // -- Messages --

    /// Cache a batch of messages for a room. Existing rows with the same id
    /// are replaced, so re-caching after an edit keeps the latest copy.
    pub fn cache_messages(&self, room_id: i64, messages: &[Message]) -> Result<()> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT OR REPLACE INTO messages (id, room_id, created_at, payload)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for msg in messages {
                stmt.execute(params![
                    msg.id,
                    room_id,
                    msg.created_at.to_rfc3339(),
                    serde_json::to_string(msg)?,
                ])?;
            }
            Ok(())
        })
    }

    /// Latest `limit` cached messages for a room, oldest first.
    pub fn cached_messages(&self, room_id: i64, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT payload FROM messages WHERE room_id = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let mut messages: Vec<Message> = stmt
                .query_map(params![room_id, limit], |row| row.get::<_, String>(0))?
                .filter_map(|payload| match payload {
                    Ok(json) => match serde_json::from_str(&json) {
                        Ok(msg) => Some(msg),
                        Err(e) => {
                            warn!("discarding unreadable cached message: {}", e);
                            None
                        }
                    },
                    Err(_) => None,
                })
                .collect();
            messages.reverse();
            Ok(messages)
        })
    }

    pub fn remove_message(&self, message_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;
            Ok(())
        })
    }

    /// Drop cached messages older than `days_to_keep` days.
    pub fn cleanup(&self, days_to_keep: i64) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::days(days_to_keep)).to_rfc3339();
        self.with_conn(|conn| {
            let removed =
                conn.execute("DELETE FROM messages WHERE created_at < ?1", [&cutoff])?;
            if removed > 0 {
                info!("Cache cleanup removed {} old messages", removed);
            }
            Ok(removed)
        })
    }

    // -- Rooms --

    /// Replace the cached room list. The server owns the list, so there is
    /// nothing to merge: clear and rewrite.
    pub fn cache_rooms(&self, rooms: &[Room]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM rooms", [])?;
            let mut stmt = conn
                .prepare_cached("INSERT INTO rooms (id, payload) VALUES (?1, ?2)")?;
            for room in rooms {
                stmt.execute(params![room.id, serde_json::to_string(room)?])?;
            }
            Ok(())
        })
    }

    pub fn cached_rooms(&self) -> Result<Vec<Room>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT payload FROM rooms ORDER BY id")?;
            let rooms = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .filter_map(|payload| payload.ok())
                .filter_map(|json| serde_json::from_str(&json).ok())
                .collect();
            Ok(rooms)
        })
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &Value) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, serde_json::to_string(value)?],
            )?;
            Ok(())
        })
    }

    pub fn setting(&self, key: &str) -> Result<Option<Value>> {
        self.with_conn(|conn| {
            use rusqlite::OptionalExtension;
            let raw: Option<String> = conn
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(raw.and_then(|json| serde_json::from_str(&json).ok()))
        })
    }

    pub fn remove_setting(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
            Ok(())
        })
    }

    // -- Drafts --

    pub fn save_draft(&self, room_id: i64, content: &str) -> Result<()> {
        self.set_setting(&format!("draft_{}", room_id), &Value::from(content))
    }

    pub fn draft(&self, room_id: i64) -> Result<String> {
        Ok(self
            .setting(&format!("draft_{}", room_id))?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    pub fn clear_draft(&self, room_id: i64) -> Result<()> {
        self.remove_setting(&format!("draft_{}", room_id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use huddle_types::models::{Message, MessageType, Room, RoomKind};
    use serde_json::json;

    use crate::Cache;

    fn message(id: i64, room_id: i64) -> Message {
        Message {
            id,
            room_id,
            sender_id: 1,
            sender_name: "jisoo".into(),
            content: format!("message {}", id),
            message_type: MessageType::Text,
            encrypted: false,
            created_at: Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, id as u32 % 60).unwrap(),
            reply_to: None,
            file_path: None,
            file_name: None,
            reactions: vec![],
            unread_count: 0,
            edited: false,
        }
    }

    #[test]
    fn messages_come_back_oldest_first_and_capped() {
        let cache = Cache::open_in_memory().unwrap();
        let messages: Vec<Message> = (1..=10).map(|id| message(id, 3)).collect();
        cache.cache_messages(3, &messages).unwrap();

        let cached = cache.cached_messages(3, 4).unwrap();
        let ids: Vec<i64> = cached.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![7, 8, 9, 10]);
    }

    #[test]
    fn recaching_replaces_by_id() {
        let cache = Cache::open_in_memory().unwrap();
        let mut msg = message(5, 1);
        cache.cache_messages(1, std::slice::from_ref(&msg)).unwrap();

        msg.content = "edited".into();
        cache.cache_messages(1, &[msg]).unwrap();

        let cached = cache.cached_messages(1, 10).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].content, "edited");
    }

    #[test]
    fn room_list_is_replaced_wholesale() {
        let cache = Cache::open_in_memory().unwrap();
        let room = |id: i64| Room {
            id,
            kind: RoomKind::Group,
            name: Some(format!("room {}", id)),
            partner: None,
            member_count: 2,
            pinned: false,
            muted: false,
            encryption_key: None,
            unread_count: 0,
            last_message_time: None,
            last_message_preview: None,
        };

        cache.cache_rooms(&[room(1), room(2)]).unwrap();
        cache.cache_rooms(&[room(3)]).unwrap();

        let rooms = cache.cached_rooms().unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].id, 3);
    }

    #[test]
    fn draft_lifecycle() {
        let cache = Cache::open_in_memory().unwrap();
        assert_eq!(cache.draft(9).unwrap(), "");

        cache.save_draft(9, "half-written…").unwrap();
        assert_eq!(cache.draft(9).unwrap(), "half-written…");

        cache.clear_draft(9).unwrap();
        assert_eq!(cache.draft(9).unwrap(), "");
    }

    #[test]
    fn settings_store_json_values() {
        let cache = Cache::open_in_memory().unwrap();
        let theme = json!({"mode": "dark", "color": "green", "background": "default"});
        cache.set_setting("theme", &theme).unwrap();
        assert_eq!(cache.setting("theme").unwrap(), Some(theme));
        assert_eq!(cache.setting("missing").unwrap(), None);
    }

    #[test]
    fn cleanup_drops_only_old_messages() {
        let cache = Cache::open_in_memory().unwrap();
        let mut old = message(1, 2);
        old.created_at = Utc::now() - chrono::Duration::days(30);
        let fresh = Message {
            created_at: Utc::now(),
            ..message(2, 2)
        };
        cache.cache_messages(2, &[old, fresh]).unwrap();

        let removed = cache.cleanup(7).unwrap();
        assert_eq!(removed, 1);

        let remaining = cache.cached_messages(2, 10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 2);
    }
}
