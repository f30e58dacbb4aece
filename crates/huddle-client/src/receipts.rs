//! Live read-receipt bookkeeping.
//!
//! The server is authoritative at room-open time (each member's
//! `last_read_message_id` rides along with the message fetch); after that,
//! `read_updated` events only decrement the remaining-unread counters on the
//! user's own messages. Dedup by `(message_id, user_id)` lives here, in
//! coordinator state, so a replayed event can never double-decrement.

use std::collections::HashSet;

use crate::timeline::Timeline;

#[derive(Debug, Default)]
pub struct ReadLedger {
    seen: HashSet<(i64, i64)>,
}

impl ReadLedger {
    /// Apply a `read_updated` event: `user_id` has read everything up to
    /// `message_id`. Returns the ids whose unread count changed.
    pub fn apply(
        &mut self,
        timeline: &mut Timeline,
        self_id: i64,
        message_id: i64,
        user_id: i64,
    ) -> Vec<i64> {
        // One's own read events carry no information about other members.
        if user_id == self_id {
            return Vec::new();
        }

        let mut updated = Vec::new();
        for msg in timeline.messages_mut() {
            if msg.id > message_id || !msg.is_own(self_id) || msg.unread_count == 0 {
                continue;
            }
            if self.seen.insert((msg.id, user_id)) {
                msg.unread_count -= 1;
                updated.push(msg.id);
            }
        }
        updated
    }

    /// Reset when a room is opened; the fetch brought fresh counts.
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use huddle_types::models::{Message, MessageType};

    use super::*;

    fn own_message(id: i64, unread_count: u32) -> Message {
        Message {
            id,
            room_id: 1,
            sender_id: 10,
            sender_name: "me".into(),
            content: "x".into(),
            message_type: MessageType::Text,
            encrypted: false,
            created_at: Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap(),
            reply_to: None,
            file_path: None,
            file_name: None,
            reactions: vec![],
            unread_count,
            edited: false,
        }
    }

    fn unread_counts(timeline: &Timeline) -> Vec<u32> {
        timeline.messages().iter().map(|m| m.unread_count).collect()
    }

    #[test]
    fn decrements_own_messages_up_to_the_read_mark() {
        let mut timeline = Timeline::from_initial(vec![
            own_message(1, 2),
            own_message(2, 2),
            own_message(3, 2),
        ]);
        let mut ledger = ReadLedger::default();

        let updated = ledger.apply(&mut timeline, 10, 2, 20);
        assert_eq!(updated, vec![1, 2]);
        assert_eq!(unread_counts(&timeline), vec![1, 1, 2]);
    }

    #[test]
    fn duplicate_events_decrement_at_most_once() {
        let mut timeline = Timeline::from_initial(vec![own_message(1, 3)]);
        let mut ledger = ReadLedger::default();

        assert_eq!(ledger.apply(&mut timeline, 10, 1, 20), vec![1]);
        assert_eq!(ledger.apply(&mut timeline, 10, 1, 20), Vec::<i64>::new());
        assert_eq!(unread_counts(&timeline), vec![2]);
    }

    #[test]
    fn distinct_readers_each_count() {
        let mut timeline = Timeline::from_initial(vec![own_message(1, 2)]);
        let mut ledger = ReadLedger::default();

        ledger.apply(&mut timeline, 10, 1, 20);
        ledger.apply(&mut timeline, 10, 1, 21);
        assert_eq!(unread_counts(&timeline), vec![0]);
    }

    #[test]
    fn a_later_mark_only_touches_the_gap() {
        let mut timeline =
            Timeline::from_initial(vec![own_message(1, 1), own_message(2, 1)]);
        let mut ledger = ReadLedger::default();

        ledger.apply(&mut timeline, 10, 1, 20);
        let updated = ledger.apply(&mut timeline, 10, 2, 20);
        assert_eq!(updated, vec![2]);
        assert_eq!(unread_counts(&timeline), vec![0, 0]);
    }

    #[test]
    fn own_read_events_are_ignored() {
        let mut timeline = Timeline::from_initial(vec![own_message(1, 2)]);
        let mut ledger = ReadLedger::default();

        assert!(ledger.apply(&mut timeline, 10, 1, 10).is_empty());
        assert_eq!(unread_counts(&timeline), vec![2]);
    }
}
