//! The open room's message list.
//!
//! Everything here keys off the server-assigned message id, monotonic within
//! a room: resync dedup, pagination cursors, and exhaustion detection. The
//! timeline is only ever patched in place — append, splice, prepend, edit,
//! remove — never rebuilt, so a front-end can diff cheaply.

use std::collections::HashSet;

use huddle_types::models::{Message, ReactionGroup};

/// Messages fetched when a room is opened.
pub const INITIAL_PAGE: usize = 50;

/// Messages fetched per older-history page.
pub const OLDER_PAGE: usize = 30;

#[derive(Debug, Default)]
pub struct Timeline {
    messages: Vec<Message>,
    ids: HashSet<i64>,
    has_more: bool,
    loading_older: bool,
}

impl Timeline {
    /// Build from the initial room fetch. A full page means older history
    /// probably exists; a short one proves there is none.
    pub fn from_initial(messages: Vec<Message>) -> Self {
        let has_more = messages.len() >= INITIAL_PAGE;
        Self::build(messages, has_more)
    }

    /// Build from the offline cache. The cache cannot paginate, so older
    /// history is never offered.
    pub fn from_cached(messages: Vec<Message>) -> Self {
        Self::build(messages, false)
    }

    fn build(messages: Vec<Message>, has_more: bool) -> Self {
        let mut timeline = Self {
            messages: Vec::with_capacity(messages.len()),
            ids: HashSet::new(),
            has_more,
            loading_older: false,
        };
        for msg in messages {
            if timeline.ids.insert(msg.id) {
                timeline.messages.push(msg);
            }
        }
        timeline
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, message_id: i64) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn contains(&self, message_id: i64) -> bool {
        self.ids.contains(&message_id)
    }

    /// Highest message id currently rendered — the resync cursor.
    pub fn max_id(&self) -> Option<i64> {
        self.messages.iter().map(|m| m.id).max()
    }

    pub fn oldest_id(&self) -> Option<i64> {
        self.messages.first().map(|m| m.id)
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading_older(&self) -> bool {
        self.loading_older
    }

    /// Append a live message. Returns false on a duplicate id.
    pub fn append(&mut self, msg: Message) -> bool {
        if !self.ids.insert(msg.id) {
            return false;
        }
        self.messages.push(msg);
        true
    }

    /// Post-reconnect resync: append only messages strictly newer than the
    /// cursor, preserving server order. Re-applying the same list is a no-op,
    /// so a double resync cannot duplicate messages.
    pub fn splice_newer(&mut self, server_messages: Vec<Message>) -> usize {
        let known_max = self.max_id().unwrap_or(0);
        let mut added = 0;
        for msg in server_messages {
            if msg.id > known_max && self.ids.insert(msg.id) {
                self.messages.push(msg);
                added += 1;
            }
        }
        added
    }

    /// Start an older-history fetch. Returns the `before_id` cursor, or
    /// `None` when a fetch is already running, history is exhausted, or the
    /// timeline is empty.
    pub fn begin_older_fetch(&mut self) -> Option<i64> {
        if self.loading_older || !self.has_more {
            return None;
        }
        let before_id = self.oldest_id()?;
        self.loading_older = true;
        Some(before_id)
    }

    /// Prepend an older-history page. A page shorter than [`OLDER_PAGE`]
    /// proves exhaustion and permanently stops further fetches. Anything not
    /// strictly older than the current head is dropped.
    pub fn finish_older_fetch(&mut self, page: Vec<Message>) -> usize {
        self.loading_older = false;

        if page.len() < OLDER_PAGE {
            self.has_more = false;
        }
        if page.is_empty() {
            return 0;
        }

        let head = self.oldest_id().unwrap_or(i64::MAX);
        let mut fresh: Vec<Message> = Vec::with_capacity(page.len());
        for msg in page {
            if msg.id < head && self.ids.insert(msg.id) {
                fresh.push(msg);
            }
        }
        let added = fresh.len();
        self.messages.splice(0..0, fresh);
        added
    }

    /// Clear the in-flight flag after a failed fetch so the next scroll can
    /// retry.
    pub fn abort_older_fetch(&mut self) {
        self.loading_older = false;
    }

    /// Apply a broadcast-back edit. Local edits never patch the timeline
    /// directly; they wait for this.
    pub fn apply_edit(&mut self, message_id: i64, content: String, encrypted: bool) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(msg) => {
                msg.content = content;
                msg.encrypted = encrypted;
                msg.edited = true;
                true
            }
            None => false,
        }
    }

    /// Apply a broadcast-back delete: removal, not tombstoning.
    pub fn remove(&mut self, message_id: i64) -> bool {
        if !self.ids.remove(&message_id) {
            return false;
        }
        self.messages.retain(|m| m.id != message_id);
        true
    }

    pub fn set_reactions(&mut self, message_id: i64, reactions: Vec<ReactionGroup>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(msg) => {
                msg.reactions = reactions;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use huddle_types::models::{Message, MessageType};

    use super::*;

    fn message(id: i64) -> Message {
        Message {
            id,
            room_id: 1,
            sender_id: 2,
            sender_name: "mina".into(),
            content: format!("m{}", id),
            message_type: MessageType::Text,
            encrypted: false,
            created_at: Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap(),
            reply_to: None,
            file_path: None,
            file_name: None,
            reactions: vec![],
            unread_count: 0,
            edited: false,
        }
    }

    fn ids(timeline: &Timeline) -> Vec<i64> {
        timeline.messages().iter().map(|m| m.id).collect()
    }

    #[test]
    fn resync_appends_only_strictly_newer_in_order() {
        let mut timeline = Timeline::from_initial(vec![message(1), message(2), message(5)]);

        let added = timeline.splice_newer(vec![
            message(1),
            message(2),
            message(5),
            message(6),
            message(9),
        ]);

        assert_eq!(added, 2);
        assert_eq!(ids(&timeline), vec![1, 2, 5, 6, 9]);
    }

    #[test]
    fn resync_twice_is_a_no_op() {
        let mut timeline = Timeline::from_initial(vec![message(1), message(2)]);
        let server: Vec<Message> = vec![message(1), message(2), message(3)];

        assert_eq!(timeline.splice_newer(server.clone()), 1);
        assert_eq!(timeline.splice_newer(server), 0);
        assert_eq!(ids(&timeline), vec![1, 2, 3]);
    }

    #[test]
    fn resync_on_empty_timeline_takes_everything() {
        let mut timeline = Timeline::from_initial(vec![]);
        assert_eq!(timeline.splice_newer(vec![message(4), message(7)]), 2);
        assert_eq!(ids(&timeline), vec![4, 7]);
    }

    #[test]
    fn append_rejects_duplicates() {
        let mut timeline = Timeline::from_initial(vec![message(1)]);
        assert!(timeline.append(message(2)));
        assert!(!timeline.append(message(2)));
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn initial_page_size_decides_has_more() {
        let full: Vec<Message> = (1..=INITIAL_PAGE as i64).map(message).collect();
        assert!(Timeline::from_initial(full).has_more());

        let short: Vec<Message> = (1..=10).map(message).collect();
        assert!(!Timeline::from_initial(short).has_more());
    }

    #[test]
    fn pagination_runs_to_exhaustion_without_overlap() {
        // Server holds ids 1..=110; initial load brought 61..=110.
        let initial: Vec<Message> = (61..=110).map(message).collect();
        let mut timeline = Timeline::from_initial(initial);
        let mut seen_pages: Vec<Vec<i64>> = Vec::new();

        loop {
            let Some(before_id) = timeline.begin_older_fetch() else {
                break;
            };
            // Server-side: strictly older than the cursor, newest OLDER_PAGE of them.
            let page: Vec<Message> = (1..before_id)
                .rev()
                .take(OLDER_PAGE)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .map(message)
                .collect();
            assert!(page.iter().all(|m| m.id < before_id));
            seen_pages.push(page.iter().map(|m| m.id).collect());
            timeline.finish_older_fetch(page);
        }

        assert!(!timeline.has_more());
        assert_eq!(ids(&timeline), (1..=110).collect::<Vec<i64>>());

        // Pages are strictly decreasing and non-overlapping.
        let flattened: Vec<i64> = seen_pages.iter().rev().flatten().copied().collect();
        assert_eq!(flattened, (1..=60).collect::<Vec<i64>>());
    }

    #[test]
    fn short_page_disables_further_fetches() {
        let initial: Vec<Message> = (31..=80).map(message).collect();
        let mut timeline = Timeline::from_initial(initial);

        let before_id = timeline.begin_older_fetch().unwrap();
        assert_eq!(before_id, 31);
        let page: Vec<Message> = (1..=30).map(message).collect();
        assert_eq!(timeline.finish_older_fetch(page), 30);
        assert!(timeline.has_more());

        let before_id = timeline.begin_older_fetch().unwrap();
        assert_eq!(before_id, 1);
        assert_eq!(timeline.finish_older_fetch(vec![]), 0);
        assert!(!timeline.has_more());
        assert_eq!(timeline.begin_older_fetch(), None);
    }

    #[test]
    fn concurrent_older_fetches_are_refused() {
        let initial: Vec<Message> = (1..=INITIAL_PAGE as i64).map(message).collect();
        let mut timeline = Timeline::from_initial(initial);

        assert!(timeline.begin_older_fetch().is_some());
        assert_eq!(timeline.begin_older_fetch(), None);

        timeline.abort_older_fetch();
        assert!(timeline.begin_older_fetch().is_some());
    }

    #[test]
    fn older_page_never_admits_newer_ids() {
        let initial: Vec<Message> = (50..=99).map(message).collect();
        let mut timeline = Timeline::from_initial(initial);

        timeline.begin_older_fetch().unwrap();
        // A buggy or racing server response carrying ids >= the cursor.
        let added = timeline.finish_older_fetch(vec![message(10), message(50), message(60)]);
        assert_eq!(added, 1);
        assert_eq!(timeline.oldest_id(), Some(10));
    }

    #[test]
    fn edit_and_delete_patch_in_place() {
        let mut timeline = Timeline::from_initial(vec![message(1), message(2), message(3)]);

        assert!(timeline.apply_edit(2, "changed".into(), true));
        let edited = timeline.get(2).unwrap();
        assert_eq!(edited.content, "changed");
        assert!(edited.encrypted);
        assert!(edited.edited);

        assert!(timeline.remove(3));
        assert!(!timeline.remove(3));
        assert_eq!(ids(&timeline), vec![1, 2]);
        assert!(!timeline.contains(3));
    }
}
