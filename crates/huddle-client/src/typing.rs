//! Typing indicator aggregation.
//!
//! Each remote typist gets an independent expiry; the tracker holds state for
//! exactly one room and is cleared wholesale on room switch so a label can
//! never leak across rooms.

use std::time::{Duration, Instant};

/// A typist disappears after this much silence.
pub const TYPING_EXPIRY: Duration = Duration::from_secs(3);

/// Local input keeps signalling `is_typing: true` for this long after the
/// last keystroke before the stop event is emitted.
pub const LOCAL_TYPING_LINGER: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct TypingEntry {
    user_id: i64,
    nickname: String,
    expires_at: Instant,
}

/// First-typed order is preserved so the label is stable while people keep
/// typing.
#[derive(Debug, Default)]
pub struct TypingTracker {
    entries: Vec<TypingEntry>,
}

impl TypingTracker {
    pub fn observe(&mut self, user_id: i64, nickname: &str, is_typing: bool, now: Instant) {
        self.prune(now);
        if is_typing {
            match self.entries.iter_mut().find(|e| e.user_id == user_id) {
                Some(entry) => {
                    entry.nickname = nickname.to_string();
                    entry.expires_at = now + TYPING_EXPIRY;
                }
                None => self.entries.push(TypingEntry {
                    user_id,
                    nickname: nickname.to_string(),
                    expires_at: now + TYPING_EXPIRY,
                }),
            }
        } else {
            self.entries.retain(|e| e.user_id != user_id);
        }
    }

    fn prune(&mut self, now: Instant) {
        self.entries.retain(|e| e.expires_at > now);
    }

    pub fn active_names(&mut self, now: Instant) -> Vec<&str> {
        self.prune(now);
        self.entries.iter().map(|e| e.nickname.as_str()).collect()
    }

    /// Indicator text, compact by count.
    pub fn label(&mut self, now: Instant) -> Option<String> {
        let names = self.active_names(now);
        match names.len() {
            0 => None,
            1 => Some(format!("{} is typing…", names[0])),
            2 => Some(format!("{}, {} are typing…", names[0], names[1])),
            n => Some(format!("{} and {} others are typing…", names[0], n - 1)),
        }
    }

    /// Room switch: drop everything, timers included.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_expires_a_typist() {
        let mut tracker = TypingTracker::default();
        let start = Instant::now();
        tracker.observe(1, "amy", true, start);

        assert_eq!(tracker.label(start + Duration::from_secs(2)).unwrap(), "amy is typing…");
        assert_eq!(tracker.label(start + Duration::from_millis(3001)), None);
    }

    #[test]
    fn two_typists_get_the_combined_label() {
        let mut tracker = TypingTracker::default();
        let now = Instant::now();
        tracker.observe(1, "amy", true, now);
        tracker.observe(2, "bo", true, now);

        assert_eq!(tracker.label(now).unwrap(), "amy, bo are typing…");
    }

    #[test]
    fn three_or_more_collapse_to_a_count() {
        let mut tracker = TypingTracker::default();
        let now = Instant::now();
        tracker.observe(1, "amy", true, now);
        tracker.observe(2, "bo", true, now);
        tracker.observe(3, "cho", true, now);

        assert_eq!(tracker.label(now).unwrap(), "amy and 2 others are typing…");
    }

    #[test]
    fn re_typing_refreshes_the_expiry() {
        let mut tracker = TypingTracker::default();
        let start = Instant::now();
        tracker.observe(1, "amy", true, start);
        tracker.observe(1, "amy", true, start + Duration::from_secs(2));

        // 4s after the first event but only 2s after the refresh.
        assert!(tracker.label(start + Duration::from_secs(4)).is_some());
    }

    #[test]
    fn explicit_stop_removes_immediately() {
        let mut tracker = TypingTracker::default();
        let now = Instant::now();
        tracker.observe(1, "amy", true, now);
        tracker.observe(1, "amy", false, now);

        assert_eq!(tracker.label(now), None);
    }

    #[test]
    fn clear_drops_all_state() {
        let mut tracker = TypingTracker::default();
        let now = Instant::now();
        tracker.observe(1, "amy", true, now);
        tracker.observe(2, "bo", true, now);

        tracker.clear();
        assert_eq!(tracker.label(now), None);
    }
}
