use std::time::{Duration, Instant};

/// Transport connection state.
///
/// `disconnected → connecting → connected`; a transport error moves
/// `connected → reconnecting`, which resolves back to `connected` or, once
/// the retry budget is spent, to `disconnected` for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Human-readable label for the status indicator.
    pub fn label(&self) -> String {
        match self {
            Self::Disconnected => "connection lost".into(),
            Self::Connecting => "connecting…".into(),
            Self::Connected => "connected".into(),
            Self::Reconnecting { attempt } => format!("reconnecting… ({})", attempt),
        }
    }
}

/// How long the "connected" state stays on screen before auto-hiding.
pub const CONNECTED_VISIBLE_FOR: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
enum Visibility {
    Hidden,
    Always,
    Until(Instant),
}

/// View state for the connection status indicator.
///
/// Trouble states stay visible until resolved; a successful connection shows
/// briefly and then hides itself.
#[derive(Debug)]
pub struct StatusIndicator {
    status: ConnectionStatus,
    visibility: Visibility,
}

impl StatusIndicator {
    /// Starts hidden: nothing is shown until the first transition.
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            visibility: Visibility::Hidden,
        }
    }

    pub fn apply(&mut self, status: ConnectionStatus, now: Instant) {
        self.status = status;
        self.visibility = match status {
            ConnectionStatus::Connected => Visibility::Until(now + CONNECTED_VISIBLE_FOR),
            _ => Visibility::Always,
        };
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_visible(&self, now: Instant) -> bool {
        match self.visibility {
            Visibility::Hidden => false,
            Visibility::Always => true,
            Visibility::Until(deadline) => now < deadline,
        }
    }

    pub fn label(&self) -> String {
        self.status.label()
    }
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_carry_the_attempt_counter() {
        assert_eq!(ConnectionStatus::Connected.label(), "connected");
        assert_eq!(
            ConnectionStatus::Reconnecting { attempt: 3 }.label(),
            "reconnecting… (3)"
        );
    }

    #[test]
    fn indicator_starts_hidden() {
        let indicator = StatusIndicator::new();
        assert!(!indicator.is_visible(Instant::now()));
    }

    #[test]
    fn connected_auto_hides_after_two_seconds() {
        let mut indicator = StatusIndicator::new();
        let now = Instant::now();
        indicator.apply(ConnectionStatus::Connected, now);

        assert!(indicator.is_visible(now));
        assert!(indicator.is_visible(now + Duration::from_millis(1999)));
        assert!(!indicator.is_visible(now + CONNECTED_VISIBLE_FOR));
    }

    #[test]
    fn trouble_states_stay_visible() {
        let mut indicator = StatusIndicator::new();
        let now = Instant::now();
        indicator.apply(ConnectionStatus::Reconnecting { attempt: 1 }, now);

        assert!(indicator.is_visible(now + Duration::from_secs(3600)));

        indicator.apply(ConnectionStatus::Disconnected, now);
        assert!(indicator.is_visible(now + Duration::from_secs(3600)));
    }
}
