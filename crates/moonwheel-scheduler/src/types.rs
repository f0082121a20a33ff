use std::fmt;

use serde::Serialize;

/// The two scheduler loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    DailyDigest,
    EventAlert,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopKind::DailyDigest => write!(f, "daily_digest"),
            LoopKind::EventAlert => write!(f, "event_alert"),
        }
    }
}

/// What happened to one subscriber during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOutcome {
    Sent,
    /// Not due, or already sent.
    Skipped,
    Failed,
}

/// Per-tick counters. `considered == sent + skipped + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Subscribed users loaded this tick.
    pub considered: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TickReport {
    pub fn record(&mut self, outcome: UserOutcome) {
        self.considered += 1;
        match outcome {
            UserOutcome::Sent => self.sent += 1,
            UserOutcome::Skipped => self.skipped += 1,
            UserOutcome::Failed => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_totals_consistent() {
        let mut r = TickReport::default();
        r.record(UserOutcome::Sent);
        r.record(UserOutcome::Skipped);
        r.record(UserOutcome::Skipped);
        r.record(UserOutcome::Failed);
        assert_eq!(r.considered, r.sent + r.skipped + r.failed);
        assert_eq!((r.sent, r.skipped, r.failed), (1, 2, 1));
    }
}
