use crate::collectors::Snapshot;
use std::time::{Duration, UNIX_EPOCH};

#[derive(Debug, Clone, Default)]
pub struct State {
    pub started_at_unix: i64,
    pub last_collect_timestamp_seconds: i64,
    pub cycles: u64,
    pub measurement: String,
    pub snapshot: Snapshot,
}

impl State {
    pub fn new(started_at_unix: i64, measurement: impl Into<String>) -> Self {
        Self {
            started_at_unix,
            measurement: measurement.into(),
            ..Self::default()
        }
    }

    pub fn update_collected(&mut self, now_unix: i64, snapshot: Snapshot) {
        self.last_collect_timestamp_seconds = now_unix;
        self.cycles = self.cycles.saturating_add(1);
        self.snapshot = snapshot;
    }

    /// RFC 3339 time of the last cycle, `None` before the first one.
    pub fn last_collect_at(&self) -> Option<String> {
        if self.cycles == 0 {
            return None;
        }
        let secs = u64::try_from(self.last_collect_timestamp_seconds).unwrap_or(0);
        let st = UNIX_EPOCH + Duration::from_secs(secs);
        Some(humantime::format_rfc3339_seconds(st).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::FieldValue;

    #[test]
    fn update_replaces_snapshot_and_counts_cycles() {
        let mut state = State::new(100, "core");
        assert_eq!(state.last_collect_at(), None);

        let mut first = Snapshot::default();
        first.insert("thermo", 40000);
        state.update_collected(110, first);

        let mut second = Snapshot::default();
        second.insert("thermo", FieldValue::Absent);
        state.update_collected(120, second.clone());

        assert_eq!(state.cycles, 2);
        assert_eq!(state.last_collect_timestamp_seconds, 120);
        assert_eq!(state.snapshot, second);
        assert_eq!(
            state.last_collect_at().as_deref(),
            Some("1970-01-01T00:02:00Z")
        );
    }
}
