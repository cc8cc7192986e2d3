use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::models::{AlertEvent, CheckResult};

#[derive(Debug, Clone, Copy)]
pub struct TargetState {
    pub last_online: bool,
    pub last_checked_at: DateTime<Utc>,
}

/// Last-known online/offline state per target name. Alerts are derived from
/// transitions only: the first observation of a name baselines silently so a
/// process restart never produces an alert storm.
#[derive(Debug, Default)]
pub struct StateTracker {
    states: HashMap<String, TargetState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, result: &CheckResult, at: DateTime<Utc>) -> Option<AlertEvent> {
        match self.states.get_mut(&result.name) {
            None => {
                self.states.insert(
                    result.name.clone(),
                    TargetState {
                        last_online: result.online,
                        last_checked_at: at,
                    },
                );
                None
            }
            Some(state) if state.last_online == result.online => {
                state.last_checked_at = at;
                None
            }
            Some(state) => {
                let previous = state.last_online;
                state.last_online = result.online;
                state.last_checked_at = at;
                Some(AlertEvent {
                    name: result.name.clone(),
                    previous,
                    current: result.online,
                    message: format!(
                        "{} went {}",
                        result.name,
                        if result.online { "online" } else { "offline" }
                    ),
                })
            }
        }
    }

    /// Drop states for names no longer in the registry, so a removed target
    /// cannot resurrect a stale alert if its name is later reused.
    pub fn prune<'a>(&mut self, live_names: impl IntoIterator<Item = &'a str>) {
        let live: HashSet<&str> = live_names.into_iter().collect();
        self.states.retain(|name, _| live.contains(name.as_str()));
    }

    pub fn get(&self, name: &str) -> Option<&TargetState> {
        self.states.get(name)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckKind;

    fn result(name: &str, online: bool) -> CheckResult {
        CheckResult {
            name: name.into(),
            host: Some("10.0.0.1".into()),
            kind: CheckKind::Ping,
            online,
            response_time_ms: None,
            error: None,
        }
    }

    #[test]
    fn first_observation_baselines_silently() {
        let mut tracker = StateTracker::new();
        assert!(tracker.observe(&result("Web", true), Utc::now()).is_none());
        assert!(tracker.observe(&result("Db", false), Utc::now()).is_none());
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn steady_state_refreshes_timestamp_without_alerting() {
        let mut tracker = StateTracker::new();
        let first = Utc::now();
        tracker.observe(&result("Web", true), first);
        let later = first + chrono::Duration::seconds(60);
        assert!(tracker.observe(&result("Web", true), later).is_none());
        assert_eq!(tracker.get("Web").unwrap().last_checked_at, later);
    }

    #[test]
    fn transition_emits_one_alert_with_direction() {
        let mut tracker = StateTracker::new();
        tracker.observe(&result("Web", true), Utc::now());

        let alert = tracker.observe(&result("Web", false), Utc::now()).unwrap();
        assert!(alert.previous);
        assert!(!alert.current);
        assert_eq!(alert.message, "Web went offline");

        let alert = tracker.observe(&result("Web", true), Utc::now()).unwrap();
        assert_eq!(alert.message, "Web went online");
    }

    #[test]
    fn prune_drops_names_absent_from_registry() {
        let mut tracker = StateTracker::new();
        tracker.observe(&result("Web", true), Utc::now());
        tracker.observe(&result("Db", true), Utc::now());

        tracker.prune(["Web"]);
        assert!(tracker.get("Web").is_some());
        assert!(tracker.get("Db").is_none());

        // A reused name starts over with a silent baseline.
        assert!(tracker.observe(&result("Db", false), Utc::now()).is_none());
    }
}
