use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::checker::Prober;
use crate::models::{AlertEvent, CheckResult, StatusSnapshot, Target};
use crate::state::StateTracker;

/// One engine instance owns its registry snapshot and its state tracker, so
/// independent instances never interfere. The tracker is the only shared
/// mutable resource; each alert pass holds its lock exactly once.
pub struct Engine<P: Prober> {
    prober: P,
    targets: RwLock<Vec<Target>>,
    tracker: Mutex<StateTracker>,
    parallelism: usize,
}

impl<P: Prober> Engine<P> {
    pub fn new(prober: P, targets: Vec<Target>, parallelism: usize) -> Self {
        Self {
            prober,
            targets: RwLock::new(targets),
            tracker: Mutex::new(StateTracker::new()),
            parallelism: parallelism.max(1),
        }
    }

    pub async fn targets(&self) -> Vec<Target> {
        self.targets.read().await.clone()
    }

    /// Replaces the registry snapshot. Tracker states are left alone, so an
    /// edit that keeps a target's name neither re-baselines it nor fires a
    /// spurious alert.
    pub async fn update_servers(&self, targets: Vec<Target>) {
        *self.targets.write().await = targets;
    }

    /// Probes every target with bounded parallelism. Results come back in
    /// input order, one per target, no matter how individual probes fare.
    pub async fn check_targets(&self, targets: &[Target]) -> Vec<CheckResult> {
        let probes: Vec<_> = targets.iter().map(|t| self.check_one(t)).collect();
        stream::iter(probes)
            .buffered(self.parallelism)
            .collect()
            .await
    }

    pub async fn check_all(&self) -> Vec<CheckResult> {
        let targets = self.targets().await;
        self.check_targets(&targets).await
    }

    pub async fn check_one(&self, target: &Target) -> CheckResult {
        let (online, response_time_ms, error) = match self.prober.probe(target).await {
            Ok(outcome) => (outcome.reachable, outcome.latency_ms, None),
            Err(e) => (false, None, Some(e.to_string())),
        };

        CheckResult {
            name: target.name.clone(),
            host: target.host.clone(),
            kind: target.kind,
            online,
            response_time_ms,
            error,
        }
    }

    /// Runs a full pass and returns only the transitions. First sight of a
    /// name baselines silently; an empty list means nothing changed.
    pub async fn get_alerts(&self) -> Vec<AlertEvent> {
        let targets = self.targets().await;
        let results = self.check_targets(&targets).await;
        let now = Utc::now();

        let mut tracker = self.tracker.lock().await;
        tracker.prune(targets.iter().map(|t| t.name.as_str()));
        let alerts: Vec<AlertEvent> = results
            .iter()
            .filter_map(|r| tracker.observe(r, now))
            .collect();
        drop(tracker);

        debug!(checks = results.len(), alerts = alerts.len(), "alert pass done");
        alerts
    }

    /// Fresh snapshot of every target, for display. Deliberately does not
    /// touch the tracker: a status query can neither suppress nor duplicate
    /// an alert that a concurrent alert pass would see.
    pub async fn get_full_status(&self) -> StatusSnapshot {
        let results = self.check_all().await;
        StatusSnapshot {
            results,
            checked_at: Utc::now(),
        }
    }
}

/// Picks the first target whose name appears, case-insensitively, in the
/// query text. Registry order breaks ties; callers fall back to every target
/// when nothing matches.
pub fn match_query<'a>(text: &str, targets: &'a [Target]) -> Option<&'a Target> {
    let text = text.to_lowercase();
    targets
        .iter()
        .find(|t| !t.name.is_empty() && text.contains(&t.name.to_lowercase()))
}

pub fn describe(result: &CheckResult) -> String {
    format!(
        "{} is {}.",
        result.name,
        if result.online { "online" } else { "offline" }
    )
}

pub fn summarize(results: &[CheckResult]) -> String {
    if results.is_empty() {
        return "No servers are configured.".to_string();
    }

    let online: Vec<&str> = results
        .iter()
        .filter(|r| r.online)
        .map(|r| r.name.as_str())
        .collect();
    let offline: Vec<&str> = results
        .iter()
        .filter(|r| !r.online)
        .map(|r| r.name.as_str())
        .collect();

    let mut parts = Vec::new();
    if !online.is_empty() {
        parts.push(format!(
            "{} server{} online: {}",
            online.len(),
            if online.len() != 1 { "s" } else { "" },
            online.join(", ")
        ));
    }
    if !offline.is_empty() {
        parts.push(format!(
            "{} server{} offline: {}",
            offline.len(),
            if offline.len() != 1 { "s" } else { "" },
            offline.join(", ")
        ));
    }
    format!("{}.", parts.join(". "))
}
