use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

use crate::models::{CheckKind, Target};

const TARGETS_KEY: &str = "monitoring.servers";

/// The registry persists its target list as one JSON-encoded string value in
/// an external key-value store.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Flat JSON object on disk, one file per store.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut map = self.read_map().unwrap_or_default();
        map.insert(key.to_string(), value.to_string());
        let encoded = serde_json::to_string_pretty(&map)?;
        std::fs::write(&self.path, encoded)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

/// Raw administrative input, exactly as a form or API client submits it.
/// Everything is a string until validation says otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub check_type: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name is required")]
    NameRequired,
    #[error("Type must be ping, http, https, or ssh")]
    TypeInvalid,
    #[error("URL is required for HTTP(S)")]
    UrlRequired,
    #[error("Host is required for PING")]
    HostRequiredPing,
    #[error("Host is required for SSH")]
    HostRequiredSsh,
    #[error("Port must be a number")]
    PortInvalid,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("A target named '{0}' already exists")]
    DuplicateName(String),
    #[error("No target at index {0}")]
    IndexOutOfRange(usize),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub fn validate(draft: &TargetDraft) -> Result<Target, ValidationError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(ValidationError::NameRequired);
    }

    let kind: CheckKind = draft
        .check_type
        .trim()
        .parse()
        .map_err(|_| ValidationError::TypeInvalid)?;

    let port = match draft.port.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => Some(raw.parse::<u16>().map_err(|_| ValidationError::PortInvalid)?),
        None => None,
    };
    let host = draft
        .host
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string);
    let url = draft
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string);

    match kind {
        CheckKind::Http | CheckKind::Https if url.is_none() => Err(ValidationError::UrlRequired),
        CheckKind::Ping if host.is_none() => Err(ValidationError::HostRequiredPing),
        CheckKind::Ssh if host.is_none() => Err(ValidationError::HostRequiredSsh),
        _ => Ok(Target {
            name: name.to_string(),
            kind,
            host,
            port,
            url,
        }),
    }
}

pub struct Registry<S: KvStore> {
    store: S,
}

impl<S: KvStore> Registry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Missing, empty, or malformed stored JSON degrades to an empty target
    /// list with a warning; a broken store never takes monitoring down.
    pub fn load(&self) -> Vec<Target> {
        let raw = match self.store.get(TARGETS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("target store unreadable, monitoring an empty list: {e:#}");
                return Vec::new();
            }
        };
        if raw.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str(&raw) {
            Ok(targets) => targets,
            Err(e) => {
                warn!("stored target list is malformed, monitoring an empty list: {e}");
                Vec::new()
            }
        }
    }

    pub fn save(&self, targets: &[Target]) -> anyhow::Result<()> {
        let encoded = serde_json::to_string(targets)?;
        self.store.set(TARGETS_KEY, &encoded)
    }

    pub fn list(&self) -> Vec<Target> {
        self.load()
    }

    pub fn get(&self, index: usize) -> Result<Target, RegistryError> {
        self.load()
            .into_iter()
            .nth(index)
            .ok_or(RegistryError::IndexOutOfRange(index))
    }

    pub fn add(&self, draft: TargetDraft) -> Result<Target, RegistryError> {
        let target = validate(&draft)?;
        let mut targets = self.load();
        if let Some(existing) = find_name(&targets, &target.name, None) {
            return Err(RegistryError::DuplicateName(existing));
        }
        targets.push(target.clone());
        self.save(&targets)?;
        Ok(target)
    }

    pub fn update(&self, index: usize, draft: TargetDraft) -> Result<Target, RegistryError> {
        let target = validate(&draft)?;
        let mut targets = self.load();
        if index >= targets.len() {
            return Err(RegistryError::IndexOutOfRange(index));
        }
        if let Some(existing) = find_name(&targets, &target.name, Some(index)) {
            return Err(RegistryError::DuplicateName(existing));
        }
        targets[index] = target.clone();
        self.save(&targets)?;
        Ok(target)
    }

    pub fn delete(&self, index: usize) -> Result<Target, RegistryError> {
        let mut targets = self.load();
        if index >= targets.len() {
            return Err(RegistryError::IndexOutOfRange(index));
        }
        let removed = targets.remove(index);
        self.save(&targets)?;
        Ok(removed)
    }
}

fn find_name(targets: &[Target], name: &str, skip: Option<usize>) -> Option<String> {
    targets
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != skip)
        .find(|(_, t)| t.name.eq_ignore_ascii_case(name))
        .map(|(_, t)| t.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemStore {
        values: Mutex<HashMap<String, String>>,
    }

    impl KvStore for MemStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn registry() -> Registry<MemStore> {
        Registry::new(MemStore::default())
    }

    fn draft(name: &str, kind: &str) -> TargetDraft {
        TargetDraft {
            name: name.into(),
            check_type: kind.into(),
            host: Some("10.0.0.1".into()),
            port: None,
            url: Some("http://example.test".into()),
        }
    }

    #[test]
    fn validation_messages_match_the_admin_contract() {
        let mut d = draft("Web", "http");
        d.url = None;
        assert_eq!(
            validate(&d).unwrap_err().to_string(),
            "URL is required for HTTP(S)"
        );

        let mut d = draft("Web", "ping");
        d.host = None;
        assert_eq!(
            validate(&d).unwrap_err().to_string(),
            "Host is required for PING"
        );

        let mut d = draft("Web", "ssh");
        d.host = Some("  ".into());
        assert_eq!(
            validate(&d).unwrap_err().to_string(),
            "Host is required for SSH"
        );

        assert_eq!(
            validate(&draft("Web", "tcp")).unwrap_err().to_string(),
            "Type must be ping, http, https, or ssh"
        );

        assert_eq!(
            validate(&draft("   ", "ping")).unwrap_err().to_string(),
            "Name is required"
        );
    }

    #[test]
    fn port_parses_as_integer_or_fails_hard() {
        let mut d = draft("Web", "ssh");
        d.port = Some("2222".into());
        assert_eq!(validate(&d).unwrap().port, Some(2222));

        d.port = Some("not-a-port".into());
        assert_eq!(validate(&d), Err(ValidationError::PortInvalid));

        // Blank is absent, not invalid.
        d.port = Some("  ".into());
        assert_eq!(validate(&d).unwrap().port, None);
    }

    #[test]
    fn check_type_is_normalized_on_the_way_in() {
        let target = validate(&draft("Web", " HTTPS ")).unwrap();
        assert_eq!(target.kind, CheckKind::Https);
    }

    #[test]
    fn add_update_delete_round_trip() {
        let reg = registry();
        reg.add(draft("Web", "http")).unwrap();
        reg.add(draft("Db", "ssh")).unwrap();
        assert_eq!(reg.list().len(), 2);

        let mut edit = draft("Db", "ssh");
        edit.port = Some("2022".into());
        let updated = reg.update(1, edit).unwrap();
        assert_eq!(updated.port, Some(2022));
        assert_eq!(reg.get(1).unwrap().port, Some(2022));

        let removed = reg.delete(0).unwrap();
        assert_eq!(removed.name, "Web");
        assert_eq!(reg.list().len(), 1);
        assert_eq!(reg.list()[0].name, "Db");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let reg = registry();
        reg.add(draft("Web", "http")).unwrap();

        let err = reg.add(draft("WEB", "ping")).unwrap_err();
        assert_eq!(err.to_string(), "A target named 'Web' already exists");

        // Updating a target in place keeps its own name available.
        reg.add(draft("Db", "ssh")).unwrap();
        assert!(reg.update(1, draft("Db", "ssh")).is_ok());
        assert!(matches!(
            reg.update(1, draft("Web", "ssh")),
            Err(RegistryError::DuplicateName(_))
        ));
    }

    #[test]
    fn bad_indexes_are_reported() {
        let reg = registry();
        assert_eq!(
            reg.delete(3).unwrap_err().to_string(),
            "No target at index 3"
        );
        assert!(matches!(
            reg.update(0, draft("Web", "http")),
            Err(RegistryError::IndexOutOfRange(0))
        ));
        assert!(reg.get(0).is_err());
    }

    #[test]
    fn malformed_store_degrades_to_empty_list() {
        let store = MemStore::default();
        store.set(TARGETS_KEY, "{not json").unwrap();
        let reg = Registry::new(store);
        assert!(reg.load().is_empty());

        let store = MemStore::default();
        store.set(TARGETS_KEY, "   ").unwrap();
        assert!(Registry::new(store).load().is_empty());

        assert!(registry().load().is_empty());
    }

    #[test]
    fn saved_targets_load_back_intact() {
        let reg = registry();
        let saved = reg.add(draft("Web", "https")).unwrap();
        let loaded = reg.load();
        assert_eq!(loaded, vec![saved]);
    }
}
