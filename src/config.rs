use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

fn default_check_interval() -> u64 { 60 }
fn default_api_port() -> u16 { 3000 }
fn default_max_concurrency() -> usize { 16 }
fn default_probe_timeout_ms() -> u64 { 5000 }
fn default_store_path() -> String { "store.json".into() }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            webhook_url: None,
            api_port: default_api_port(),
            max_concurrency: default_max_concurrency(),
            probe_timeout_ms: default_probe_timeout_ms(),
            store_path: default_store_path(),
        }
    }
}

impl MonitorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }
}
