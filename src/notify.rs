use chrono::Utc;
use std::time::Duration;
use tracing::warn;

use crate::models::AlertEvent;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Forwards alert events to a webhook. Delivery runs on a detached task under
/// a request timeout, so a stuck or unreachable endpoint can never stall the
/// polling loop; failures are logged and swallowed.
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
            timeout: DELIVERY_TIMEOUT,
        }
    }

    pub fn dispatch(&self, alert: &AlertEvent) {
        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let client = self.client.clone();
        let timeout = self.timeout;
        let alert = alert.clone();
        tokio::spawn(async move {
            deliver(client, url, timeout, alert).await;
        });
    }
}

async fn deliver(client: reqwest::Client, url: String, timeout: Duration, alert: AlertEvent) {
    let color = if alert.current { 0x2ECC71 } else { 0xE74C3C };
    let payload = serde_json::json!({
        "username": "hostpulse",
        "embeds": [{
            "title": "Target status transition",
            "description": alert.message.clone(),
            "color": color,
            "fields": [
                { "name": "Target", "value": alert.name.clone(), "inline": true },
                {
                    "name": "Transition",
                    "value": format!(
                        "{} \u{2192} {}",
                        label(alert.previous),
                        label(alert.current),
                    ),
                    "inline": true
                }
            ],
            "timestamp": Utc::now().to_rfc3339(),
        }]
    });

    if let Err(e) = client.post(&url).timeout(timeout).json(&payload).send().await {
        warn!("webhook delivery failed for '{}': {e}", alert.name);
    }
}

fn label(online: bool) -> &'static str {
    if online {
        "online"
    } else {
        "offline"
    }
}
