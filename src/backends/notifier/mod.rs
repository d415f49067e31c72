//! Built-in notification channels, all plain HTTP webhooks

mod discord;
mod slack;
mod webhook;

pub use discord::Discord;
pub use slack::Slack;
pub use webhook::Webhook;

use super::{Notifier, NotifierContext, NotifierFactory};
use crate::registry::{Registry, RegistryError};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error};

/// Upper bound for one notification request
const MAX_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

fn factory<N, F>(build: F) -> NotifierFactory
where
    N: Notifier + 'static,
    F: Fn(NotifierContext) -> anyhow::Result<N> + Send + Sync + 'static,
{
    Box::new(move |ctx: NotifierContext| Ok(Box::new(build(ctx)?) as Box<dyn Notifier>))
}

/// Register every built-in notifier type
pub fn register_all(registry: &mut Registry<NotifierFactory>) -> Result<(), RegistryError> {
    registry.register("webhook", factory(Webhook::new))?;
    registry.register("discord", factory(Discord::new))?;
    registry.register("slack", factory(Slack::new))?;
    Ok(())
}

/// Whether a title announces a successful run
pub(crate) fn is_success_title(title: &str) -> bool {
    title.contains("] OK")
}

/// Send a JSON request and fail on any non-2xx status
pub(crate) fn send_json<T: Serialize>(
    method: &str,
    url: &str,
    headers: &BTreeMap<String, String>,
    payload: &T,
    timeout: Duration,
) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout.min(MAX_NOTIFY_TIMEOUT))
        .build()
        .context("Failed to create HTTP client")?;

    let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", method))?;

    let mut request = client
        .request(method, url)
        .header("Content-Type", "application/json")
        .json(payload);
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request.send().context("Failed to send webhook")?;

    let status = response.status();
    if status.is_success() {
        debug!("Webhook sent successfully");
        Ok(())
    } else {
        let body = response.text().unwrap_or_default();
        error!("Webhook failed with status {}: {}", status, body);
        anyhow::bail!("Webhook failed with status {}: {}", status, body)
    }
}
