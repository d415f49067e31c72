use super::send_json;
use crate::backends::{adapter_options, Notifier, NotifierContext};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SlackOptions {
    url: String,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Debug, Serialize)]
struct SlackPayload {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
}

/// Slack incoming webhook
pub struct Slack {
    options: SlackOptions,
    timeout: Duration,
}

impl Slack {
    pub fn new(ctx: NotifierContext) -> Result<Self> {
        let options = adapter_options(&ctx.config)?;
        Ok(Self {
            options,
            timeout: ctx.timeout,
        })
    }

    fn build_payload(&self, title: &str, message: &str) -> SlackPayload {
        SlackPayload {
            text: format!("*{}*\n{}", title, message),
            channel: self.options.channel.clone(),
        }
    }
}

impl Notifier for Slack {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        let payload = self.build_payload(title, message);
        send_json("POST", &self.options.url, &BTreeMap::new(), &payload, self.timeout)
    }
}
