use super::send_json;
use crate::backends::{adapter_options, Notifier, NotifierContext};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct WebhookOptions {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "POST".to_string()
}

#[derive(Debug, Serialize, PartialEq)]
struct WebhookPayload<'a> {
    model: &'a str,
    title: &'a str,
    message: &'a str,
    success: bool,
}

/// Generic JSON webhook
pub struct Webhook {
    model: String,
    options: WebhookOptions,
    timeout: Duration,
}

impl Webhook {
    pub fn new(ctx: NotifierContext) -> Result<Self> {
        let options = adapter_options(&ctx.config)?;
        Ok(Self {
            model: ctx.model,
            options,
            timeout: ctx.timeout,
        })
    }

    fn payload<'a>(&'a self, title: &'a str, message: &'a str) -> WebhookPayload<'a> {
        WebhookPayload {
            model: &self.model,
            title,
            message,
            success: super::is_success_title(title),
        }
    }
}

impl Notifier for Webhook {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        send_json(
            &self.options.method,
            &self.options.url,
            &self.options.headers,
            &self.payload(title, message),
            self.timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubConfig;

    #[test]
    fn test_payload_shape() {
        let ctx = NotifierContext {
            model: "db".to_string(),
            config: SubConfig::new("hook", "webhook").with("url", "http://localhost:9/hook"),
            timeout: Duration::from_secs(5),
        };
        let webhook = Webhook::new(ctx).unwrap();
        assert_eq!(webhook.options.method, "POST");

        let payload = webhook.payload("[packvault] OK: backup of 'db' succeeded", "done");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["model"], "db");
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "done");
    }

    #[test]
    fn test_url_is_required() {
        let ctx = NotifierContext {
            model: "db".to_string(),
            config: SubConfig::new("hook", "webhook"),
            timeout: Duration::from_secs(5),
        };
        assert!(Webhook::new(ctx).is_err());
    }

    #[test]
    fn test_unreachable_endpoint_is_an_error() {
        let ctx = NotifierContext {
            model: "db".to_string(),
            config: SubConfig::new("hook", "webhook").with("url", "http://127.0.0.1:9/hook"),
            timeout: Duration::from_secs(2),
        };
        let webhook = Webhook::new(ctx).unwrap();
        assert!(webhook.notify("t", "m").is_err());
    }
}
