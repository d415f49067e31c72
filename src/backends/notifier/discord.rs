use super::send_json;
use crate::backends::{adapter_options, Notifier, NotifierContext};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Embed colors (decimal)
const COLOR_SUCCESS: u32 = 3066993; // #2ECC71
const COLOR_FAILURE: u32 = 15158332; // #E74C3C

/// Longest description Discord accepts in an embed
const MAX_DESCRIPTION: usize = 4096;

#[derive(Debug, Deserialize)]
struct DiscordOptions {
    url: String,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Serialize)]
struct DiscordPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    footer: DiscordFooter,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct DiscordFooter {
    text: String,
}

pub struct Discord {
    model: String,
    options: DiscordOptions,
    timeout: Duration,
}

impl Discord {
    pub fn new(ctx: NotifierContext) -> Result<Self> {
        let options = adapter_options(&ctx.config)?;
        Ok(Self {
            model: ctx.model,
            options,
            timeout: ctx.timeout,
        })
    }

    fn build_payload(&self, title: &str, message: &str) -> DiscordPayload {
        let color = if super::is_success_title(title) {
            COLOR_SUCCESS
        } else {
            COLOR_FAILURE
        };

        let description = if message.chars().count() > MAX_DESCRIPTION {
            let cut: String = message.chars().take(MAX_DESCRIPTION - 3).collect();
            format!("{}...", cut)
        } else {
            message.to_string()
        };

        DiscordPayload {
            username: self.options.username.clone(),
            embeds: vec![DiscordEmbed {
                title: title.to_string(),
                description,
                color,
                footer: DiscordFooter {
                    text: format!("packvault · {}", self.model),
                },
                timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            }],
        }
    }
}

impl Notifier for Discord {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        let payload = self.build_payload(title, message);
        send_json("POST", &self.options.url, &BTreeMap::new(), &payload, self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubConfig;

    fn discord() -> Discord {
        Discord::new(NotifierContext {
            model: "postgres".to_string(),
            config: SubConfig::new("team", "discord").with("url", "https://discord.com/api/webhooks/test"),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_embed_color_follows_outcome() {
        let ok = discord().build_payload("[packvault] OK: backup of 'postgres' succeeded", "fine");
        assert_eq!(ok.embeds[0].color, COLOR_SUCCESS);

        let err = discord().build_payload("[packvault] Err: backup of 'postgres' failed", "boom");
        assert_eq!(err.embeds[0].color, COLOR_FAILURE);
        assert_eq!(err.embeds[0].footer.text, "packvault · postgres");
    }

    #[test]
    fn test_long_message_truncated() {
        let message = "x".repeat(5000);
        let payload = discord().build_payload("t", &message);
        assert_eq!(payload.embeds[0].description.chars().count(), MAX_DESCRIPTION);
        assert!(payload.embeds[0].description.ends_with("..."));
    }
}
