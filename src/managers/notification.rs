//! Outcome notifications for model runs
//!
//! Builds every configured notifier of a model through the registry and sends
//! exactly one success or failure message per run. A channel that cannot be
//! built or fails to send is logged and skipped; it never changes the outcome
//! of the run or stops the other channels.

use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::backends::{adapter_options, Notifier, NotifierContext, NotifyToggles, Registries};
use crate::config::ModelConfig;

const TITLE_PREFIX: &str = "[packvault]";

/// Longest failure reason placed in a message
const MAX_REASON_CHARS: usize = 1500;

struct Channel {
    name: String,
    toggles: NotifyToggles,
    notifier: Box<dyn Notifier>,
}

/// Dispatches run outcomes to a model's notifiers
pub struct NotificationManager {
    model: String,
    channels: Vec<Channel>,
}

pub fn success_title(model: &str) -> String {
    format!("{} OK: backup of '{}' succeeded", TITLE_PREFIX, model)
}

pub fn failure_title(model: &str) -> String {
    format!("{} Err: backup of '{}' failed", TITLE_PREFIX, model)
}

impl NotificationManager {
    /// Build the notifiers configured for `model`
    pub fn for_model(registries: &Registries, model: &ModelConfig) -> Self {
        let mut manager = Self::new(&model.name);

        for config in &model.notifiers {
            let Some(factory) = registries.notifiers.get(&config.kind) else {
                error!(
                    "Notifier '{}': type '{}' is not implemented",
                    config.label(),
                    config.kind
                );
                continue;
            };

            let toggles: NotifyToggles = match adapter_options(config) {
                Ok(toggles) => toggles,
                Err(e) => {
                    error!("Notifier '{}': {:#}", config.label(), e);
                    continue;
                }
            };

            let ctx = NotifierContext {
                model: model.name.clone(),
                config: config.clone(),
                timeout: model.timeout,
            };
            match factory(ctx) {
                Ok(notifier) => manager.add(config.label(), toggles, notifier),
                Err(e) => error!("Notifier '{}': {:#}", config.label(), e),
            }
        }

        manager
    }

    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            channels: Vec::new(),
        }
    }

    pub fn add(&mut self, name: &str, toggles: NotifyToggles, notifier: Box<dyn Notifier>) {
        self.channels.push(Channel {
            name: name.to_string(),
            toggles,
            notifier,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Notify channels that want successes; returns how many accepted it
    pub fn send_success(&self, duration: Duration) -> usize {
        let title = success_title(&self.model);
        let message = format!(
            "Backup of '{}' completed at {} in {}.",
            self.model,
            now(),
            format_duration(duration.as_secs())
        );
        self.dispatch(&title, &message, |t| t.on_success)
    }

    /// Notify channels that want failures; returns how many accepted it
    pub fn send_failure(&self, duration: Duration, reason: &str) -> usize {
        let title = failure_title(&self.model);
        let message = format!(
            "Backup of '{}' failed at {} after {}.\n\nReason: {}",
            self.model,
            now(),
            format_duration(duration.as_secs()),
            truncate(reason, MAX_REASON_CHARS)
        );
        self.dispatch(&title, &message, |t| t.on_failure)
    }

    fn dispatch(&self, title: &str, message: &str, wanted: impl Fn(&NotifyToggles) -> bool) -> usize {
        let mut delivered = 0;

        for channel in &self.channels {
            if !wanted(&channel.toggles) {
                debug!("Notifier '{}' is disabled for this outcome", channel.name);
                continue;
            }
            match channel.notifier.notify(title, message) {
                Ok(()) => {
                    info!("Sent notification via '{}'", channel.name);
                    delivered += 1;
                }
                Err(e) => warn!("Notifier '{}' failed: {:#}", channel.name, e),
            }
        }

        delivered
    }
}

fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Format duration in human-readable form
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        let minutes = seconds / 60;
        let secs = seconds % 60;
        if secs == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, secs)
        }
    } else {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}
