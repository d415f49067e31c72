//! Cron job management utilities

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

const MARKER_PREFIX: &str = "# packvault - Model:";

/// Get the path to the packvault binary
pub fn get_binary_path() -> Result<PathBuf> {
    env::current_exe().context("Failed to get current executable path")
}

/// Get the current crontab
pub fn get_crontab() -> Result<String> {
    let output = Command::new("crontab")
        .arg("-l")
        .output()
        .context("Failed to execute crontab -l")?;

    if !output.status.success() {
        // Empty crontab returns non-zero, check stderr
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no crontab") {
            return Ok(String::new());
        }
        anyhow::bail!("Failed to read crontab: {}", stderr);
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Set the crontab content
pub fn set_crontab(content: &str) -> Result<()> {
    use std::io::Write;

    let mut child = Command::new("crontab")
        .arg("-")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .context("Failed to spawn crontab")?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(content.as_bytes())
            .context("Failed to write to crontab stdin")?;
    } else {
        anyhow::bail!("Failed to open crontab stdin");
    }

    let output = child.wait_with_output().context("Failed to wait for crontab")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Crontab command failed: {}", stderr);
    }

    info!("Crontab updated successfully");
    Ok(())
}

fn marker(model: &str) -> String {
    format!("{} {}", MARKER_PREFIX, model)
}

/// Build the two-line crontab entry (marker comment + job) for a model
pub fn cron_entry(
    model: &str,
    schedule: &str,
    binary_path: &Path,
    config_path: &Path,
    log_directory: &Path,
) -> String {
    let log_file = log_directory.join(format!("cron-{}.log", model));

    let cron_command = format!(
        "{} --config {} perform --model {} >> {} 2>&1",
        binary_path.display(),
        config_path.display(),
        model,
        log_file.display()
    );

    format!("{}\n{} {}", marker(model), schedule, cron_command)
}

/// Remove the entry of `model` (marker line plus the job line after it)
pub fn remove_entry(existing: &str, model: &str) -> String {
    let marker = marker(model);
    let mut new_lines = Vec::new();
    let mut skip_next = false;

    for line in existing.lines() {
        if line.trim_end() == marker {
            skip_next = true;
            continue;
        }
        if skip_next {
            skip_next = false;
            continue;
        }
        new_lines.push(line);
    }

    if new_lines.is_empty() {
        String::new()
    } else {
        new_lines.join("\n") + "\n"
    }
}

/// Insert or replace the entry of `model`
pub fn upsert_entry(existing: &str, model: &str, entry: &str) -> String {
    let mut content = remove_entry(existing, model);
    content.push_str(entry);
    content.push('\n');
    content
}

/// Add a cron job for a model
pub fn add_cron_job(
    model: &str,
    schedule: &str,
    config_path: &Path,
    log_directory: &Path,
    dry_run: bool,
) -> Result<()> {
    let binary_path = get_binary_path()?;
    let entry = cron_entry(model, schedule, &binary_path, config_path, log_directory);

    if dry_run {
        println!("  [DRY RUN] Would add cron job:");
        println!("    {}", entry.replace('\n', "\n    "));
        return Ok(());
    }

    let existing = get_crontab()?;
    if existing.lines().any(|l| l.trim_end() == marker(model)) {
        warn!("Cron job for model '{}' already exists, updating...", model);
    }

    set_crontab(&upsert_entry(&existing, model, &entry))?;

    info!("Added cron job for model: {}", model);
    Ok(())
}

/// Remove cron job for a model
pub fn remove_cron_job(model: &str) -> Result<()> {
    let existing = get_crontab()?;

    if !existing.lines().any(|l| l.trim_end() == marker(model)) {
        warn!("No cron job found for model '{}'", model);
        return Ok(());
    }

    set_crontab(&remove_entry(&existing, model))?;

    info!("Removed cron job for model: {}", model);
    Ok(())
}

/// Validate cron schedule syntax
pub fn validate_cron_schedule(schedule: &str) -> bool {
    // Basic validation: should have 5 fields
    schedule.split_whitespace().count() == 5
}
