//! In-process scheduler for `every` / `at` schedules
//!
//! One tokio task per scheduled model. Each run goes through `spawn_blocking`
//! because the pipeline is synchronous; a model's runs never overlap since its
//! task awaits the run before computing the next fire time. Models with a
//! `cron` schedule are left to the system crontab (see `setup`).

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveTime};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::ModelConfig;
use crate::managers::model::{PipelineError, PipelineManager};
use crate::utils::duration::{parse_duration, parse_time_of_day};

/// A model driven by the in-process scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub model: String,
    pub every: Duration,
    pub at: Option<NaiveTime>,
}

fn to_chrono(every: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(every).context("interval out of range")
}

/// First fire time.
///
/// Without `at` this is `now + every`. With `at` it is the next wall-clock
/// `at` that is not before `now`.
pub fn next_fire(every: Duration, at: Option<NaiveTime>, now: DateTime<Local>) -> Result<DateTime<Local>> {
    let Some(at) = at else {
        return Ok(now + to_chrono(every)?);
    };

    let mut day = now.date_naive();
    loop {
        // A time skipped by a DST change has no local mapping; try the next day
        if let Some(candidate) = day.and_time(at).and_local_timezone(Local).earliest() {
            if candidate >= now {
                return Ok(candidate);
            }
        }
        day = day
            .succ_opt()
            .context("no valid date after the current one")?;
    }
}

/// Fire time after `previous`, skipping slots already in the past
pub fn following(previous: DateTime<Local>, every: Duration, now: DateTime<Local>) -> Result<DateTime<Local>> {
    let step = to_chrono(every)?;
    let mut next = previous + step;
    while next <= now {
        next += step;
    }
    Ok(next)
}

/// Enabled models with an `every` schedule
pub fn jobs(models: &BTreeMap<String, ModelConfig>) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();

    for model in models.values().filter(|m| m.enabled) {
        let Some(every) = &model.schedule.every else {
            continue;
        };
        let every = parse_duration(every)
            .with_context(|| format!("Model '{}': invalid schedule.every", model.name))?;
        let at = model
            .schedule
            .at
            .as_deref()
            .map(parse_time_of_day)
            .transpose()
            .with_context(|| format!("Model '{}': invalid schedule.at", model.name))?;

        jobs.push(Job {
            model: model.name.clone(),
            every,
            at,
        });
    }

    Ok(jobs)
}

/// Run the scheduled models until Ctrl-C
pub async fn start(manager: Arc<PipelineManager>) -> Result<()> {
    let jobs = jobs(manager.list_models())?;
    if jobs.is_empty() {
        bail!("No enabled model has a schedule.every, nothing to run");
    }

    let mut tasks = JoinSet::new();
    for job in jobs {
        info!("Scheduling '{}' every {:?}", job.model, job.every);
        tasks.spawn(run_job(Arc::clone(&manager), job));
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Received Ctrl-C, stopping scheduler");
        }
        Some(joined) = tasks.join_next() => {
            match joined {
                Ok(Err(e)) => error!("Scheduler task stopped: {:#}", e),
                Ok(Ok(())) => warn!("Scheduler task ended"),
                Err(e) => error!("Scheduler task panicked: {}", e),
            }
        }
    }

    tasks.abort_all();
    Ok(())
}

async fn run_job(manager: Arc<PipelineManager>, job: Job) -> Result<()> {
    let mut next = next_fire(job.every, job.at, Local::now())?;

    loop {
        info!("Model '{}' next run at {}", job.model, next.format("%Y-%m-%d %H:%M:%S"));
        let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        let runner = Arc::clone(&manager);
        let model = job.model.clone();
        match tokio::task::spawn_blocking(move || runner.perform(&model)).await {
            Ok(Ok(report)) => info!(
                "Model '{}' finished in {:.1}s",
                report.model,
                report.duration.as_secs_f64()
            ),
            Ok(Err(PipelineError::Busy(reason))) => warn!("Skipped: {}", reason),
            Ok(Err(e)) => error!("Model '{}' failed: {}", job.model, e),
            Err(e) => error!("Run of '{}' panicked: {}", job.model, e),
        }

        next = following(next, job.every, Local::now())?;
    }
}
