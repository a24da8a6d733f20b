//! Job lifecycle: one tokio task per running instance

use crate::executor::Executor;
use crate::schedule::{self, FireDecision};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use shared::repo::instance_repo::{self, STATUS_PAUSED, STATUS_RUNNING, STATUS_STOPPED};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct Job {
    paused: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// Signal the job and wait for its task to return. A fire already underway
/// completes before the task ends; nothing is cancelled mid-run.
async fn wind_down(job: Job) {
    job.stopping.store(true, Ordering::SeqCst);
    job.wake.notify_one();
    let _ = job.handle.await;
}

/// Owns the job map. Each active instance has exactly one job; pausing
/// keeps the job alive but suppresses fires, stopping lets the current
/// run finish and then removes it.
pub struct Scheduler {
    db: DatabaseConnection,
    executor: Arc<Executor>,
    daily_hm: (u32, u32),
    jobs: Mutex<HashMap<u64, Job>>,
}

impl Scheduler {
    pub fn new(db: DatabaseConnection, executor: Arc<Executor>, daily_run_time: &str) -> Self {
        Self {
            db,
            executor,
            daily_hm: schedule::parse_daily_run_time(daily_run_time),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// stopped → running: persist the transition and spawn the job.
    pub async fn start(&self, instance_id: u64) -> Result<()> {
        if self.jobs.lock().unwrap().contains_key(&instance_id) {
            bail!("instance {} already has a job", instance_id);
        }
        let instance = instance_repo::find(&self.db, instance_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("instance {} not found", instance_id))?;
        let next = schedule::next_fire(&instance.schedule_frequency, Utc::now(), self.daily_hm)
            .ok_or_else(|| {
                anyhow::anyhow!("unknown schedule_frequency '{}'", instance.schedule_frequency)
            })?;
        instance_repo::set_status(&self.db, instance_id, STATUS_RUNNING, Some(next)).await?;
        self.spawn_job(instance_id, &instance.schedule_frequency, None);
        info!(instance = instance_id, %next, "scheduled");
        Ok(())
    }

    /// running → paused: the job stays, fires are suppressed.
    pub async fn pause(&self, instance_id: u64) -> Result<()> {
        instance_repo::set_status(&self.db, instance_id, STATUS_PAUSED, None).await?;
        let jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get(&instance_id)
            .ok_or_else(|| anyhow::anyhow!("instance {} has no job", instance_id))?;
        job.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// paused → running.
    pub async fn resume(&self, instance_id: u64) -> Result<()> {
        let next = {
            let instance = instance_repo::find(&self.db, instance_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("instance {} not found", instance_id))?;
            schedule::next_fire(&instance.schedule_frequency, Utc::now(), self.daily_hm)
        };
        instance_repo::set_status(&self.db, instance_id, STATUS_RUNNING, next).await?;
        let jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get(&instance_id)
            .ok_or_else(|| anyhow::anyhow!("instance {} has no job", instance_id))?;
        job.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// → stopped: the job winds down after any in-flight run.
    pub async fn stop(&self, instance_id: u64) -> Result<()> {
        instance_repo::set_status(&self.db, instance_id, STATUS_STOPPED, None).await?;
        let job = self.jobs.lock().unwrap().remove(&instance_id);
        if let Some(job) = job {
            wind_down(job).await;
        }
        Ok(())
    }

    /// Fire once, outside the schedule. The instance does not need a job.
    pub async fn test_execution(&self, instance_id: u64) -> Result<()> {
        let instance = instance_repo::find(&self.db, instance_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("instance {} not found", instance_id))?;
        // a manual fire leaves the scheduled time alone
        self.executor
            .fire(&instance, instance.next_execution_time)
            .await?;
        Ok(())
    }

    /// Re-enqueue every instance persisted as running. A stored fire time
    /// still within the grace window runs as the job's first iteration;
    /// one past the grace window is dropped in favor of the next.
    pub async fn recover(&self) -> Result<usize> {
        let mut recovered = 0;
        for instance in instance_repo::list_running(&self.db).await? {
            let now = Utc::now();
            let pending = schedule::recovered_fire(instance.next_execution_time, now);
            if pending.is_none() {
                if let Some(stale) = instance.next_execution_time {
                    warn!(instance = instance.id, %stale, "dropping stale pending run");
                }
            }
            let next = pending.or_else(|| {
                schedule::next_fire(&instance.schedule_frequency, now, self.daily_hm)
            });
            instance_repo::set_next_execution(&self.db, instance.id, next).await?;
            self.spawn_job(instance.id, &instance.schedule_frequency, pending);
            recovered += 1;
        }
        info!(count = recovered, "recovered running instances");
        Ok(recovered)
    }

    fn spawn_job(&self, instance_id: u64, frequency: &str, pending: Option<DateTime<Utc>>) {
        let paused = Arc::new(AtomicBool::new(false));
        let stopping = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let db = self.db.clone();
        let executor = self.executor.clone();
        let daily_hm = self.daily_hm;
        let frequency = frequency.to_string();
        let job_paused = paused.clone();
        let job_stopping = stopping.clone();
        let job_wake = wake.clone();

        let handle = tokio::spawn(async move {
            let mut pending = pending;
            loop {
                let now = Utc::now();
                let next = match pending.take() {
                    Some(at) => at,
                    None => match schedule::next_fire(&frequency, now, daily_hm) {
                        Some(next) => next,
                        None => {
                            warn!(instance = instance_id, %frequency, "unschedulable frequency");
                            return;
                        }
                    },
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = job_wake.notified() => {}
                }
                if job_stopping.load(Ordering::SeqCst) {
                    return;
                }
                if job_paused.load(Ordering::SeqCst) {
                    continue;
                }
                if schedule::misfire_decision(next, Utc::now()) == FireDecision::Skip {
                    warn!(instance = instance_id, scheduled = %next, "misfire outside grace, skipping");
                    continue;
                }
                let instance = match instance_repo::find(&db, instance_id).await {
                    Ok(Some(instance)) => instance,
                    Ok(None) => {
                        warn!(instance = instance_id, "instance vanished, ending job");
                        return;
                    }
                    Err(err) => {
                        warn!(instance = instance_id, %err, "instance lookup failed");
                        continue;
                    }
                };
                // the job boundary never propagates: fire() records failures
                let upcoming = schedule::next_fire(&frequency, next, daily_hm);
                if let Err(err) = executor.fire(&instance, upcoming).await {
                    warn!(instance = instance_id, %err, "fire bookkeeping failed");
                }
            }
        });

        self.jobs.lock().unwrap().insert(
            instance_id,
            Job {
                paused,
                stopping,
                wake,
                handle,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wind_down_waits_for_work_in_flight() {
        let paused = Arc::new(AtomicBool::new(false));
        let stopping = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let finished = Arc::new(AtomicBool::new(false));

        let task_stopping = stopping.clone();
        let task_wake = wake.clone();
        let task_finished = finished.clone();
        let handle = tokio::spawn(async move {
            task_wake.notified().await;
            // work underway when the signal lands must still complete;
            // an abort would cancel this sleep and skip the store below
            tokio::time::sleep(Duration::from_millis(20)).await;
            if task_stopping.load(Ordering::SeqCst) {
                task_finished.store(true, Ordering::SeqCst);
            }
        });

        wind_down(Job {
            paused,
            stopping,
            wake,
            handle,
        })
        .await;
        assert!(finished.load(Ordering::SeqCst));
    }
}
