//! Background backtest tasks, addressed by configuration fingerprint

use engine::backtest::{BacktestConfig, BacktestEngine};
use engine::error::EngineError;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use shared::repo::result_repo;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Clone)]
struct TaskEntry {
    status: TaskStatus,
    cancel: Arc<AtomicBool>,
    error: Option<String>,
}

/// Long-running backtests are offloaded here; callers poll by fingerprint
/// and the engine's own cache serves the completed summary.
#[derive(Default)]
pub struct BacktestTasks {
    entries: Mutex<HashMap<String, TaskEntry>>,
}

impl BacktestTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a run for `config` unless one is already in flight. Returns
    /// the task status the caller should report.
    pub fn spawn(
        self: &Arc<Self>,
        engine: Arc<BacktestEngine>,
        db: DatabaseConnection,
        config: BacktestConfig,
        fingerprint: String,
    ) -> TaskStatus {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(&fingerprint) {
            if existing.status == TaskStatus::Running {
                return TaskStatus::Running;
            }
        }
        let cancel = Arc::new(AtomicBool::new(false));
        entries.insert(
            fingerprint.clone(),
            TaskEntry {
                status: TaskStatus::Running,
                cancel: cancel.clone(),
                error: None,
            },
        );
        drop(entries);

        let tasks = self.clone();
        tokio::spawn(async move {
            let outcome = engine.run(&config, &cancel).await;
            match outcome {
                Ok(summary) => {
                    if let Err(err) =
                        result_repo::save_summary(&db, &config, &summary, chrono::Utc::now()).await
                    {
                        error!(%fingerprint, %err, "failed to persist backtest results");
                    }
                    info!(%fingerprint, "backtest task completed");
                    tasks.finish(&fingerprint, TaskStatus::Completed, None);
                }
                Err(EngineError::Cancelled) => {
                    tasks.finish(&fingerprint, TaskStatus::Cancelled, None);
                }
                Err(err) => {
                    error!(%fingerprint, %err, "backtest task failed");
                    tasks.finish(&fingerprint, TaskStatus::Failed, Some(err.to_string()));
                }
            }
        });
        TaskStatus::Running
    }

    fn finish(&self, fingerprint: &str, status: TaskStatus, error: Option<String>) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(fingerprint) {
            entry.status = status;
            entry.error = error;
        }
    }

    pub fn status(&self, fingerprint: &str) -> Option<(TaskStatus, Option<String>)> {
        self.entries
            .lock()
            .unwrap()
            .get(fingerprint)
            .map(|entry| (entry.status, entry.error.clone()))
    }

    /// Request cancellation; the engine observes the flag between symbols.
    pub fn cancel(&self, fingerprint: &str) -> bool {
        let entries = self.entries.lock().unwrap();
        match entries.get(fingerprint) {
            Some(entry) if entry.status == TaskStatus::Running => {
                entry.cancel.store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }
}
