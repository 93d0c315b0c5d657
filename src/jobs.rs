//! Background training jobs triggered from the HTTP surface.
//!
//! A job runs the full pipeline in a child process so the server keeps answering
//! predictions while training. At most one job runs at a time; a job that exceeds
//! its timeout is killed and reported as timed out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};
use crate::observability;

pub type JobId = u64;

/// Finished jobs kept queryable by default; older ones are dropped on the next submit
pub const DEFAULT_JOB_HISTORY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Running,
    Succeeded,
    Failed { details: String },
    TimedOut,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobState::Running)
    }

    fn label(&self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed { .. } => "failed",
            JobState::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: JobId,
    #[serde(flatten)]
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// What a finished training attempt reported
#[derive(Debug, Clone)]
pub struct TrainingOutput {
    pub success: bool,
    pub details: String,
}

#[async_trait]
pub trait TrainingLauncher: Send + Sync {
    async fn launch(&self) -> Result<TrainingOutput>;
}

/// Runs the training command as a child process, capturing its stderr.
pub struct SubprocessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl SubprocessLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `<this binary> [--config-dir <dir>] train`
    pub fn current_exe(config_dir: Option<PathBuf>) -> Result<Self> {
        let program = std::env::current_exe()?;
        let mut args = Vec::new();
        if let Some(dir) = config_dir {
            args.push("--config-dir".to_string());
            args.push(dir.display().to_string());
        }
        args.push("train".to_string());
        Ok(Self::new(program, args))
    }
}

#[async_trait]
impl TrainingLauncher for SubprocessLauncher {
    async fn launch(&self) -> Result<TrainingOutput> {
        info!("Launching training: {} {}", self.program.display(), self.args.join(" "));
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let details = if output.status.success() {
            String::new()
        } else if stderr.is_empty() {
            format!("training process exited with {}", output.status)
        } else {
            stderr
        };
        Ok(TrainingOutput {
            success: output.status.success(),
            details,
        })
    }
}

type SuccessHook = Arc<dyn Fn() + Send + Sync>;

struct JobRecord {
    status: JobStatus,
    done: watch::Receiver<bool>,
}

#[derive(Default)]
struct JobTable {
    next_id: JobId,
    active: Option<JobId>,
    jobs: HashMap<JobId, JobRecord>,
}

impl JobTable {
    /// Drop all but the `keep` most recent finished jobs
    fn prune_finished(&mut self, keep: usize) {
        let mut finished: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, record)| record.status.state.is_finished())
            .map(|(id, _)| *id)
            .collect();
        if finished.len() <= keep {
            return;
        }
        finished.sort_unstable();
        for id in &finished[..finished.len() - keep] {
            self.jobs.remove(id);
        }
    }
}

/// Submits training jobs and tracks their state.
#[derive(Clone)]
pub struct JobRunner {
    launcher: Arc<dyn TrainingLauncher>,
    timeout: Duration,
    table: Arc<Mutex<JobTable>>,
    on_success: Option<SuccessHook>,
    history: usize,
}

impl JobRunner {
    pub fn new(launcher: Arc<dyn TrainingLauncher>, timeout: Duration) -> Self {
        Self {
            launcher,
            timeout,
            table: Arc::new(Mutex::new(JobTable::default())),
            on_success: None,
            history: DEFAULT_JOB_HISTORY,
        }
    }

    /// Callback run after a job succeeds, before waiters are released.
    pub fn on_success(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    /// Number of finished jobs whose status stays available
    pub fn keep_finished(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a job. Fails with `JobInProgress` while another job is running.
    pub fn submit(&self) -> Result<JobId> {
        let (done_tx, done_rx) = watch::channel(false);
        let id = {
            let mut table = self.lock();
            if let Some(active) = table.active {
                return Err(PipelineError::JobInProgress(active));
            }
            table.prune_finished(self.history);
            table.next_id += 1;
            let id = table.next_id;
            table.active = Some(id);
            table.jobs.insert(
                id,
                JobRecord {
                    status: JobStatus {
                        id,
                        state: JobState::Running,
                        started_at: Utc::now(),
                        finished_at: None,
                    },
                    done: done_rx,
                },
            );
            id
        };
        info!("Training job {} submitted (timeout {}s)", id, self.timeout.as_secs());

        let runner = self.clone();
        tokio::spawn(async move {
            // Dropping the launch future on timeout drops the child, which kills it
            let state = match tokio::time::timeout(runner.timeout, runner.launcher.launch()).await {
                Ok(Ok(output)) if output.success => JobState::Succeeded,
                Ok(Ok(output)) => JobState::Failed { details: output.details },
                Ok(Err(e)) => JobState::Failed { details: e.to_string() },
                Err(_) => JobState::TimedOut,
            };
            runner.finish(id, state);
            let _ = done_tx.send(true);
        });
        Ok(id)
    }

    pub fn status(&self, id: JobId) -> Result<JobStatus> {
        self.lock()
            .jobs
            .get(&id)
            .map(|record| record.status.clone())
            .ok_or(PipelineError::JobNotFound(id))
    }

    /// Wait until the job leaves `Running` and return its final status.
    pub async fn wait(&self, id: JobId) -> Result<JobStatus> {
        let mut done = self
            .lock()
            .jobs
            .get(&id)
            .map(|record| record.done.clone())
            .ok_or(PipelineError::JobNotFound(id))?;
        // A closed channel means the task already finished or panicked; status tells which
        let _ = done.wait_for(|finished| *finished).await;
        self.status(id)
    }

    fn finish(&self, id: JobId, state: JobState) {
        match &state {
            JobState::Succeeded => info!("Training job {} succeeded", id),
            JobState::Failed { details } => error!("Training job {} failed: {}", id, details),
            JobState::TimedOut => warn!(
                "Training job {} timed out after {}s and was killed",
                id,
                self.timeout.as_secs()
            ),
            JobState::Running => {}
        }
        observability::record_training_job(state.label());

        let succeeded = state == JobState::Succeeded;
        {
            let mut table = self.lock();
            if let Some(record) = table.jobs.get_mut(&id) {
                record.status.state = state;
                record.status.finished_at = Some(Utc::now());
            }
            if table.active == Some(id) {
                table.active = None;
            }
        }
        if succeeded {
            if let Some(hook) = &self.on_success {
                hook();
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLauncher {
        delay: Duration,
        success: bool,
    }

    #[async_trait]
    impl TrainingLauncher for FakeLauncher {
        async fn launch(&self) -> Result<TrainingOutput> {
            tokio::time::sleep(self.delay).await;
            Ok(TrainingOutput {
                success: self.success,
                details: if self.success { String::new() } else { "boom".to_string() },
            })
        }
    }

    fn runner(delay_ms: u64, success: bool, timeout_ms: u64) -> JobRunner {
        JobRunner::new(
            Arc::new(FakeLauncher {
                delay: Duration::from_millis(delay_ms),
                success,
            }),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_successful_job_runs_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let runner = runner(10, true, 5_000).on_success(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let id = runner.submit().unwrap();
        let status = runner.wait(id).await.unwrap();
        assert_eq!(status.state, JobState::Succeeded);
        assert!(status.finished_at.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_job_keeps_details_and_skips_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let runner = runner(10, false, 5_000).on_success(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let id = runner.submit().unwrap();
        let status = runner.wait(id).await.unwrap();
        assert_eq!(status.state, JobState::Failed { details: "boom".to_string() });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_submit_is_rejected_while_running() {
        let runner = runner(200, true, 5_000);
        let first = runner.submit().unwrap();
        match runner.submit() {
            Err(PipelineError::JobInProgress(active)) => assert_eq!(active, first),
            other => panic!("expected JobInProgress, got {:?}", other.map(|_| ())),
        }
        runner.wait(first).await.unwrap();
        assert!(runner.submit().is_ok());
    }

    #[tokio::test]
    async fn test_job_times_out() {
        let runner = runner(5_000, true, 50);
        let id = runner.submit().unwrap();
        assert_eq!(runner.status(id).unwrap().state, JobState::Running);
        let status = runner.wait(id).await.unwrap();
        assert_eq!(status.state, JobState::TimedOut);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_timeout_kills_child() {
        let runner = JobRunner::new(
            Arc::new(SubprocessLauncher::new("sleep", vec!["5".to_string()])),
            Duration::from_millis(100),
        );
        let started = std::time::Instant::now();
        let id = runner.submit().unwrap();
        let status = runner.wait(id).await.unwrap();
        assert_eq!(status.state, JobState::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_failure_reports_exit() {
        let runner = JobRunner::new(
            Arc::new(SubprocessLauncher::new("false", Vec::new())),
            Duration::from_secs(5),
        );
        let id = runner.submit().unwrap();
        match runner.wait(id).await.unwrap().state {
            JobState::Failed { details } => assert!(details.contains("exited"), "{}", details),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_old_finished_jobs_are_pruned() {
        let runner = runner(0, true, 1_000).keep_finished(2);
        for _ in 0..4 {
            let id = runner.submit().unwrap();
            runner.wait(id).await.unwrap();
        }

        assert!(matches!(runner.status(1), Err(PipelineError::JobNotFound(1))));
        for id in 2..=4 {
            assert_eq!(runner.status(id).unwrap().state, JobState::Succeeded);
        }

        let id = runner.submit().unwrap();
        runner.wait(id).await.unwrap();
        assert!(runner.status(2).is_err());
        assert_eq!(runner.lock().jobs.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let runner = runner(0, true, 1_000);
        assert!(matches!(runner.status(42), Err(PipelineError::JobNotFound(42))));
        assert!(matches!(runner.wait(42).await, Err(PipelineError::JobNotFound(42))));
    }
}
