//! Job dispatcher.
//!
//! Each submitted job gets a driver task that launches its pending tasks in
//! priority order whenever the registry has spare capacity, and finalizes
//! the output once every task has reached a terminal state. A task runs
//! its attempts under one capacity lease per attempt, so capacity is
//! released on every exit path.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::DispatcherConfig;
use super::error::ExecutionError;
use super::retry::RetryPolicy;
use super::runner::TaskRunner;
use super::types::{JobEvent, TaskContext};
use crate::command::CommandBuilder;
use crate::job::{
    EncodingJob, Failure, FailureKind, JobId, JobStatus, JobStore, OutputState, TaskId, TaskStatus,
};
use crate::metrics;
use crate::output::OutputOrchestrator;
use crate::progress::{ProgressConfig, ProgressUpdate};
use crate::registry::{CapacityLease, NodeRegistry};

const EVENT_CAPACITY: usize = 1024;
const PROGRESS_CAPACITY: usize = 32;

type SharedJob = Arc<Mutex<EncodingJob>>;

/// Runtime settings of a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub retry: RetryPolicy,
    /// Re-poll interval while tasks wait for capacity.
    pub poll_interval: Duration,
    /// Minimum spacing of progress events per task.
    pub progress_interval: Duration,
}

impl DispatchSettings {
    pub fn from_config(dispatcher: &DispatcherConfig, progress: &ProgressConfig) -> Self {
        Self {
            retry: RetryPolicy::from_dispatcher_config(dispatcher),
            poll_interval: dispatcher.poll_interval(),
            progress_interval: progress.interval(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&DispatcherConfig::default(), &ProgressConfig::default())
    }
}

struct ActiveJob {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

struct Inner {
    registry: Arc<NodeRegistry>,
    runner: Arc<dyn TaskRunner>,
    store: Arc<dyn JobStore>,
    builder: CommandBuilder,
    output: OutputOrchestrator,
    settings: DispatchSettings,
    events: broadcast::Sender<JobEvent>,
    jobs: Mutex<HashMap<JobId, ActiveJob>>,
}

/// Runs jobs across the registered nodes.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<NodeRegistry>,
        runner: Arc<dyn TaskRunner>,
        store: Arc<dyn JobStore>,
        builder: CommandBuilder,
        output: OutputOrchestrator,
        settings: DispatchSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                registry,
                runner,
                store,
                builder,
                output,
                settings,
                events,
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    /// Accepts a job and starts driving it. Returns immediately; the job
    /// stays queued until a node can take its first task.
    pub async fn submit(&self, job: EncodingJob) -> JobId {
        let job_id = job.id;
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);

        self.inner.store.save(job.clone()).await;
        self.inner.jobs.lock().await.insert(
            job_id,
            ActiveJob {
                cancel: cancel.clone(),
                done: done_rx,
            },
        );
        metrics::JOBS_SUBMITTED.inc();
        info!(job_id = %job_id, tasks = job.tasks.len(), "Job submitted");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            drive(Arc::clone(&inner), job, cancel).await;
            inner.jobs.lock().await.remove(&job_id);
            let _ = done_tx.send(true);
        });
        job_id
    }

    /// Cancels a running job. Returns false if the job is unknown or has
    /// already finished.
    pub async fn cancel(&self, job_id: JobId) -> bool {
        match self.inner.jobs.lock().await.get(&job_id) {
            Some(active) => {
                info!(job_id = %job_id, "Cancelling job");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Waits for a job to finish and returns its final snapshot.
    pub async fn wait(&self, job_id: JobId) -> Option<EncodingJob> {
        let done = self
            .inner
            .jobs
            .lock()
            .await
            .get(&job_id)
            .map(|active| active.done.clone());
        if let Some(mut done) = done {
            let _ = done.wait_for(|finished| *finished).await;
        }
        self.inner.store.get(job_id).await
    }

    /// Ids of jobs that have not finished yet.
    pub async fn active_jobs(&self) -> Vec<JobId> {
        self.inner.jobs.lock().await.keys().copied().collect()
    }
}

struct TaskOutcome {
    task_id: TaskId,
    status: TaskStatus,
}

async fn drive(inner: Arc<Inner>, job: EncodingJob, cancel: CancellationToken) {
    let job_id = job.id;
    let shared: SharedJob = Arc::new(Mutex::new(job));
    let mut running: JoinSet<TaskOutcome> = JoinSet::new();
    let mut launched: HashSet<TaskId> = HashSet::new();
    let mut changes = inner.registry.subscribe_changes();
    let mut cancel_seen = false;

    loop {
        if !cancel.is_cancelled() {
            launch_ready(&inner, &shared, &mut launched, &mut running, &cancel).await;
        }

        let waiting = {
            let job = shared.lock().await;
            job.tasks.iter().any(|t| !launched.contains(&t.id))
        };
        if running.is_empty() && (cancel.is_cancelled() || !waiting) {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled(), if !cancel_seen => {
                cancel_seen = true;
            }
            Some(joined) = running.join_next() => {
                match joined {
                    Ok(outcome) => debug!(job_id = %job_id, task_id = %outcome.task_id, status = ?outcome.status, "Task settled"),
                    Err(e) => error!(job_id = %job_id, error = %e, "Task driver panicked"),
                }
            }
            Ok(()) = changes.changed(), if waiting => {}
            _ = tokio::time::sleep(inner.settings.poll_interval), if waiting => {
                debug!(job_id = %job_id, "Re-polling node selection");
            }
        }
    }

    finish(&inner, &shared, cancel.is_cancelled()).await;
}

/// Starts every not-yet-launched task a node can take right now, highest
/// priority first. Tasks nobody can take stay pending; lower-priority tasks
/// with a different encoder may still go ahead.
async fn launch_ready(
    inner: &Arc<Inner>,
    shared: &SharedJob,
    launched: &mut HashSet<TaskId>,
    running: &mut JoinSet<TaskOutcome>,
    cancel: &CancellationToken,
) {
    let mut ready: Vec<(u32, TaskId, String)> = {
        let job = shared.lock().await;
        job.tasks
            .iter()
            .filter(|t| !launched.contains(&t.id))
            .map(|t| (t.priority, t.id, t.codec.clone()))
            .collect()
    };
    ready.sort_by_key(|(priority, _, _)| *priority);

    for (_, task_id, codec) in ready {
        let Some(lease) = inner.registry.try_reserve(&codec).await else {
            continue;
        };
        launched.insert(task_id);
        let inner = Arc::clone(inner);
        let shared = Arc::clone(shared);
        let cancel = cancel.child_token();
        running.spawn(async move {
            let status = run_task(&inner, &shared, task_id, lease, cancel).await;
            TaskOutcome { task_id, status }
        });
    }
}

/// Runs a task to a terminal state, retrying per policy within the overall
/// timeout.
async fn run_task(
    inner: &Arc<Inner>,
    shared: &SharedJob,
    task_id: TaskId,
    lease: CapacityLease,
    cancel: CancellationToken,
) -> TaskStatus {
    let started = Instant::now();
    let policy = &inner.settings.retry;
    let result = tokio::time::timeout(
        policy.overall_timeout,
        attempt_loop(inner, shared, task_id, lease, &cancel),
    )
    .await
    .unwrap_or_else(|_| {
        Err(ExecutionError::Timeout {
            secs: policy.overall_timeout.as_secs(),
        })
    });

    let mut job = shared.lock().await;
    let job_id = job.id;
    let Some(task) = job.task_mut(task_id) else {
        return TaskStatus::Failed;
    };
    task.finished_at = Some(Utc::now());
    let failure = match result {
        Ok(()) => {
            task.status = TaskStatus::Succeeded;
            task.progress = 100.0;
            info!(job_id = %job_id, task = %task.name, attempts = task.attempts, "Task succeeded");
            None
        }
        Err(e) => {
            let failure = e.to_failure();
            task.status = if failure.kind == FailureKind::Cancelled {
                TaskStatus::Cancelled
            } else {
                TaskStatus::Failed
            };
            task.last_error = Some(failure.clone());
            if task.status == TaskStatus::Failed {
                error!(
                    job_id = %job_id,
                    task = %task.name,
                    attempts = task.attempts,
                    kind = failure.kind.as_str(),
                    error = %failure.message,
                    "Task failed"
                );
            }
            Some(failure)
        }
    };
    let status = task.status;
    let result_label = failure.as_ref().map_or("succeeded", |f| f.kind.as_str());
    metrics::TASK_DURATION
        .with_label_values(&[task.kind.as_str(), result_label])
        .observe(started.elapsed().as_secs_f64());

    let snapshot = job.clone();
    drop(job);
    inner.store.save(snapshot).await;
    emit(
        inner,
        JobEvent::TaskFinished {
            job_id,
            task_id,
            status,
            failure,
        },
    );
    status
}

async fn attempt_loop(
    inner: &Arc<Inner>,
    shared: &SharedJob,
    task_id: TaskId,
    first_lease: CapacityLease,
    cancel: &CancellationToken,
) -> Result<(), ExecutionError> {
    let policy = &inner.settings.retry;
    let mut lease = Some(first_lease);
    loop {
        let lease = match lease.take() {
            Some(lease) => lease,
            None => reacquire(inner, shared, task_id, cancel).await?,
        };
        let attempt = match run_attempt(inner, shared, task_id, lease, cancel).await {
            Ok(()) => return Ok(()),
            Err((attempt, e)) if policy.should_retry(&e, attempt) => (attempt, e),
            Err((_, e)) => return Err(e),
        };

        let (attempt, err) = attempt;
        let delay = policy.delay_for(attempt);
        {
            let mut job = shared.lock().await;
            let job_id = job.id;
            if let Some(task) = job.task_mut(task_id) {
                task.status = TaskStatus::Pending;
                task.assigned_node = None;
                task.last_error = Some(err.to_failure());
                warn!(
                    job_id = %job_id,
                    task = %task.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Task attempt failed, retrying"
                );
            }
        }
        metrics::RETRIES_SCHEDULED.inc();
        emit(
            inner,
            JobEvent::TaskRetrying {
                job_id: shared.lock().await.id,
                task_id,
                attempt,
                delay_ms: delay.as_millis() as u64,
                error: err.to_string(),
            },
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Waits for a node to take a retried task.
async fn reacquire(
    inner: &Arc<Inner>,
    shared: &SharedJob,
    task_id: TaskId,
    cancel: &CancellationToken,
) -> Result<CapacityLease, ExecutionError> {
    let codec = {
        let job = shared.lock().await;
        job.task(task_id)
            .map(|t| t.codec.clone())
            .ok_or_else(|| ExecutionError::invalid_task("task vanished from its job"))?
    };
    let mut changes = inner.registry.subscribe_changes();
    loop {
        if let Some(lease) = inner.registry.try_reserve(&codec).await {
            return Ok(lease);
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
            _ = changes.changed() => {}
            _ = tokio::time::sleep(inner.settings.poll_interval) => {}
        }
    }
}

/// One attempt on the leased node. The lease is released when this returns.
async fn run_attempt(
    inner: &Arc<Inner>,
    shared: &SharedJob,
    task_id: TaskId,
    lease: CapacityLease,
    cancel: &CancellationToken,
) -> Result<(), (u32, ExecutionError)> {
    let node = lease.node().clone();
    let (job_id, task, command) = {
        let mut job = shared.lock().await;
        let job_id = job.id;
        let Some(task) = job.task_mut(task_id) else {
            return Err((1, ExecutionError::invalid_task("task vanished from its job")));
        };
        task.attempts += 1;
        task.status = TaskStatus::Assigned;
        task.assigned_node = Some(node.id.clone());
        task.started_at.get_or_insert_with(Utc::now);
        let command = inner
            .builder
            .build(&task.input, &task.output, &task.pre_input, &task.options);
        (job_id, task.clone(), command)
    };
    let attempt = task.attempts;

    debug!(job_id = %job_id, task = %task.name, node_id = %node.id, attempt, "Task assigned");
    metrics::TASKS_DISPATCHED.with_label_values(&[node.id.as_str()]).inc();
    emit(
        inner,
        JobEvent::TaskAssigned {
            job_id,
            task_id,
            node_id: node.id.clone(),
            attempt,
        },
    );

    {
        let mut job = shared.lock().await;
        if let Some(t) = job.task_mut(task_id) {
            t.status = TaskStatus::Running;
        }
        let snapshot = job.clone();
        drop(job);
        inner.store.save(snapshot).await;
    }
    emit(
        inner,
        JobEvent::TaskStarted {
            job_id,
            task_id,
            node_id: node.id.clone(),
            attempt,
            command: command.render(),
        },
    );

    let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_CAPACITY);
    let ctx = TaskContext {
        task,
        node,
        command,
        attempt,
        progress: progress_tx,
        progress_interval: inner.settings.progress_interval,
        cancel: cancel.clone(),
    };

    let running = metrics::GaugeGuard::inc(&metrics::TASKS_RUNNING);
    let run = inner.runner.run(ctx);
    tokio::pin!(run);
    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            Some(update) = progress_rx.recv() => {
                record_progress(inner, shared, task_id, update).await;
            }
        }
    };
    while let Ok(update) = progress_rx.try_recv() {
        record_progress(inner, shared, task_id, update).await;
    }
    drop(running);
    drop(lease);

    let label = match &result {
        Ok(()) => "succeeded",
        Err(e) => e.kind().as_str(),
    };
    metrics::TASK_ATTEMPTS.with_label_values(&[label]).inc();
    result.map_err(|e| (attempt, e))
}

async fn record_progress(inner: &Arc<Inner>, shared: &SharedJob, task_id: TaskId, update: ProgressUpdate) {
    let (job_id, job_percent) = {
        let mut job = shared.lock().await;
        if let Some(task) = job.task_mut(task_id) {
            task.progress = update.percent.clamp(0.0, 100.0);
        }
        (job.id, job.progress())
    };
    emit(
        inner,
        JobEvent::TaskProgress {
            job_id,
            task_id,
            update,
            job_percent,
        },
    );
}

/// Settles the job once no task is running: cancels what never started,
/// then either skips or runs the output stage.
async fn finish(inner: &Arc<Inner>, shared: &SharedJob, cancelled: bool) {
    let mut job = shared.lock().await;

    if cancelled {
        job.cancelled = true;
        for task in job.tasks.iter_mut().filter(|t| !t.status.is_terminal()) {
            task.status = TaskStatus::Cancelled;
            task.last_error = Some(Failure::new(FailureKind::Cancelled, "Job cancelled"));
        }
        job.output = OutputState::Skipped;
    } else if job
        .tasks
        .iter()
        .any(|t| t.required && t.status != TaskStatus::Succeeded)
    {
        job.output = OutputState::Skipped;
    } else {
        job.output = match inner.output.finalize(&job).await {
            Ok(manifest) => OutputState::Finalized { manifest },
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Output validation failed");
                OutputState::Failed {
                    failure: e.to_failure(),
                }
            }
        };
    }
    job.finished_at = Some(Utc::now());

    let status = job.status();
    let failure = job.failure();
    let job_id = job.id;
    match status {
        JobStatus::Completed => info!(job_id = %job_id, "Job completed"),
        JobStatus::PartiallyFailed => warn!(job_id = %job_id, "Job completed with optional tasks failed"),
        JobStatus::Cancelled => info!(job_id = %job_id, "Job cancelled"),
        _ => error!(
            job_id = %job_id,
            status = status.as_str(),
            error = failure.as_ref().map(|f| f.message.as_str()).unwrap_or(""),
            "Job failed"
        ),
    }
    metrics::JOBS_FINISHED.with_label_values(&[status.as_str()]).inc();

    let snapshot = job.clone();
    drop(job);
    inner.store.save(snapshot).await;
    emit(inner, JobEvent::JobFinished { job_id, status, failure });
}

fn emit(inner: &Inner, event: JobEvent) {
    // No subscribers is fine.
    let _ = inner.events.send(event);
}
