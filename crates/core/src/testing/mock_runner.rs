//! Scripted task runner.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::executor::{ExecutionError, TaskContext, TaskRunner};
use crate::job::Task;
use crate::progress::ProgressUpdate;

/// What one attempt of a task does.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    Succeed,
    /// Non-zero exit with a retryable message.
    Transient(String),
    /// Non-zero exit the encoder will never get past.
    Fatal(String),
    /// Blocks until cancelled.
    Hang,
}

impl MockOutcome {
    fn into_error(self) -> Option<ExecutionError> {
        match self {
            Self::Succeed | Self::Hang => None,
            Self::Transient(msg) => Some(ExecutionError::process_failed(Some(1), msg, false)),
            Self::Fatal(msg) => Some(ExecutionError::process_failed(Some(1), msg, true)),
        }
    }
}

/// One recorded call to [`MockTaskRunner::run`].
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub task: String,
    pub node_id: String,
    pub attempt: u32,
    pub command: String,
    pub at: Instant,
}

/// Mock runner.
///
/// Outcomes are scripted per task name and consumed one per attempt; once a
/// script runs out the default outcome applies. Successful attempts can
/// write plausible output files so the output stage has something to check.
pub struct MockTaskRunner {
    scripts: Mutex<HashMap<String, VecDeque<MockOutcome>>>,
    default: MockOutcome,
    delay: Duration,
    /// Segments per segmented output; `None` writes nothing.
    segments: Option<usize>,
    segment_duration: f64,
    omitted: Mutex<HashMap<String, usize>>,
    attempts: Mutex<Vec<AttemptRecord>>,
    running: AtomicU32,
    peak: AtomicU32,
}

impl Default for MockTaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTaskRunner {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default: MockOutcome::Succeed,
            delay: Duration::ZERO,
            segments: None,
            segment_duration: 6.0,
            omitted: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
            running: AtomicU32::new(0),
            peak: AtomicU32::new(0),
        }
    }

    /// How long each attempt takes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_default(mut self, outcome: MockOutcome) -> Self {
        self.default = outcome;
        self
    }

    /// Write `segments` segments of `segment_duration` seconds (the last one
    /// half as long) for every successful segmented task.
    pub fn with_outputs(mut self, segments: usize, segment_duration: f64) -> Self {
        self.segments = Some(segments);
        self.segment_duration = segment_duration;
        self
    }

    pub fn script(&self, task: &str, outcomes: Vec<MockOutcome>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(task.to_string(), outcomes.into());
    }

    /// Leave segment `index` of `task` unwritten while still listing it.
    pub fn omit_segment(&self, task: &str, index: usize) {
        self.omitted.lock().unwrap().insert(task.to_string(), index);
    }

    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, task: &str) -> Vec<AttemptRecord> {
        self.attempts().into_iter().filter(|a| a.task == task).collect()
    }

    /// Highest number of attempts that ran at the same time.
    pub fn peak_concurrency(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, task: &str) -> MockOutcome {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(task)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.clone())
    }
}

struct RunningGuard<'a>(&'a AtomicU32);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskRunner for MockTaskRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, ctx: TaskContext) -> Result<(), ExecutionError> {
        self.attempts.lock().unwrap().push(AttemptRecord {
            task: ctx.task.name.clone(),
            node_id: ctx.node.id.clone(),
            attempt: ctx.attempt,
            command: ctx.command.render(),
            at: Instant::now(),
        });
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        let outcome = self.next_outcome(&ctx.task.name);
        if outcome == MockOutcome::Hang {
            ctx.cancel.cancelled().await;
            return Err(ExecutionError::Cancelled);
        }

        let _ = ctx.progress.try_send(update(50.0, ctx.task.duration_secs));
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(ExecutionError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }

        if let Some(err) = outcome.into_error() {
            return Err(err);
        }
        if let Some(segments) = self.segments {
            write_hls_output(&ctx.task, segments, self.segment_duration).await?;
            let omitted = self.omitted.lock().unwrap().get(&ctx.task.name).copied();
            if let (Some(index), Some(dir)) = (omitted, ctx.task.output.parent()) {
                if ctx.task.segmented {
                    tokio::fs::remove_file(dir.join(segment_name(index))).await?;
                }
            }
        }
        let _ = ctx.progress.try_send(update(100.0, ctx.task.duration_secs));
        Ok(())
    }
}

fn update(percent: f64, duration_secs: f64) -> ProgressUpdate {
    ProgressUpdate {
        percent,
        out_time_secs: duration_secs * percent / 100.0,
        elapsed_secs: 0.0,
        eta_secs: None,
        speed: None,
    }
}

fn segment_name(index: usize) -> String {
    format!("segment_{:05}.ts", index)
}

/// Writes what a successful encode of `task` would leave behind: a media
/// playlist plus segment files for segmented tasks, or a single non-empty
/// file otherwise.
pub async fn write_hls_output(task: &Task, segments: usize, segment_duration: f64) -> std::io::Result<()> {
    let dir = task.output.parent().unwrap_or(Path::new("."));
    tokio::fs::create_dir_all(dir).await?;

    if !task.segmented || segments == 0 {
        let body: &[u8] = if task.output.extension().is_some_and(|e| e == "vtt") {
            b"WEBVTT\n\n00:00.000 --> 00:01.000\nhello\n"
        } else {
            b"data"
        };
        return tokio::fs::write(&task.output, body).await;
    }

    let mut playlist = format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{}\n#EXT-X-PLAYLIST-TYPE:VOD\n",
        segment_duration.ceil() as u64
    );
    for i in 0..segments {
        let duration = if i + 1 == segments && segments > 1 {
            segment_duration / 2.0
        } else {
            segment_duration
        };
        playlist.push_str(&format!("#EXTINF:{:.3},\n{}\n", duration, segment_name(i)));
        tokio::fs::write(dir.join(segment_name(i)), b"ts").await?;
    }
    playlist.push_str("#EXT-X-ENDLIST\n");
    tokio::fs::write(&task.output, playlist).await
}
