//! Task runners: what actually executes an encode command.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::{is_fatal_output, ExecutionError};
use super::types::TaskContext;
use crate::progress::ProgressMonitor;

/// Executes one task attempt on its assigned node.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Returns the name of this runner.
    fn name(&self) -> &str;

    /// Runs the attempt to completion. Must return
    /// [`ExecutionError::Cancelled`] promptly once `ctx.cancel` fires.
    async fn run(&self, ctx: TaskContext) -> Result<(), ExecutionError>;
}

/// Lines of non-progress stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Runs the encoder as a child process of this host.
///
/// Progress is read from stderr (`-progress pipe:2`); the child is killed
/// when the attempt is cancelled or its future is dropped.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskRunner for ProcessRunner {
    fn name(&self) -> &str {
        "process"
    }

    async fn run(&self, ctx: TaskContext) -> Result<(), ExecutionError> {
        let output = &ctx.task.output;
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!(task = %ctx.task.name, attempt = ctx.attempt, command = %ctx.command, "Spawning encoder");

        let mut child = Command::new(&ctx.command.program)
            .args(&ctx.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExecutionError::EncoderNotFound {
                        path: ctx.command.program.clone().into(),
                    }
                } else {
                    ExecutionError::launch_failed(&ctx.command.program, e.to_string())
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::launch_failed(&ctx.command.program, "stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();
        let mut monitor = ProgressMonitor::new(ctx.task.duration_secs, ctx.progress_interval);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        let read_output = async {
            while let Some(line) = reader.next_line().await? {
                match monitor.feed_line(&line) {
                    Some(update) => {
                        // Non-blocking send
                        let _ = ctx.progress.try_send(update);
                    }
                    None if !is_progress_key(&line) => {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                    None => {}
                }
            }
            child.wait().await
        };

        let status = tokio::select! {
            _ = ctx.cancel.cancelled() => None,
            status = read_output => Some(status?),
        };
        let Some(status) = status else {
            debug!(task = %ctx.task.name, "Cancelling encoder");
            let _ = child.kill().await;
            return Err(ExecutionError::Cancelled);
        };

        if !status.success() {
            let stderr: Vec<String> = tail.into_iter().collect();
            let stderr = stderr.join("\n");
            let fatal = is_fatal_output(&stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no output")
                .to_string();
            warn!(
                task = %ctx.task.name,
                exit_code = ?status.code(),
                fatal,
                "Encoder failed"
            );
            return Err(ExecutionError::process_failed(status.code(), message, fatal));
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 || ctx.task.segmented => Ok(()),
            _ => Err(ExecutionError::OutputMissing { path: output.clone() }),
        }
    }
}

/// `key=value` lines of the progress stream, as opposed to log output.
fn is_progress_key(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, _)) => !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandLine;
    use crate::job::Task;
    use crate::registry::{EncoderNode, NodeRegistry, NodeRegistration, RegistryConfig};
    use crate::capability::TrackKind;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    async fn node() -> EncoderNode {
        let registry = NodeRegistry::new(&RegistryConfig::default());
        registry.register(NodeRegistration::new("local", 1)).await.unwrap()
    }

    async fn context(program: &str, args: &[&str], output: std::path::PathBuf) -> (TaskContext, mpsc::Receiver<crate::progress::ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(16);
        let mut task = Task::new(Uuid::new_v4(), "video-720p", TrackKind::Video, "libx264");
        task.output = output;
        task.duration_secs = 10.0;
        let ctx = TaskContext {
            task,
            node: node().await,
            command: CommandLine {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
            attempt: 1,
            progress: tx,
            progress_interval: Duration::ZERO,
            cancel: CancellationToken::new(),
        };
        (ctx, rx)
    }

    #[test]
    fn test_is_progress_key() {
        assert!(is_progress_key("out_time_us=1000"));
        assert!(is_progress_key("progress=end"));
        assert!(!is_progress_key("[h264 @ 0x1] frame=1 is broken"));
        assert!(!is_progress_key("Conversion failed!"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) = context("/nonexistent/ffmpeg-binary", &[], dir.path().join("out.mp4")).await;
        let err = ProcessRunner::new().run(ctx).await.unwrap_err();
        assert!(matches!(err, ExecutionError::EncoderNotFound { .. }));
        assert!(!err.is_retryable());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_progress_and_success() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out.mp4");
        let script = format!(
            "printf 'out_time_us=5000000\\nprogress=continue\\nout_time_us=10000000\\nprogress=end\\n' >&2; printf data > '{}'",
            out.display()
        );
        let (ctx, mut rx) = context("sh", &["-c", &script], out.clone()).await;
        ProcessRunner::new().run(ctx).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.percent, 50.0);
        let last = rx.recv().await.unwrap();
        assert_eq!(last.percent, 100.0);
        assert!(out.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fatal_exit_classified() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) = context(
            "sh",
            &["-c", "echo \"Unknown encoder 'h264_nvenc'\" >&2; exit 1"],
            dir.path().join("out.mp4"),
        )
        .await;
        match ProcessRunner::new().run(ctx).await.unwrap_err() {
            ExecutionError::ProcessFailed { exit_code, fatal, message } => {
                assert_eq!(exit_code, Some(1));
                assert!(fatal);
                assert!(message.contains("Unknown encoder"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transient_exit_and_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) = context("sh", &["-c", "echo 'Conversion failed!' >&2; exit 1"], dir.path().join("a.mp4")).await;
        assert!(ProcessRunner::new().run(ctx).await.unwrap_err().is_retryable());

        let (ctx, _rx) = context("sh", &["-c", "exit 0"], dir.path().join("b.mp4")).await;
        let err = ProcessRunner::new().run(ctx).await.unwrap_err();
        assert!(matches!(err, ExecutionError::OutputMissing { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) = context("sh", &["-c", "sleep 30"], dir.path().join("out.mp4")).await;
        let cancel = ctx.cancel.clone();
        let handle = tokio::spawn(async move { ProcessRunner::new().run(ctx).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(matches!(result, Err(ExecutionError::Cancelled)));
    }
}
