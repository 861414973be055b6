//! Rate-limited progress for one running task.

use std::time::{Duration, Instant};

use super::parser::{LineKind, ProgressSample};
use super::types::ProgressUpdate;

/// Turns a task's output lines into at most one [`ProgressUpdate`] per
/// interval. The final block (`progress=end`) is always emitted.
#[derive(Debug)]
pub struct ProgressMonitor {
    duration_secs: f64,
    interval: Duration,
    started: Instant,
    last_emit: Option<Instant>,
    sample: ProgressSample,
}

impl ProgressMonitor {
    /// `duration_secs` is the media duration of the task's input; zero
    /// leaves the percentage at 0 until the end marker.
    pub fn new(duration_secs: f64, interval: Duration) -> Self {
        Self::started_at(duration_secs, interval, Instant::now())
    }

    pub fn started_at(duration_secs: f64, interval: Duration, started: Instant) -> Self {
        Self {
            duration_secs: duration_secs.max(0.0),
            interval,
            started,
            last_emit: None,
            sample: ProgressSample::default(),
        }
    }

    pub fn feed_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        self.feed_line_at(line, Instant::now())
    }

    /// Like [`feed_line`](Self::feed_line) with an explicit clock reading.
    pub fn feed_line_at(&mut self, line: &str, now: Instant) -> Option<ProgressUpdate> {
        if self.sample.apply_line(line) != LineKind::BlockEnd {
            return None;
        }
        let due = self
            .last_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if !due && !self.sample.finished {
            return None;
        }
        self.last_emit = Some(now);
        Some(self.snapshot_at(now))
    }

    pub fn is_finished(&self) -> bool {
        self.sample.finished
    }

    /// Current state regardless of the interval.
    pub fn snapshot_at(&self, now: Instant) -> ProgressUpdate {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let percent = self.percent();
        let remaining_media = (self.duration_secs - self.sample.out_time_secs).max(0.0);

        let eta_secs = if self.sample.finished {
            Some(0.0)
        } else if let Some(speed) = self.sample.speed {
            (self.duration_secs > 0.0).then(|| remaining_media / speed)
        } else if percent > 0.0 {
            Some(elapsed * (100.0 - percent) / percent)
        } else {
            None
        };

        ProgressUpdate {
            percent,
            out_time_secs: self.sample.out_time_secs,
            elapsed_secs: elapsed,
            eta_secs,
            speed: self.sample.speed,
        }
    }

    fn percent(&self) -> f64 {
        if self.sample.finished {
            return 100.0;
        }
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        (self.sample.out_time_secs / self.duration_secs * 100.0).clamp(0.0, 100.0)
    }
}
