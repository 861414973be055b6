//! Parser for the encoder's `-progress` key=value stream.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Accumulated state of the key=value progress stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSample {
    pub out_time_secs: f64,
    pub speed: Option<f64>,
    /// `progress=end` was seen.
    pub finished: bool,
}

/// What a single line changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A time, speed or status key was applied.
    Progress,
    /// End of one progress block (`progress=continue|end`).
    BlockEnd,
    /// Anything else: log output or uninteresting keys.
    Other,
}

static OUT_TIME_US: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^out_time_(?:us|ms)=(\d+)$").expect("valid regex"));
static OUT_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^out_time=(\d+):(\d{2}):(\d{2}(?:\.\d+)?)$").expect("valid regex"));
static SPEED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^speed=\s*(\d+(?:\.\d+)?)x$").expect("valid regex"));
static STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^progress=(\w+)$").expect("valid regex"));

impl ProgressSample {
    /// Applies one output line.
    ///
    /// `out_time_ms` carries microseconds as well, so both keys divide by
    /// 1e6. Negative or `N/A` values are left out.
    pub fn apply_line(&mut self, line: &str) -> LineKind {
        let line = line.trim();

        if let Some(caps) = OUT_TIME_US.captures(line) {
            if let Ok(us) = caps[1].parse::<u64>() {
                self.out_time_secs = us as f64 / 1_000_000.0;
                return LineKind::Progress;
            }
            return LineKind::Other;
        }

        if let Some(caps) = OUT_TIME.captures(line) {
            let h = caps[1].parse::<f64>().unwrap_or(0.0);
            let m = caps[2].parse::<f64>().unwrap_or(0.0);
            let s = caps[3].parse::<f64>().unwrap_or(0.0);
            self.out_time_secs = h * 3600.0 + m * 60.0 + s;
            return LineKind::Progress;
        }

        if let Some(caps) = SPEED.captures(line) {
            self.speed = caps[1].parse::<f64>().ok().filter(|s| *s > 0.0);
            return LineKind::Progress;
        }

        if let Some(caps) = STATUS.captures(line) {
            if &caps[1] == "end" {
                self.finished = true;
            }
            return LineKind::BlockEnd;
        }

        LineKind::Other
    }
}
