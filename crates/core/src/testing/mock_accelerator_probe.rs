//! Accelerator probe returning a fixed inventory.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::hardware::{AcceleratorProbe, GpuAccelerator, HardwareError};

/// Probe with a fixed result that counts how often it ran.
pub struct StaticAcceleratorProbe {
    result: Result<Vec<GpuAccelerator>, String>,
    calls: AtomicUsize,
}

impl StaticAcceleratorProbe {
    pub fn new(gpus: Vec<GpuAccelerator>) -> Self {
        Self {
            result: Ok(gpus),
            calls: AtomicUsize::new(0),
        }
    }

    /// A probe whose detection always fails.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            result: Err(reason.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcceleratorProbe for StaticAcceleratorProbe {
    fn name(&self) -> &str {
        "static"
    }

    async fn detect(&self) -> Result<Vec<GpuAccelerator>, HardwareError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which concurrent callers could double-probe.
        tokio::task::yield_now().await;
        self.result.clone().map_err(HardwareError::probe_failed)
    }
}
