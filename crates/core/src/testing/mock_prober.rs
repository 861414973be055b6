//! Media prober returning a fixed description.

use async_trait::async_trait;
use std::path::Path;

use crate::probe::{MediaProber, ProbeError, ProbedInput};

pub struct StaticMediaProber {
    result: Result<ProbedInput, String>,
}

impl StaticMediaProber {
    pub fn new(input: ProbedInput) -> Self {
        Self { result: Ok(input) }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            result: Err(reason.into()),
        }
    }
}

#[async_trait]
impl MediaProber for StaticMediaProber {
    async fn probe(&self, path: &Path) -> Result<ProbedInput, ProbeError> {
        match &self.result {
            Ok(input) => Ok(ProbedInput {
                path: path.to_path_buf(),
                ..input.clone()
            }),
            Err(reason) => Err(ProbeError::probe_failed(reason.clone())),
        }
    }
}
