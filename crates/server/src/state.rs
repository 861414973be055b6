use std::sync::Arc;
use encodefleet_core::{Config, HardwareAcceleratorService, NodeRegistry, TranscodeOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<TranscodeOrchestrator>,
    hardware: Arc<HardwareAcceleratorService>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<TranscodeOrchestrator>,
        hardware: Arc<HardwareAcceleratorService>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            hardware,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<TranscodeOrchestrator> {
        &self.orchestrator
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        self.orchestrator.registry()
    }

    pub fn hardware(&self) -> &HardwareAcceleratorService {
        self.hardware.as_ref()
    }
}
