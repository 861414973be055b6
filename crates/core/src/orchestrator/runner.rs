//! Transcode orchestrator implementation.
//!
//! Intake is synchronous up to the point a job is accepted: profile errors,
//! probe failures and inputs with nothing to encode are returned to the
//! caller. Everything after that is reported through job status and events.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::CommandBuilder;
use crate::config::Config;
use crate::executor::{DispatchSettings, Dispatcher, JobEvent, TaskRunner};
use crate::hardware::HardwareAcceleratorService;
use crate::job::{EncodingJob, JobId, JobStore};
use crate::output::OutputOrchestrator;
use crate::probe::MediaProber;
use crate::profile::{EncodingProfile, ProfileRepository, ProfileResolver};
use crate::registry::{NodeRegistry, RegistryConfig};
use crate::splitter::TaskSplitter;

use super::config::OrchestratorConfig;
use super::types::{JobRequest, OrchestratorError, OrchestratorStatus};

/// Front door for encode jobs.
pub struct TranscodeOrchestrator {
    config: OrchestratorConfig,
    registry_config: RegistryConfig,
    registry: Arc<NodeRegistry>,
    profiles: Arc<dyn ProfileRepository>,
    resolver: ProfileResolver,
    prober: Arc<dyn MediaProber>,
    splitter: TaskSplitter,
    dispatcher: Dispatcher,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TranscodeOrchestrator {
    /// Wires the pipeline from the root configuration.
    pub fn new(
        config: &Config,
        registry: Arc<NodeRegistry>,
        profiles: Arc<dyn ProfileRepository>,
        hardware: Arc<HardwareAcceleratorService>,
        prober: Arc<dyn MediaProber>,
        runner: Arc<dyn TaskRunner>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let builder = CommandBuilder::new(config.ffmpeg.ffmpeg_path.to_string_lossy())
            .with_global_args(config.ffmpeg.global_args());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            runner,
            store,
            builder,
            OutputOrchestrator::new(config.output.clone()),
            DispatchSettings::from_config(&config.dispatcher, &config.progress),
        );
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config: config.orchestrator.clone(),
            registry_config: config.registry.clone(),
            registry,
            profiles,
            resolver: ProfileResolver::new(hardware),
            prober,
            splitter: TaskSplitter::new(config.output.segment_duration_secs),
            dispatcher,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileRepository> {
        &self.profiles
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the background loops.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        let interval = self.registry_config.sweep_interval();
        info!(
            sweep_interval_secs = interval.as_secs(),
            stale_threshold_secs = self.registry_config.stale_threshold().as_secs(),
            "Starting transcode orchestrator"
        );

        let registry = Arc::clone(&self.registry);
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            registry.run_sweeper(interval, shutdown_rx).await;
        });
    }

    /// Stops the background loops. Running jobs are left to finish.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }
        info!("Stopping transcode orchestrator");
        let _ = self.shutdown_tx.send(());
    }

    /// Resolves, probes and splits a request, then hands the job to the
    /// dispatcher. The job is queued, not failed, when no node can take it.
    pub async fn submit(&self, request: JobRequest) -> Result<JobId, OrchestratorError> {
        let profile = self.lookup_profile(&request).await?;
        let plan = self.resolver.resolve(Arc::clone(&profile)).await?;
        for warning in &plan.warnings {
            debug!(profile = %profile.name, field = %warning.field, "{}", warning.message);
        }

        let input = self.prober.probe(&request.input).await?;
        let output_dir = self.config.resolve_output_dir(&request.output_dir);
        let job_id = Uuid::new_v4();
        let tasks = self.splitter.split(job_id, &plan, &input, &output_dir)?;

        info!(
            job_id = %job_id,
            input = %request.input.display(),
            profile = %profile.name,
            version = profile.version,
            video_encoder = plan.video.codec.encoder(),
            tasks = tasks.len(),
            "Accepted job"
        );
        let job = EncodingJob::new(job_id, request.input, output_dir, profile, plan.summary(), tasks);
        Ok(self.dispatcher.submit(job).await)
    }

    async fn lookup_profile(&self, request: &JobRequest) -> Result<Arc<EncodingProfile>, OrchestratorError> {
        let name = request.profile.as_deref().unwrap_or(&self.config.default_profile);
        let profile = match request.profile_version {
            Some(version) => self.profiles.get_version(name, version).await?,
            None => self.profiles.get(name).await?,
        };
        Ok(profile)
    }

    /// Cancels a job that has not finished yet.
    pub async fn cancel(&self, job_id: JobId) -> Result<(), OrchestratorError> {
        if self.dispatcher.cancel(job_id).await {
            return Ok(());
        }
        match self.dispatcher.store().get(job_id).await {
            Some(_) => Err(OrchestratorError::JobFinished(job_id)),
            None => Err(OrchestratorError::JobNotFound(job_id)),
        }
    }

    /// Latest snapshot of a job.
    pub async fn job(&self, job_id: JobId) -> Option<EncodingJob> {
        self.dispatcher.store().get(job_id).await
    }

    pub async fn jobs(&self) -> Vec<EncodingJob> {
        self.dispatcher.store().list().await
    }

    /// Waits for a job to reach a terminal status.
    pub async fn wait(&self, job_id: JobId) -> Option<EncodingJob> {
        self.dispatcher.wait(job_id).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.dispatcher.subscribe()
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let (nodes_active, nodes_inactive) = self.registry.counts().await;
        let mut jobs = BTreeMap::new();
        for job in self.dispatcher.store().list().await {
            *jobs.entry(job.status().as_str().to_string()).or_insert(0) += 1;
        }
        OrchestratorStatus {
            running: self.is_running(),
            nodes_active,
            nodes_inactive,
            jobs,
        }
    }
}

impl Drop for TranscodeOrchestrator {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
