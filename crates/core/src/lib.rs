pub mod capability;
pub mod command;
pub mod config;
pub mod executor;
pub mod hardware;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod output;
pub mod probe;
pub mod profile;
pub mod progress;
pub mod registry;
pub mod splitter;
pub mod testing;
pub mod validation;

pub use capability::{
    lookup_codec, lookup_container, AcceleratorFamily, CapabilityError, CapabilityReport,
    CodecDescriptor, CodecFamily, ContainerDescriptor, OptionMap, OptionValue, QualityTier,
    TrackKind,
};
pub use command::{CommandBuilder, CommandError, CommandLine};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, FfmpegConfig,
    HardwareConfig, LocalNodeConfig, ServerConfig,
};
pub use executor::{
    DispatchSettings, Dispatcher, DispatcherConfig, ExecutionError, JobEvent, ProcessRunner,
    RetryConfig, RetryPolicy, TaskContext, TaskRunner,
};
pub use hardware::{
    AcceleratorProbe, FfmpegEncoderProbe, GpuAccelerator, GpuVendor, HardwareAcceleratorService,
    HardwareError,
};
pub use job::{
    EncodingJob, Failure, FailureKind, InMemoryJobStore, JobId, JobStatus, JobStore, Task, TaskId,
    TaskStatus,
};
pub use orchestrator::{
    JobRequest, OrchestratorConfig, OrchestratorError, OrchestratorStatus, TranscodeOrchestrator,
};
pub use output::{OutputConfig, OutputError, OutputOrchestrator};
pub use probe::{FfprobeProber, MediaProber, ProbeError, ProbedInput};
pub use profile::{
    EncodePlan, EncodingProfile, InMemoryProfileRepository, ProfileError, ProfileRepository,
    ProfileRequest, ProfileResolver,
};
pub use progress::{ProgressConfig, ProgressMonitor, ProgressUpdate};
pub use registry::{
    CapacityLease, Clock, EncoderNode, ManualClock, NodeHealth, NodeRegistration, NodeRegistry,
    RegistryConfig, RegistryError, SystemClock,
};
pub use splitter::{SplitError, TaskSplitter};
pub use validation::{Severity, ValidationIssue, ValidationReport};
