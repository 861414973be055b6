use super::{types::Config, ConfigError};

fn invalid(message: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.into()))
}

/// Validate configuration
///
/// Checks the cross-field rules serde cannot express: non-zero intervals,
/// a stale threshold longer than the heartbeat interval, a sane retry
/// policy and a usable local node.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return invalid("server.port cannot be 0");
    }

    let registry = &config.registry;
    if registry.heartbeat_interval_secs == 0 {
        return invalid("registry.heartbeat_interval_secs must be greater than 0");
    }
    if registry.stale_threshold().as_secs() <= registry.heartbeat_interval_secs {
        return invalid("registry.stale_threshold_secs must exceed heartbeat_interval_secs");
    }
    if registry.sweep_interval().is_zero() {
        return invalid("registry.sweep_interval_secs must be greater than 0");
    }

    let retry = &config.dispatcher.retry;
    if retry.max_attempts == 0 {
        return invalid("dispatcher.retry.max_attempts must be at least 1");
    }
    if retry.backoff_multiplier < 1.0 {
        return invalid("dispatcher.retry.backoff_multiplier must be >= 1.0");
    }
    if retry.initial_delay_ms > retry.max_delay_ms {
        return invalid("dispatcher.retry.initial_delay_ms cannot exceed max_delay_ms");
    }
    if config.dispatcher.poll_interval_ms == 0 {
        return invalid("dispatcher.poll_interval_ms must be greater than 0");
    }

    if config.progress.interval_ms == 0 {
        return invalid("progress.interval_ms must be greater than 0");
    }

    if config.output.segment_duration_secs <= 0.0 {
        return invalid("output.segment_duration_secs must be positive");
    }
    if config.output.duration_tolerance_secs < 0.0 {
        return invalid("output.duration_tolerance_secs cannot be negative");
    }

    if config.local_node.enabled && config.local_node.max_concurrent_jobs == 0 {
        return invalid("local_node.max_concurrent_jobs must be at least 1");
    }

    Ok(())
}
