//! Config validation: reject values that would wedge the pipeline.

use vela_common::ConfigError;

use crate::schema::VelaConfig;

pub fn validate(config: &VelaConfig) -> Result<(), ConfigError> {
    if config.memory.recall_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "memory.recall_timeout_ms must be greater than zero".into(),
        ));
    }
    if config.tools.timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "tools.timeout_ms must be greater than zero".into(),
        ));
    }
    if config.generation.stream_idle_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "generation.stream_idle_timeout_ms must be greater than zero".into(),
        ));
    }
    if config.fanout.sink_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "fanout.sink_buffer must be greater than zero".into(),
        ));
    }
    if config.session.max_sessions == 0 {
        return Err(ConfigError::ValidationError(
            "session.max_sessions must be greater than zero".into(),
        ));
    }

    for trigger in &config.intents.triggers {
        if trigger.label.is_empty() {
            return Err(ConfigError::ValidationError(
                "intent trigger set with empty label".into(),
            ));
        }
        if trigger.keywords.is_empty() && trigger.phrases.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "intent trigger set '{}' has no keywords or phrases",
                trigger.label
            )));
        }
    }

    Ok(())
}
