use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Archive prefix and extension are non-empty plain names
/// - Staging buffer size is not 0
/// - Procedure timeout, when set, is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let locator = &config.locator;
    if locator.prefix.is_empty() {
        return Err(ConfigError::ValidationError(
            "locator.prefix cannot be empty".to_string(),
        ));
    }
    if locator.extension.is_empty() {
        return Err(ConfigError::ValidationError(
            "locator.extension cannot be empty".to_string(),
        ));
    }
    for (field, value) in [
        ("locator.prefix", &locator.prefix),
        ("locator.extension", &locator.extension),
    ] {
        if value.contains(['/', '\\']) {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot contain path separators: {:?}",
                field, value
            )));
        }
    }
    if locator.qualifiers.iter().any(|q| q.is_empty()) {
        return Err(ConfigError::ValidationError(
            "locator.qualifiers cannot contain empty entries".to_string(),
        ));
    }

    if config.staging.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "staging.buffer_size cannot be 0".to_string(),
        ));
    }

    if config.procedure.timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "procedure.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
