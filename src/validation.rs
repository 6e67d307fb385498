use crate::constants::{MAX_APP_NAME_CHARS, MAX_PROBE_TIMEOUT_MS, MAX_RETENTION_DAYS};
use crate::error::AppError;

/// Validate an application name chosen for tracking.
/// Returns the trimmed name if valid.
pub fn validate_app_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput {
            field: "app_name",
            reason: "cannot be empty".into(),
        });
    }
    if name.chars().count() > MAX_APP_NAME_CHARS {
        return Err(AppError::InvalidInput {
            field: "app_name",
            reason: format!("cannot exceed {MAX_APP_NAME_CHARS} characters"),
        });
    }
    Ok(name)
}

/// Validate the number of days of history to keep.
pub fn validate_retention_days(days: u32) -> Result<u32, AppError> {
    if days == 0 {
        return Err(AppError::InvalidInput {
            field: "retention_days",
            reason: "must be at least 1".into(),
        });
    }
    if days > MAX_RETENTION_DAYS {
        return Err(AppError::InvalidInput {
            field: "retention_days",
            reason: format!("cannot exceed {MAX_RETENTION_DAYS} days"),
        });
    }
    Ok(days)
}

/// Validate a positive, finite duration in seconds.
pub fn validate_secs(field: &'static str, secs: f64) -> Result<(), AppError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(AppError::InvalidInput {
            field,
            reason: "must be a positive number of seconds".into(),
        });
    }
    Ok(())
}

/// Validate a positive duration in milliseconds.
pub fn validate_millis(field: &'static str, millis: u64) -> Result<(), AppError> {
    if millis == 0 {
        return Err(AppError::InvalidInput {
            field,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

/// Validate the window-title probe bound. A probe may never stall a tick for more than a second.
pub fn validate_probe_timeout_ms(millis: u64) -> Result<(), AppError> {
    validate_millis("probe_timeout_ms", millis)?;
    if millis > MAX_PROBE_TIMEOUT_MS {
        return Err(AppError::InvalidInput {
            field: "probe_timeout_ms",
            reason: format!("cannot exceed {MAX_PROBE_TIMEOUT_MS}ms"),
        });
    }
    Ok(())
}

/// Validate the retention prune period (at most once an hour).
pub fn validate_prune_interval_secs(secs: f64) -> Result<(), AppError> {
    validate_secs("prune_interval_secs", secs)?;
    if secs < 3600.0 {
        return Err(AppError::InvalidInput {
            field: "prune_interval_secs",
            reason: "must be at least 3600 seconds".into(),
        });
    }
    Ok(())
}

/// Validate a count that must be non-zero (sweep period, cache entries, byte ceilings).
pub fn validate_nonzero(field: &'static str, value: usize) -> Result<(), AppError> {
    if value == 0 {
        return Err(AppError::InvalidInput {
            field,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}
