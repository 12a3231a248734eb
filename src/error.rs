use thiserror::Error;

/// Main error type for the telemetry worker
#[derive(Error, Debug)]
pub enum TelesimError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(String),

    // Provider errors, surfaced as TelemetryError events at the cycle boundary
    #[error("Provider failure: {provider} - {reason}")]
    Provider { provider: String, reason: String },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TelesimError {
    /// Short tag used as the `error_type` attribute of TelemetryError events.
    pub fn kind(&self) -> &'static str {
        match self {
            TelesimError::Config(_) => "config",
            TelesimError::Validation(_) => "validation",
            TelesimError::Provider { .. } => "provider",
            TelesimError::Internal(_) => "internal",
            TelesimError::Other(_) => "other",
        }
    }
}

/// Result type alias for TelesimError
pub type Result<T> = std::result::Result<T, TelesimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_tags() {
        let err = TelesimError::Provider {
            provider: "database".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(err.kind(), "provider");
        assert_eq!(err.to_string(), "Provider failure: database - boom");

        assert_eq!(TelesimError::Internal("x".to_string()).kind(), "internal");
    }
}
