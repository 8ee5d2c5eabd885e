use crate::config::ConfigError;
use crate::pipeline::CycleError;
use crate::telemetry::TelemetryError;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Csv(csv::Error),
    Pipeline(CycleError),
    Usage(String),
}

impl AppError {
    /// True when the watch loop must stop rather than wait for the next tick.
    pub fn is_fatal(&self) -> bool {
        match self {
            AppError::Pipeline(err) => err.is_fatal(),
            _ => true,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Csv(err) => write!(f, "csv error: {}", err),
            AppError::Pipeline(err) => write!(f, "pipeline error: {}", err),
            AppError::Usage(message) => write!(f, "invalid usage: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Csv(err) => Some(err),
            AppError::Pipeline(err) => Some(err),
            AppError::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<CycleError> for AppError {
    fn from(value: CycleError) -> Self {
        Self::Pipeline(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;

    #[test]
    fn transient_pipeline_errors_are_not_fatal() {
        let err = AppError::from(CycleError::Store(StoreError::Unavailable(
            "connection reset".to_string(),
        )));
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "pipeline error: object store error: storage unavailable: connection reset"
        );
    }

    #[test]
    fn configuration_errors_are_fatal() {
        assert!(AppError::from(ConfigError::InvalidPort).is_fatal());
    }
}
