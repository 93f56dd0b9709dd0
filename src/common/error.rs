use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),
}

impl DomainError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        DomainError::Configuration {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Controller unavailable: {0}")]
    ControllerUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}

impl ApplicationError {
    /// True when the error is the operator-facing configuration rejection of a `Start`.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ApplicationError::Domain(DomainError::Configuration { .. })
                | ApplicationError::Configuration(_)
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
