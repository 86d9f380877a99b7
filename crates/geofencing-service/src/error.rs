//! Service-level errors.

use geofencing_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("subscription manager error: {0:#}")]
    Remote(anyhow::Error),
    #[error("broker error: {0}")]
    Broker(#[from] crate::broker::BrokerError),
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
