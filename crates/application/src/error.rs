use domain::{DomainError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),
    #[error("Account already registered")]
    AccountAlreadyRegistered,
    #[error("User does not exist")]
    UserNotFound,
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
