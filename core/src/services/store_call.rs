//! Bounded store round-trips

use std::future::Future;
use std::time::Duration;

use crate::errors::{DomainError, DomainResult, OtpError};

/// Runs a store call under `limit`, reporting adapter failures and timeouts
/// as [`OtpError::Transient`] tagged with `operation`.
pub(crate) async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> DomainResult<T>
where
    F: Future<Output = DomainResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(DomainError::Internal { message })) => {
            Err(OtpError::transient(operation, message).into())
        }
        Ok(Err(other)) => Err(other),
        Err(_) => Err(OtpError::transient(
            operation,
            format!("timed out after {}ms", limit.as_millis()),
        )
        .into()),
    }
}
