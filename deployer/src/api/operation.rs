//! Awaiting long-running operations

use std::future::Future;
use std::time::Duration;

use cloud_api::operation::Operation;
use tracing::debug;

use crate::errors::{ApiError, DeployError, RpcCode};
use crate::retry::{retry_on_permission_denied, RetryOptions};

/// Poll `op` through `poll` until it is done
///
/// A finished operation carrying an error becomes [`DeployError::Api`] with
/// the operation's own status code.
pub async fn await_operation<F, Fut>(
    description: &str,
    mut op: Operation,
    poll_interval: Duration,
    retry: &RetryOptions,
    mut poll: F,
) -> Result<Operation, DeployError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Operation, DeployError>>,
{
    while !op.done {
        debug!("Waiting for operation {} ({})", op.name, description);
        tokio::time::sleep(poll_interval).await;
        let name = op.name.clone();
        op = retry_on_permission_denied(description, retry, || poll(name.clone())).await?;
    }

    if let Some(status) = &op.error {
        return Err(ApiError::new(
            RpcCode::from_i32(status.code),
            description,
            status.message.clone(),
        )
        .into());
    }

    Ok(op)
}
