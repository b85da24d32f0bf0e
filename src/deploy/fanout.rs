use std::future::Future;
use tracing::{info, warn};

use crate::context::OperationContext;
use crate::error::{BindFailure, Error, PartialFailure};
use crate::types::Result;

/// Bind every sub-resource in order, collecting all failures
///
/// A failing bind does not stop the loop. If any bind failed, the returned
/// [`Error::PartialFailure`] lists each failing 1-based index together with
/// the sub-resources that did succeed.
///
/// Cancellation ends the loop at once. Before any bind has completed it is
/// returned as is; after that it is recorded as the failure of the
/// interrupted sub-resource and the partial report is returned, so earlier
/// outcomes are never lost.
pub async fn bind_all<'a, T, F, Fut>(
    ctx: &OperationContext,
    resources: &'a [T],
    mut bind: F,
) -> Result<Vec<String>>
where
    T: AsRef<str>,
    F: FnMut(&'a T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut succeeded = Vec::with_capacity(resources.len());
    let mut failures = Vec::new();

    for (i, resource) in resources.iter().enumerate() {
        let id = resource.as_ref();
        let outcome = match ctx.check() {
            Ok(()) => bind(resource).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                info!(resource = %id, "Certificate bound");
                succeeded.push(id.to_string());
            }
            Err(e) if e.is_cancellation() => {
                if succeeded.is_empty() && failures.is_empty() {
                    return Err(e);
                }
                warn!(resource = %id, error = %e, "Fan-out interrupted");
                failures.push(BindFailure {
                    index: i + 1,
                    resource: id.to_string(),
                    error: Box::new(e),
                });
                break;
            }
            Err(e) => {
                warn!(resource = %id, error = %e, "Failed to bind certificate");
                failures.push(BindFailure {
                    index: i + 1,
                    resource: id.to_string(),
                    error: Box::new(e),
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(succeeded)
    } else {
        Err(Error::PartialFailure(PartialFailure {
            succeeded,
            failures,
        }))
    }
}
