//! Queue inspection.
//!
//! The routing decision is always made from the primary region's backlog,
//! regardless of where the work ultimately runs. A query failure is never
//! treated as an empty queue; it retries with backoff and then fails the
//! request as `RegionUnavailable`.

use crate::error::{Result, SpilloverError};
use crate::region::RegionContext;
use std::time::Duration;
use tracing::warn;

/// Number of jobs waiting in the primary region's queue.
pub async fn pending_count(
    primary: &RegionContext,
    retries: u32,
    base_delay: Duration,
) -> Result<usize> {
    let mut delay = base_delay;
    let mut attempt = 0;
    loop {
        match primary.jobs.pending_count().await {
            Ok(count) => return Ok(count),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(
                    attempt,
                    retries,
                    error = %e,
                    "queue inspection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(SpilloverError::RegionUnavailable(message)) => {
                return Err(SpilloverError::RegionUnavailable(message));
            }
            Err(e) => return Err(SpilloverError::RegionUnavailable(e.to_string())),
        }
    }
}
