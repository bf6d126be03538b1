//! Jittered backoff
//!
//! Delays come from the configured [`RetryPolicy`]; jitter keeps several
//! providers that lost the same ensemble from reconnecting in lockstep.

use rand::Rng;
use statekeeper_core::RetryPolicy;
use std::time::Duration;

/// Delay after failed `attempt` (1-based): uniformly in `[d/2, d]` where `d`
/// is the policy's backoff for that attempt
pub(crate) fn jittered(policy: &RetryPolicy, attempt: u32) -> Duration {
    let full = policy.backoff(attempt);
    let half = full / 2;
    if half.is_zero() {
        return full;
    }
    let extra = rand::thread_rng().gen_range(0..=half.as_nanos() as u64);
    half + Duration::from_nanos(extra)
}
