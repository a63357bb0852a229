use std::fmt;
use std::future::Future;

use tokio::time::{sleep, Instant};

use crate::config::WaitPolicy;

/// Page states a session can wait for.
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    IdPresent(String),
    ClassPresent(String),
    UrlChangedFrom(String),
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::IdPresent(id) => write!(f, "element #{id}"),
            Readiness::ClassPresent(class) => write!(f, "element .{class}"),
            Readiness::UrlChangedFrom(url) => write!(f, "navigation away from {url}"),
        }
    }
}

/// Probes until it reports ready or the policy's timeout elapses, backing off
/// between probes. Returns whether the probe ever reported ready. The probe
/// always runs at least once; a probe error ends the wait immediately.
pub async fn poll_until<F, Fut, E>(policy: &WaitPolicy, mut probe: F) -> Result<bool, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let start = Instant::now();
    let timeout = policy.timeout();
    let mut interval = policy.initial_interval();

    loop {
        if probe().await? {
            return Ok(true);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(false);
        }

        sleep(interval.min(timeout - elapsed)).await;
        interval = (interval * 2).min(policy.max_interval());
    }
}
