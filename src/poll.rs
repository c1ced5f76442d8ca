//! Poll interval scheduling
//!
//! Long-running service jobs are polled with a ramping interval: five quick
//! checks about three seconds apart, five at ten seconds, then one check a
//! minute for as long as it takes. Each interval carries up to half a second
//! of random jitter so that many clients started together drift apart.

use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};

/// Base intervals in seconds, consumed in order; the last one repeats forever
pub const BASE_INTERVALS: [u64; 15] = [3, 3, 3, 3, 3, 10, 10, 10, 10, 10, 60, 60, 60, 60, 60];

/// Upper bound (exclusive) of the jitter added to every interval, in seconds
pub const MAX_JITTER_SECS: f64 = 0.5;

/// Infinite sequence of poll intervals
///
/// Every instance starts from the beginning of [`BASE_INTERVALS`]; nothing is
/// shared between instances.
///
/// ```
/// use dpres_access_client::poll::PollSchedule;
///
/// let first = PollSchedule::new().next().unwrap();
/// assert!(first.as_secs_f64() >= 3.0 && first.as_secs_f64() < 3.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PollSchedule {
    position: usize,
}

impl PollSchedule {
    /// Create a schedule positioned at the first interval
    pub fn new() -> Self {
        Self { position: 0 }
    }

    fn next_base(&mut self) -> u64 {
        let index = self.position.min(BASE_INTERVALS.len() - 1);
        self.position = self.position.saturating_add(1);
        BASE_INTERVALS[index]
    }
}

impl Iterator for PollSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let base = self.next_base() as f64;
        let jitter = rand::thread_rng().gen_range(0.0..MAX_JITTER_SECS);
        Some(Duration::from_secs_f64(base + jitter))
    }
}

/// Repeatedly run `fetch` until `is_done` accepts its result
///
/// The first fetch happens immediately; a sleep taken from `schedule` only
/// precedes each subsequent fetch, so a job that is already finished costs one
/// request and no waiting. Errors from `fetch` end the loop and are returned
/// unchanged.
///
/// With `deadline = None` the loop is unbounded (given an infinite schedule).
/// With `Some(limit)`, [`Error::PollTimeout`] is returned instead of starting
/// a sleep that would cross the limit. A finite schedule that runs out is
/// treated the same way.
pub async fn poll_until<S, F, Fut, T, P>(
    schedule: S,
    deadline: Option<Duration>,
    mut fetch: F,
    mut is_done: P,
) -> Result<T>
where
    S: IntoIterator<Item = Duration>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
{
    let mut schedule = schedule.into_iter();
    let started = Instant::now();
    let mut checks: u32 = 0;

    loop {
        let value = fetch().await?;
        checks += 1;
        if is_done(&value) {
            tracing::debug!(checks, elapsed_ms = started.elapsed().as_millis(), "poll finished");
            return Ok(value);
        }

        let elapsed = started.elapsed();
        let Some(wait) = schedule.next() else {
            return Err(Error::PollTimeout { waited: elapsed });
        };
        if let Some(limit) = deadline
            && elapsed + wait > limit
        {
            tracing::warn!(checks, waited_ms = elapsed.as_millis(), "poll deadline reached");
            return Err(Error::PollTimeout { waited: elapsed });
        }

        tracing::debug!(checks, wait_ms = wait.as_millis(), "not finished yet, waiting");
        tokio::time::sleep(wait).await;
    }
}
