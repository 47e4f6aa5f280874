//! Bounded polling until a remote resource reaches a terminal status.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ProviderError;

/// How long and how often to poll.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Delay between two polls.
    pub interval: Duration,
    /// Give up once this much time has elapsed.
    pub timeout: Duration,
    /// Flipped to `true` when the provider is stopping.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl WaitOptions {
    /// Options without a cancellation signal.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            cancel: None,
        }
    }

    /// Attach a cancellation signal.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Poll `poll` until `is_terminal` accepts its result, the timeout elapses or the
/// provider stops.
///
/// The first poll happens immediately, so a resource already in a terminal
/// status costs exactly one call. Poll errors, including 404, are returned as is;
/// callers that tolerate a vanished resource use [`allow_not_found`].
pub async fn wait_until<T, F, Fut, P>(
    what: &str,
    opts: &WaitOptions,
    mut poll: F,
    is_terminal: P,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
    P: Fn(&T) -> bool,
{
    let deadline = Instant::now() + opts.timeout;
    let mut cancel = opts.cancel.clone();
    let mut attempt = 0u32;

    loop {
        if is_cancelled(&cancel) {
            return Err(ProviderError::Cancelled(format!("stopped while waiting for {}", what)));
        }

        attempt += 1;
        let current = poll().await?;
        if is_terminal(&current) {
            debug!(what, attempt, "wait finished");
            return Ok(current);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ProviderError::DeadlineExceeded(format!(
                "timed out after {:?} waiting for {}",
                opts.timeout, what
            )));
        }
        let delay = opts.interval.min(deadline - now);
        debug!(what, attempt, ?delay, "not ready yet");

        match cancel.as_mut() {
            Some(rx) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {},
                    _ = stopped(rx) => {
                        return Err(ProviderError::Cancelled(format!(
                            "stopped while waiting for {}",
                            what
                        )));
                    },
                }
            },
            None => tokio::time::sleep(delay).await,
        }
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

async fn stopped(rx: &mut watch::Receiver<bool>) {
    // a dropped sender means no stop can ever arrive
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Map a 404 to `Ok(None)`, for deletes where a vanished resource is success.
pub fn allow_not_found<T>(result: Result<T, ProviderError>) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
