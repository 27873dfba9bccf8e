use std::{future::Future, time::Duration};

use crate::{
    http::HttpClient,
    metadata::{MetadataResolver, ResolveError},
    progress::WaitObserver,
    status::LiveStatus,
};

#[derive(thiserror::Error, Debug)]
pub enum WaitError {
    #[error("User @{0} is not live")]
    UserNotLive(String),
    #[error("User @{0} is preparing to go live")]
    UserPreparingForLive(String),
    #[error("Polling interval must be greater than zero")]
    ZeroInterval,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Live,
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub wait_until_live: bool,
    /// Delay between two polls.
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            wait_until_live: false,
            interval: Duration::from_secs(10),
        }
    }
}

/// Sleeps for `interval`, reporting the whole seconds left once per second.
pub async fn countdown(interval: Duration, observer: &mut dyn WaitObserver) {
    let mut remaining = interval;
    let second = Duration::from_secs(1);

    while !remaining.is_zero() {
        observer.countdown(remaining.as_secs_f64().ceil() as u64);
        let step = remaining.min(second);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
}

/// Blocks until the resolver's session reports the user live.
///
/// `cancel` resolving at any point, including in the middle of a poll,
/// ends the wait with [`WaitOutcome::Cancelled`].
pub async fn wait_until_live<C>(
    resolver: &mut MetadataResolver,
    client: &HttpClient,
    options: &WaitOptions,
    observer: &mut dyn WaitObserver,
    cancel: C,
) -> Result<WaitOutcome, WaitError>
where
    C: Future<Output = ()>,
{
    let session = resolver.session().ok_or(ResolveError::NoUsername)?;
    let username = session.username().to_string();
    let status = session.live_status.ok_or(ResolveError::NoUsername)?;

    match status {
        LiveStatus::Live => return Ok(WaitOutcome::Live),
        LiveStatus::Offline if !options.wait_until_live => {
            return Err(WaitError::UserNotLive(username))
        }
        LiveStatus::PreparingToGoLive if !options.wait_until_live => {
            return Err(WaitError::UserPreparingForLive(username))
        }
        _ => {}
    }

    if options.interval.is_zero() {
        return Err(WaitError::ZeroInterval);
    }

    info!("Waiting for @{} to go live, polling every {:?}", username, options.interval);
    observer.waiting(&username, status);
    tokio::pin!(cancel);

    loop {
        let poll = async {
            countdown(options.interval, observer).await;
            observer.checking();
            resolver.update(client).await
        };

        let polled = tokio::select! {
            biased;
            _ = &mut cancel => None,
            status = poll => Some(status),
        };

        let status = match polled {
            Some(status) => status?,
            None => {
                info!("Waiting for @{} cancelled", username);
                return Ok(WaitOutcome::Cancelled);
            }
        };

        debug!("@{} is {}", username, status);
        if status.is_live() {
            observer.live(&username);
            return Ok(WaitOutcome::Live);
        }
    }
}
