//! Waiting for an out-of-band Discogs login (OAuth in the browser).

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use vinylmatch_core::backend::Backend;
use vinylmatch_core::models::DiscogsAccountStatus;

pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(750);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollSettings {
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    LoggedIn(DiscogsAccountStatus),
    TimedOut,
    Cancelled,
}

/// Polls the status endpoint until the account reports a login, the timeout
/// elapses or `cancel` flips to `true`. Status errors are retried.
pub async fn poll_until_logged_in(
    backend: &dyn Backend,
    settings: PollSettings,
    mut cancel: watch::Receiver<bool>,
) -> PollOutcome {
    let interval = settings.effective_interval();
    let deadline = Instant::now() + settings.timeout;
    let mut attempts = 0u32;
    loop {
        if *cancel.borrow() {
            return PollOutcome::Cancelled;
        }
        attempts += 1;
        match backend.discogs_status().await {
            Ok(status) if status.logged_in => {
                tracing::info!(attempts, user = status.display_name(), "discogs login detected");
                return PollOutcome::LoggedIn(status);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, attempts, "status poll failed"),
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::info!(attempts, "gave up waiting for discogs login");
            return PollOutcome::TimedOut;
        }
        let nap = interval.min(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(nap) => {}
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return PollOutcome::Cancelled;
                }
            }
        }
    }
}

/// A login poll running on the tokio runtime.
pub struct LoginPoll {
    cancel: watch::Sender<bool>,
    task: JoinHandle<PollOutcome>,
}

impl LoginPoll {
    pub fn spawn(backend: Arc<dyn Backend>, settings: PollSettings) -> Self {
        let (cancel, receiver) = watch::channel(false);
        let task = tokio::spawn(async move {
            poll_until_logged_in(backend.as_ref(), settings, receiver).await
        });
        Self { cancel, task }
    }

    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub async fn outcome(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "login poll task failed");
                PollOutcome::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_floored() {
        let settings = PollSettings {
            interval: Duration::from_millis(10),
            timeout: DEFAULT_POLL_TIMEOUT,
        };
        assert_eq!(settings.effective_interval(), MIN_POLL_INTERVAL);
        assert_eq!(
            PollSettings::default().effective_interval(),
            DEFAULT_POLL_INTERVAL
        );
    }
}
