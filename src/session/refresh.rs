use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::http::HttpClient;

/// Background renewal of a bearer credential before it expires.
///
/// At most one timer runs per scheduler; scheduling again replaces it.
#[derive(Clone)]
pub struct RefreshScheduler {
    margin: Duration,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RefreshScheduler {
    pub fn new(margin: Duration) -> Self {
        Self {
            margin,
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Start refreshing through `http` shortly before `expires_in` elapses.
    ///
    /// Each successful refresh re-arms the timer with the new lifetime. The
    /// loop stops when the session is gone, when the server stops sending a
    /// lifetime, or when a refresh fails (which has already signed out).
    pub fn schedule(&self, http: HttpClient, expires_in: Duration) {
        let margin = self.margin;

        let handle = tokio::spawn(async move {
            let mut expires_in = expires_in;
            loop {
                let delay = refresh_delay(expires_in, margin);
                debug!(delay_secs = delay.as_secs(), "Credential refresh scheduled");
                tokio::time::sleep(delay).await;

                if http.store().credential().is_none() {
                    debug!("Session ended, stopping credential refresh");
                    break;
                }

                match http.refresh_credential().await {
                    Ok(refreshed) => match refreshed.expires_in {
                        Some(secs) => expires_in = Duration::from_secs(secs),
                        None => break,
                    },
                    Err(e) => {
                        debug!(error = %e, "Scheduled credential refresh failed");
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            debug!("Credential refresh cancelled");
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Shortest pause between two scheduled refreshes, whatever lifetime the
/// server reports.
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Fire `margin` before expiry, or halfway through lifetimes shorter than the margin.
fn refresh_delay(expires_in: Duration, margin: Duration) -> Duration {
    let delay = if expires_in > margin {
        expires_in - margin
    } else {
        expires_in / 2
    };
    delay.max(MIN_REFRESH_DELAY)
}
