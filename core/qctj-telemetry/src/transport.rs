//! Delivery of check-ins to the vendor.

use crate::error::{TelemetryError, TelemetryResult};
use crate::snapshot::TelemetrySnapshot;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Check-ins never hold up the request that triggers them for long.
pub const CHECKIN_TIMEOUT: Duration = Duration::from_secs(8);

/// One outgoing check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkin {
    pub url: String,
    pub user_agent: String,
    pub snapshot: TelemetrySnapshot,
}

/// Fire-and-forget delivery.
///
/// `dispatch` must return without waiting for the remote side. Failures are
/// the transport's to log.
pub trait CheckinTransport: Send + Sync {
    fn dispatch(&self, checkin: Checkin);
}

/// [`CheckinTransport`] posting over HTTPS from a task spawned on the current
/// tokio runtime.
#[derive(Clone)]
pub struct HttpCheckinTransport {
    client: Client,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl HttpCheckinTransport {
    pub fn new(timeout: Duration) -> TelemetryResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            in_flight: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Posts `checkin` and waits for the answer. The body is ignored.
    pub async fn post(&self, checkin: &Checkin) -> TelemetryResult<()> {
        let response = self
            .client
            .post(&checkin.url)
            .header(USER_AGENT, &checkin.user_agent)
            .form(&checkin.snapshot.form())
            .send()
            .await
            .map_err(|e| TelemetryError::Network(format!("check-in failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Network(format!(
                "check-in returned HTTP {status}"
            )));
        }
        Ok(())
    }

    /// Waits for every dispatched check-in to finish.
    ///
    /// Short-lived processes call this before exiting so the spawned posts
    /// are not cut off with the runtime.
    pub async fn drain(&self) {
        let pending = match self.in_flight.lock() {
            Ok(mut in_flight) => mem::take(&mut *in_flight),
            Err(poisoned) => mem::take(&mut *poisoned.into_inner()),
        };
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "Check-in task failed");
            }
        }
    }
}

impl CheckinTransport for HttpCheckinTransport {
    fn dispatch(&self, checkin: Checkin) {
        let Ok(handle) = Handle::try_current() else {
            warn!(url = %checkin.url, "No async runtime, check-in dropped");
            return;
        };
        let transport = self.clone();
        let task = handle.spawn(async move {
            match transport.post(&checkin).await {
                Ok(()) => debug!(url = %checkin.url, "Check-in delivered"),
                Err(e) => warn!(error = %e, "Check-in not delivered"),
            }
        });
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.retain(|task| !task.is_finished());
            in_flight.push(task);
        }
    }
}
