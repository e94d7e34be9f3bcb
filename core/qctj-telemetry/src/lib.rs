//! Opt-in usage telemetry for the QCTJ plugin family.
//!
//! [`TelemetryReporter`] decides whether a check-in may go out, builds the
//! anonymized [`TelemetrySnapshot`] and hands it to a [`CheckinTransport`].
//! Check-ins are fire-and-forget: the caller learns only whether one was
//! sent, never whether it arrived.

mod error;
mod reporter;
mod snapshot;
mod transport;

pub use error::{TelemetryError, TelemetryResult};
pub use reporter::{
    campaign_source, TelemetryConfig, TelemetryReporter, TrackingNotice, ACTION_ARG, ALLOW_TRACKING,
    DEFAULT_VENDOR_URL, LAST_SEND_OPTION, NOTICE_OPTION, OPT_IN_ACTION, OPT_OUT_ACTION,
    TRACKING_NOTICE_MESSAGE,
};
pub use snapshot::{build_snapshot, site_id, TelemetrySnapshot, SITE_ID_LEN};
pub use transport::{Checkin, CheckinTransport, HttpCheckinTransport, CHECKIN_TIMEOUT};
