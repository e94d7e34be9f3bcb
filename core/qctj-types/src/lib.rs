//! Core type definitions for the QCTJ plugin family.
//!
//! This crate holds the small, host-agnostic pieces every other crate needs:
//! - [`Clock`]: injectable wall clock (seconds resolution)
//! - [`SiteInfo`]: what the host platform knows about the current site
//! - [`Authorizer`]: capability and nonce checks delegated to the host
//! - [`RequestPhase`]: early/late request phases used by action dispatch
//! - query helpers ([`add_query_arg`], [`remove_query_arg`], [`query_arg`])

mod auth;
mod clock;
mod query;
mod site;

pub use auth::{Authorizer, StaticAuthorizer, MANAGE_OPTIONS};
pub use clock::{Clock, FixedClock, SystemClock, DAY_IN_SECONDS, WEEK_IN_SECONDS};
pub use query::{add_query_arg, query_arg, query_pairs, remove_query_arg};
pub use site::{SiteInfo, DEFAULT_LOCALE};

use serde::{Deserialize, Serialize};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

/// The point in the request lifecycle at which code runs.
///
/// `Early` is the host's init phase; `Late` runs once the full request
/// context (query vars, current user, templates) has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPhase {
    Early,
    Late,
}
