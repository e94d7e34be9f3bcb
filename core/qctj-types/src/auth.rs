//! Capability and nonce checks.
//!
//! The host platform owns users, roles and CSRF tokens. Components only ask
//! yes/no questions through [`Authorizer`].

/// Capability required for every administrative write.
pub const MANAGE_OPTIONS: &str = "manage_options";

/// Host-provided authorization checks for the current request.
pub trait Authorizer: Send + Sync {
    /// Returns true if the current user holds `capability`.
    fn current_user_can(&self, capability: &str) -> bool;

    /// Returns true if `nonce` is a valid token for `action`.
    fn verify_nonce(&self, nonce: &str, action: &str) -> bool;
}

/// Fixed answers, for CLI use and tests.
///
/// A nonce is accepted when it equals the action name, which is what the
/// CLI submits on behalf of the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAuthorizer {
    can_manage: bool,
    accept_nonces: bool,
}

impl StaticAuthorizer {
    /// An administrator with valid nonces.
    #[must_use]
    pub const fn admin() -> Self {
        Self {
            can_manage: true,
            accept_nonces: true,
        }
    }

    /// A user without any capability.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            can_manage: false,
            accept_nonces: true,
        }
    }

    /// An administrator whose request carries forged or stale nonces.
    #[must_use]
    pub const fn admin_with_bad_nonces() -> Self {
        Self {
            can_manage: true,
            accept_nonces: false,
        }
    }
}

impl Authorizer for StaticAuthorizer {
    fn current_user_can(&self, capability: &str) -> bool {
        self.can_manage && capability == MANAGE_OPTIONS
    }

    fn verify_nonce(&self, nonce: &str, action: &str) -> bool {
        self.accept_nonces && nonce == action
    }
}
