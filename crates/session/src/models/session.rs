//! In-memory session state.

use pharmadesk_core::UserRole;

use super::user::UserProfile;

/// Authentication state machine.
///
/// ```text
/// Unauthenticated --login--> Authenticating --ok--> Authenticated
///                            Authenticating --err--> Error --> Unauthenticated
/// Authenticated --logout--> Unauthenticated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    /// The last attempt failed. Published once, then replaced by the
    /// state the attempt started from.
    Error,
}

/// Snapshot of "who is logged in".
///
/// Only the session manager produces these; consumers read clones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub state: SessionState,
    pub user: Option<UserProfile>,
    /// A request is in flight.
    pub loading: bool,
    /// Message from the most recent failed attempt.
    pub error: Option<String>,
    /// Startup rehydration has run. Guards wait for this before redirecting.
    pub initialized: bool,
}

impl Session {
    /// Whether a token-backed session is active.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Role of the signed-in user.
    #[must_use]
    pub fn role(&self) -> Option<UserRole> {
        self.is_authenticated()
            .then(|| self.user.as_ref().map(|u| u.user_type))
            .flatten()
    }

    /// Whether the session holds the given role.
    #[must_use]
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role() == Some(role)
    }
}
