//! Route guards for protected pages.
//!
//! A guard reads a [`Session`] snapshot and decides whether the page may
//! render, must wait, or must send the user to a login page. It never
//! changes the session; performing the navigation is the caller's job.

use pharmadesk_core::UserRole;

use crate::models::Session;
use crate::routes;

/// What a protected route demands of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any signed-in user.
    Authenticated,
    /// A signed-in user with exactly this role.
    Role(UserRole),
    /// A signed-in user holding one of these roles.
    AnyRole(Vec<UserRole>),
}

impl Requirement {
    /// Whether `session` satisfies the requirement.
    #[must_use]
    pub fn is_met(&self, session: &Session) -> bool {
        if !session.is_authenticated() {
            return false;
        }
        match self {
            Self::Authenticated => true,
            Self::Role(role) => session.has_role(*role),
            Self::AnyRole(roles) => session.role().is_some_and(|r| roles.contains(&r)),
        }
    }

    /// Whether only administrators can satisfy the requirement.
    fn admin_only(&self) -> bool {
        match self {
            Self::Authenticated => false,
            Self::Role(role) => *role == UserRole::Admin,
            Self::AnyRole(roles) => {
                !roles.is_empty() && roles.iter().all(|r| *r == UserRole::Admin)
            }
        }
    }
}

/// Outcome of evaluating a guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session state is not settled yet; render a placeholder.
    Pending,
    /// Render the protected page.
    Allow,
    /// Navigate to `to` instead.
    Redirect {
        /// Login page with the original location in `?redirect=`.
        to: String,
    },
}

/// Gate for one protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    requirement: Requirement,
}

impl RouteGuard {
    #[must_use]
    pub const fn new(requirement: Requirement) -> Self {
        Self { requirement }
    }

    /// Any signed-in user.
    #[must_use]
    pub const fn authenticated() -> Self {
        Self::new(Requirement::Authenticated)
    }

    /// Users with exactly `role`.
    #[must_use]
    pub const fn role(role: UserRole) -> Self {
        Self::new(Requirement::Role(role))
    }

    #[must_use]
    pub const fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Decide what to do with a visit to `current_path`.
    ///
    /// `current_path` should include the query string so the user returns to
    /// exactly where they were.
    #[must_use]
    pub fn evaluate(&self, session: &Session, current_path: &str) -> GuardDecision {
        if session.loading || !session.initialized {
            return GuardDecision::Pending;
        }
        if self.requirement.is_met(session) {
            return GuardDecision::Allow;
        }

        let login = routes::login_page(self.requirement.admin_only());
        GuardDecision::Redirect {
            to: routes::login_url(login, current_path),
        }
    }
}
