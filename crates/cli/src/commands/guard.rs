//! Route guard command.

use pharmadesk_core::UserRole;
use pharmadesk_session::{GuardDecision, Requirement, RouteGuard};

use super::Manager;

/// Build the requirement for a page from the roles allowed on it.
fn requirement(roles: Vec<UserRole>) -> Requirement {
    let mut unique: Vec<UserRole> = Vec::with_capacity(roles.len());
    for role in roles {
        if !unique.contains(&role) {
            unique.push(role);
        }
    }
    match unique.as_slice() {
        [] => Requirement::Authenticated,
        [role] => Requirement::Role(*role),
        _ => Requirement::AnyRole(unique),
    }
}

/// Print the decision for visiting `path` with the current session.
pub fn evaluate(manager: &Manager, path: &str, roles: Vec<UserRole>) {
    let guard = RouteGuard::new(requirement(roles));
    match guard.evaluate(&manager.snapshot(), path) {
        GuardDecision::Pending => println!("pending"),
        GuardDecision::Allow => println!("allow"),
        GuardDecision::Redirect { to } => println!("redirect {to}"),
    }
}
