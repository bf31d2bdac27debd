//! Route paths and post-login navigation.

use pharmadesk_core::UserRole;

/// Public home page.
pub const HOME: &str = "/";

/// Sign-in page for customers and pharmacy staff.
pub const LOGIN: &str = "/login";

/// Sign-in page for platform administrators.
pub const ADMIN_LOGIN: &str = "/admin/login";

/// Query parameter carrying the page to return to after sign-in.
pub const REDIRECT_PARAM: &str = "redirect";

/// Root of the section each role works in. Also the role's dashboard.
#[must_use]
pub const fn role_root(role: UserRole) -> &'static str {
    match role {
        UserRole::Customer => "/customer",
        UserRole::PharmacyAdmin => "/pharmacy",
        UserRole::Pharmacist => "/pharmacist",
        UserRole::Admin => "/admin",
    }
}

/// Login page for a section: administrators have their own.
#[must_use]
pub const fn login_page(admin: bool) -> &'static str {
    if admin { ADMIN_LOGIN } else { LOGIN }
}

/// `login` with `?redirect=` set to the percent-encoded `return_to`.
#[must_use]
pub fn login_url(login: &str, return_to: &str) -> String {
    format!(
        "{login}?{REDIRECT_PARAM}={}",
        urlencoding::encode(return_to)
    )
}

/// Decoded `redirect` parameter from a query string (with or without `?`).
#[must_use]
pub fn redirect_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .find(|(key, _)| key == REDIRECT_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Whether `path` is a same-site absolute path.
#[must_use]
pub fn is_internal_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

/// Whether `path` lies inside the section rooted at `root`.
fn within(path: &str, root: &str) -> bool {
    path.strip_prefix(root)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
}

/// Where to send a user right after signing in.
///
/// A requested `redirect` is honoured only when it is an internal path inside
/// the role's own section; anything else lands on the role's dashboard.
#[must_use]
pub fn post_login_target(role: UserRole, redirect: Option<&str>) -> String {
    let root = role_root(role);
    match redirect {
        Some(path) if is_internal_path(path) && within(path, root) => path.to_string(),
        _ => root.to_string(),
    }
}
