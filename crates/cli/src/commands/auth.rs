//! Sign-in, sign-out, and session inspection commands.

use pharmadesk_session::{Credentials, SessionConfig, SocialLogin, UserProfile, routes};
use tracing::info;

use super::{CliError, Manager};

/// Sign in with email and password, then print where to continue.
///
/// `redirect` may be a plain path or a login URL carrying `?redirect=`, as
/// printed by the `guard` command.
///
/// # Errors
///
/// Returns `CliError` if the email is malformed or sign-in fails.
pub async fn login(
    manager: &Manager,
    email: &str,
    password: String,
    redirect: Option<&str>,
) -> Result<(), CliError> {
    let credentials = Credentials::new(email, password)?;
    let user = manager.login(credentials).await?;

    let requested = redirect.map(|raw| {
        raw.split_once('?')
            .and_then(|(_, query)| routes::redirect_from_query(query))
            .unwrap_or_else(|| raw.to_string())
    });
    print_signed_in(&user, requested.as_deref());
    Ok(())
}

/// Sign in with a Google ID token.
///
/// # Errors
///
/// Returns `CliError::Input` when Google sign-in is not configured, or the
/// session error if the exchange fails.
pub async fn social_login(
    manager: &Manager,
    config: &SessionConfig,
    id_token: String,
) -> Result<(), CliError> {
    let Some(client_id) = config.google_client_id.as_deref() else {
        return Err(CliError::Input(
            "Google sign-in is not configured (set PHARMADESK_GOOGLE_CLIENT_ID)".to_string(),
        ));
    };
    info!(client_id, "Exchanging Google ID token");

    let user = manager.social_login(SocialLogin::google(id_token)).await?;
    print_signed_in(&user, None);
    Ok(())
}

/// End the session. Never fails.
pub async fn logout(manager: &Manager) {
    manager.logout().await;
    println!("Signed out");
}

/// Print every field of the current session.
pub fn status(manager: &Manager, config: &SessionConfig) {
    let session = manager.snapshot();

    println!("State:        {:?}", session.state);
    println!("Initialized:  {}", session.initialized);
    match &session.user {
        Some(user) => println!("User:         {} <{}>", user.display_name(), user.email),
        None => println!("User:         -"),
    }
    if let Some(role) = session.role() {
        println!("Role:         {role}");
    }
    if let Some(error) = &session.error {
        println!("Last error:   {error}");
    }
    println!("API:          {}", config.api_base_url);
    println!(
        "Google login: {}",
        if config.google_client_id.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
}

/// Print the signed-in user, if any.
pub fn whoami(manager: &Manager) {
    match manager.user().filter(|_| manager.is_authenticated()) {
        Some(user) => println!("{} <{}> ({})", user.display_name(), user.email, user.user_type),
        None if manager.is_authenticated() => println!("Signed in (profile not cached)"),
        None => println!("Not signed in"),
    }
}

/// Check the stored token against the server.
///
/// # Errors
///
/// Returns the session error when there is no session or the token was
/// rejected (in which case the session has been ended).
pub async fn verify(manager: &Manager) -> Result<(), CliError> {
    let user = manager.verify_session().await?;
    println!("Session is valid for {} ({})", user.display_name(), user.user_type);
    Ok(())
}

fn print_signed_in(user: &UserProfile, redirect: Option<&str>) {
    println!("Signed in as {} ({})", user.display_name(), user.user_type);
    if let Some(pharmacy) = &user.pharmacy_name {
        println!("Pharmacy: {pharmacy}");
    }
    println!(
        "Continue to {}",
        routes::post_login_target(user.user_type, redirect)
    );
}
