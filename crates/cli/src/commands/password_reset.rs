//! Forgotten-password commands.

use pharmadesk_session::PasswordResetConfirmation;
use secrecy::SecretString;

use super::{CliError, Manager};

/// Ask for a reset link to be emailed.
///
/// # Errors
///
/// Returns `CliError` if the email is malformed or the request fails.
pub async fn request(manager: &Manager, email: &str) -> Result<(), CliError> {
    let message = manager.request_password_reset(email).await?;
    println!(
        "{}",
        message.unwrap_or_else(|| "If the account exists, a reset link is on its way".to_string())
    );
    Ok(())
}

/// Check a reset token.
///
/// # Errors
///
/// Returns `CliError::Input` when the token is not usable, or the session
/// error if the check fails.
pub async fn verify(manager: &Manager, token: &str) -> Result<(), CliError> {
    let status = manager.verify_reset_token(token).await?;
    if status.valid {
        println!("Reset link is valid");
        Ok(())
    } else {
        Err(CliError::Input(status.message.unwrap_or_else(|| {
            "Reset link is invalid or has expired".to_string()
        })))
    }
}

/// Set a new password.
///
/// # Errors
///
/// Returns `CliError` if the passwords differ or the backend rejects the reset.
pub async fn confirm(
    manager: &Manager,
    token: String,
    password: String,
    confirm_password: String,
) -> Result<(), CliError> {
    let message = manager
        .confirm_password_reset(PasswordResetConfirmation {
            token,
            new_password: SecretString::from(password),
            confirm_password: SecretString::from(confirm_password),
        })
        .await?;
    println!(
        "{}",
        message.unwrap_or_else(|| "Password updated. You can now log in".to_string())
    );
    Ok(())
}
