//! Request payloads submitted by the session manager.
//!
//! Passwords are held as [`SecretString`] and only exposed while the JSON
//! body is being written.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};

use pharmadesk_core::Email;

use super::user::UserProfile;

// =============================================================================
// Sign-in
// =============================================================================

/// Email and password for `login`.
#[derive(Clone)]
pub struct Credentials {
    pub email: Email,
    pub password: SecretString,
}

impl Credentials {
    /// Build credentials from raw input, validating the email.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the email is malformed.
    pub fn new(
        email: &str,
        password: impl Into<String>,
    ) -> Result<Self, pharmadesk_core::EmailError> {
        Ok(Self {
            email: Email::parse(email)?,
            password: SecretString::from(password.into()),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Serialize for Credentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            email: &'a str,
            password: &'a str,
        }

        Wire {
            email: self.email.as_str(),
            password: self.password.expose_secret(),
        }
        .serialize(serializer)
    }
}

/// Third-party identity provider for `social_login`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
}

/// A third-party identity token to exchange for a session.
#[derive(Clone)]
pub struct SocialLogin {
    pub provider: SocialProvider,
    pub id_token: SecretString,
}

impl SocialLogin {
    /// Google ID token exchange.
    #[must_use]
    pub fn google(id_token: impl Into<String>) -> Self {
        Self {
            provider: SocialProvider::Google,
            id_token: SecretString::from(id_token.into()),
        }
    }
}

impl std::fmt::Debug for SocialLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialLogin")
            .field("provider", &self.provider)
            .field("id_token", &"[REDACTED]")
            .finish()
    }
}

impl Serialize for SocialLogin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            provider: SocialProvider,
            id_token: &'a str,
        }

        Wire {
            provider: self.provider,
            id_token: self.id_token.expose_secret(),
        }
        .serialize(serializer)
    }
}

// =============================================================================
// Registration
// =============================================================================

/// Customer sign-up form.
#[derive(Clone)]
pub struct CustomerRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: String,
    pub password: SecretString,
    pub date_of_birth: Option<NaiveDate>,
    pub terms_accepted: bool,
}

impl Serialize for CustomerRegistration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            first_name: &'a str,
            last_name: &'a str,
            email: &'a str,
            phone: &'a str,
            password: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            date_of_birth: Option<NaiveDate>,
            terms_accepted: bool,
        }

        Wire {
            first_name: self.first_name.trim(),
            last_name: self.last_name.trim(),
            email: self.email.as_str(),
            phone: self.phone.trim(),
            password: self.password.expose_secret(),
            date_of_birth: self.date_of_birth,
            terms_accepted: self.terms_accepted,
        }
        .serialize(serializer)
    }
}

/// Pharmacy sign-up form: the pharmacy plus its first administrator.
#[derive(Clone)]
pub struct PharmacyRegistration {
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub email: Email,
    pub license_number: String,
    pub license_expiry_date: Option<NaiveDate>,
    /// Opening hours keyed by lowercase weekday.
    pub operating_hours: BTreeMap<String, String>,
    pub services: Vec<String>,
    pub delivery_available: bool,
    pub delivery_radius_km: Option<u32>,
    pub admin_first_name: String,
    pub admin_last_name: String,
    pub admin_email: Email,
    pub admin_password: SecretString,
}

impl Serialize for PharmacyRegistration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            name: &'a str,
            address: &'a str,
            phone_number: &'a str,
            email: &'a str,
            license_number: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            license_expiry_date: Option<NaiveDate>,
            operating_hours: &'a BTreeMap<String, String>,
            services: &'a [String],
            delivery_available: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            delivery_radius: Option<u32>,
            admin_first_name: &'a str,
            admin_last_name: &'a str,
            admin_email: &'a str,
            admin_password: &'a str,
        }

        Wire {
            name: self.name.trim(),
            address: self.address.trim(),
            phone_number: self.phone_number.trim(),
            email: self.email.as_str(),
            license_number: self.license_number.trim(),
            license_expiry_date: self.license_expiry_date,
            operating_hours: &self.operating_hours,
            services: &self.services,
            delivery_available: self.delivery_available,
            delivery_radius: self.delivery_radius_km,
            admin_first_name: self.admin_first_name.trim(),
            admin_last_name: self.admin_last_name.trim(),
            admin_email: self.admin_email.as_str(),
            admin_password: self.admin_password.expose_secret(),
        }
        .serialize(serializer)
    }
}

/// Which registration flow a form belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationRole {
    Customer,
    Pharmacy,
}

impl RegistrationRole {
    /// Path segment of `/auth/register/{role}`.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Pharmacy => "pharmacy",
        }
    }
}

/// A role-specific registration submission.
#[derive(Clone, Serialize)]
#[serde(untagged)]
pub enum RegistrationForm {
    Customer(CustomerRegistration),
    Pharmacy(PharmacyRegistration),
}

impl RegistrationForm {
    /// The flow this form is submitted to.
    #[must_use]
    pub const fn role(&self) -> RegistrationRole {
        match self {
            Self::Customer(_) => RegistrationRole::Customer,
            Self::Pharmacy(_) => RegistrationRole::Pharmacy,
        }
    }

    /// Email the new account will sign in with.
    #[must_use]
    pub const fn login_email(&self) -> &Email {
        match self {
            Self::Customer(form) => &form.email,
            Self::Pharmacy(form) => &form.admin_email,
        }
    }
}

impl std::fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("role", &self.role())
            .field("email", self.login_email())
            .finish_non_exhaustive()
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResult {
    /// Profile returned by the backend, if any.
    pub user: Option<UserProfile>,
    /// Whether the registration also signed the user in.
    pub authenticated: bool,
    /// Backend message (e.g. "awaiting approval").
    pub message: Option<String>,
}

// =============================================================================
// Password reset
// =============================================================================

/// New password submission for a reset token.
#[derive(Clone)]
pub struct PasswordResetConfirmation {
    pub token: String,
    pub new_password: SecretString,
    pub confirm_password: SecretString,
}

impl PasswordResetConfirmation {
    /// Whether both password fields match.
    #[must_use]
    pub fn passwords_match(&self) -> bool {
        self.new_password.expose_secret() == self.confirm_password.expose_secret()
    }
}

impl Serialize for PasswordResetConfirmation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            token: &'a str,
            new_password: &'a str,
            confirm_password: &'a str,
        }

        Wire {
            token: self.token.trim(),
            new_password: self.new_password.expose_secret(),
            confirm_password: self.confirm_password.expose_secret(),
        }
        .serialize(serializer)
    }
}

/// Result of checking a reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetTokenStatus {
    pub valid: bool,
    pub message: Option<String>,
}
