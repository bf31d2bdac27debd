//! Domain models for the session client.

pub mod forms;
pub mod session;
pub mod user;

pub use forms::{
    Credentials, CustomerRegistration, PasswordResetConfirmation, PharmacyRegistration,
    RegistrationForm, RegistrationResult, RegistrationRole, ResetTokenStatus, SocialLogin,
    SocialProvider,
};
pub use session::{Session, SessionState};
pub use user::{ProfilePatch, UserProfile};
