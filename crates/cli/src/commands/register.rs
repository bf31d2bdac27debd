//! Account registration commands.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use clap::Args;
use pharmadesk_core::{Email, UserRole};
use pharmadesk_session::{
    CustomerRegistration, PharmacyRegistration, RegistrationForm, RegistrationResult, routes,
};
use secrecy::SecretString;

use super::{CliError, Manager};

/// Customer sign-up fields.
#[derive(Debug, Args)]
pub struct CustomerArgs {
    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,

    #[arg(short, long)]
    email: String,

    #[arg(long)]
    phone: String,

    #[arg(short, long, env = "PHARMADESK_PASSWORD", hide_env_values = true)]
    password: String,

    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    date_of_birth: Option<NaiveDate>,

    /// Accept the terms of service
    #[arg(long)]
    accept_terms: bool,
}

/// Pharmacy sign-up fields.
#[derive(Debug, Args)]
pub struct PharmacyArgs {
    /// Pharmacy name
    #[arg(long)]
    name: String,

    #[arg(long)]
    address: String,

    #[arg(long)]
    phone_number: String,

    /// Pharmacy contact email
    #[arg(long)]
    email: String,

    #[arg(long)]
    license_number: String,

    /// License expiry date (YYYY-MM-DD)
    #[arg(long)]
    license_expiry: Option<NaiveDate>,

    /// Opening hours as `day=hours`, e.g. `monday=08:00-20:00` (repeatable)
    #[arg(long = "hours", value_name = "DAY=HOURS")]
    hours: Vec<String>,

    /// Service offered (repeatable)
    #[arg(long = "service", value_name = "SERVICE")]
    services: Vec<String>,

    /// Offer delivery
    #[arg(long)]
    delivery: bool,

    /// Delivery radius in kilometres
    #[arg(long, requires = "delivery")]
    delivery_radius: Option<u32>,

    #[arg(long)]
    admin_first_name: String,

    #[arg(long)]
    admin_last_name: String,

    #[arg(long)]
    admin_email: String,

    #[arg(long, env = "PHARMADESK_PASSWORD", hide_env_values = true)]
    admin_password: String,
}

/// Register a customer account.
///
/// # Errors
///
/// Returns `CliError` if an email is malformed, the terms were not accepted,
/// or registration fails.
pub async fn customer(manager: &Manager, args: CustomerArgs) -> Result<(), CliError> {
    if !args.accept_terms {
        return Err(CliError::Input(
            "You must accept the terms of service (--accept-terms)".to_string(),
        ));
    }

    let form = RegistrationForm::Customer(CustomerRegistration {
        first_name: args.first_name,
        last_name: args.last_name,
        email: Email::parse(&args.email)?,
        phone: args.phone,
        password: SecretString::from(args.password),
        date_of_birth: args.date_of_birth,
        terms_accepted: args.accept_terms,
    });

    let result = manager.register(form).await?;
    print_result(&result, UserRole::Customer);
    Ok(())
}

/// Register a pharmacy. The account stays inactive until approved.
///
/// # Errors
///
/// Returns `CliError` if an email or opening-hours entry is malformed, or
/// registration fails.
pub async fn pharmacy(manager: &Manager, args: PharmacyArgs) -> Result<(), CliError> {
    let form = RegistrationForm::Pharmacy(PharmacyRegistration {
        name: args.name,
        address: args.address,
        phone_number: args.phone_number,
        email: Email::parse(&args.email)?,
        license_number: args.license_number,
        license_expiry_date: args.license_expiry,
        operating_hours: parse_hours(&args.hours)?,
        services: args.services,
        delivery_available: args.delivery,
        delivery_radius_km: args.delivery_radius,
        admin_first_name: args.admin_first_name,
        admin_last_name: args.admin_last_name,
        admin_email: Email::parse(&args.admin_email)?,
        admin_password: SecretString::from(args.admin_password),
    });

    let result = manager.register(form).await?;
    print_result(&result, UserRole::PharmacyAdmin);
    Ok(())
}

/// Parse `day=hours` entries into a map keyed by lowercase day.
fn parse_hours(entries: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    entries
        .iter()
        .map(|entry| {
            let (day, hours) = entry
                .split_once('=')
                .map(|(d, h)| (d.trim(), h.trim()))
                .filter(|(d, h)| !d.is_empty() && !h.is_empty())
                .ok_or_else(|| CliError::Input(format!("expected DAY=HOURS, got {entry:?}")))?;
            Ok((day.to_ascii_lowercase(), hours.to_string()))
        })
        .collect()
}

fn print_result(result: &RegistrationResult, role: UserRole) {
    if result.authenticated {
        match &result.user {
            Some(user) => {
                println!("Account created. Signed in as {}", user.display_name());
                println!("Continue to {}", routes::role_root(user.user_type));
            }
            None => println!("Account created. Continue to {}", routes::role_root(role)),
        }
    } else {
        println!("Registration submitted");
        if let Some(message) = &result.message {
            println!("{message}");
        }
    }
}
