//! Pharmadesk CLI - sign in, inspect, and end sessions from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password may also come from PHARMADESK_PASSWORD)
//! pd-cli login -e customer@example.com -p secret
//!
//! # Who is signed in, and what the session looks like
//! pd-cli whoami
//! pd-cli status
//!
//! # Check whether a page would render for the current session
//! pd-cli guard /pharmacist/orders --role pharmacist
//!
//! # End the session
//! pd-cli logout
//! ```
//!
//! # Commands
//!
//! - `login`, `social-login`, `logout` - Start or end a session
//! - `status`, `whoami`, `verify` - Inspect the current session
//! - `register customer|pharmacy` - Create an account
//! - `password-reset request|verify|confirm` - Reset a forgotten password
//! - `guard` - Evaluate a route guard against the current session

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::{Parser, Subcommand};
use pharmadesk_core::UserRole;
use pharmadesk_session::SessionConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

use commands::CliError;
use commands::register::{CustomerArgs, PharmacyArgs};

#[derive(Parser)]
#[command(name = "pd-cli")]
#[command(author, version, about = "Pharmadesk session client")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "PHARMADESK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Page to continue to after signing in (a path or a login URL)
        #[arg(long)]
        redirect: Option<String>,
    },
    /// Sign in with a Google ID token
    SocialLogin {
        /// ID token issued by Google Sign-In
        #[arg(long, env = "PHARMADESK_GOOGLE_ID_TOKEN", hide_env_values = true)]
        id_token: String,
    },
    /// End the current session
    Logout,
    /// Show the full session state
    Status,
    /// Show the signed-in user
    Whoami,
    /// Check the stored token against the server
    Verify,
    /// Create an account
    Register {
        #[command(subcommand)]
        form: RegisterForm,
    },
    /// Reset a forgotten password
    PasswordReset {
        #[command(subcommand)]
        action: PasswordResetAction,
    },
    /// Evaluate a route guard for a page
    Guard {
        /// Page path, including any query string
        path: String,

        /// Role allowed on the page (repeatable; none means any signed-in user)
        #[arg(long = "role", value_name = "ROLE")]
        roles: Vec<UserRole>,
    },
}

#[derive(Subcommand)]
enum RegisterForm {
    /// Register a customer account
    Customer(CustomerArgs),
    /// Register a pharmacy and its administrator
    Pharmacy(PharmacyArgs),
}

#[derive(Subcommand)]
enum PasswordResetAction {
    /// Email a reset link
    Request {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Check a reset token from an emailed link
    Verify {
        /// Reset token
        token: String,
    },
    /// Set a new password
    Confirm {
        /// Reset token
        token: String,

        /// New password
        #[arg(long, env = "PHARMADESK_NEW_PASSWORD", hide_env_values = true)]
        password: String,

        /// New password again
        #[arg(long)]
        confirm_password: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

/// Logs default to info for our crates when `RUST_LOG` is not set.
fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pharmadesk=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = SessionConfig::from_env()?;
    let manager = commands::start(&config).await?;

    match cli.command {
        Commands::Login {
            email,
            password,
            redirect,
        } => commands::auth::login(&manager, &email, password, redirect.as_deref()).await?,
        Commands::SocialLogin { id_token } => {
            commands::auth::social_login(&manager, &config, id_token).await?;
        }
        Commands::Logout => commands::auth::logout(&manager).await,
        Commands::Status => commands::auth::status(&manager, &config),
        Commands::Whoami => commands::auth::whoami(&manager),
        Commands::Verify => commands::auth::verify(&manager).await?,
        Commands::Register { form } => match form {
            RegisterForm::Customer(args) => commands::register::customer(&manager, args).await?,
            RegisterForm::Pharmacy(args) => commands::register::pharmacy(&manager, args).await?,
        },
        Commands::PasswordReset { action } => match action {
            PasswordResetAction::Request { email } => {
                commands::password_reset::request(&manager, &email).await?;
            }
            PasswordResetAction::Verify { token } => {
                commands::password_reset::verify(&manager, &token).await?;
            }
            PasswordResetAction::Confirm {
                token,
                password,
                confirm_password,
            } => {
                commands::password_reset::confirm(&manager, token, password, confirm_password)
                    .await?;
            }
        },
        Commands::Guard { path, roles } => commands::guard::evaluate(&manager, &path, roles),
    }
    Ok(())
}
