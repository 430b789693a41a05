//! UniVendor CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! uv-cli migrate
//!
//! # Create or promote a super admin
//! uv-cli admin create -e admin@example.com -f Ada -l Lovelace
//!
//! # Insert default plans and global categories (safe to repeat)
//! uv-cli seed
//!
//! # Mark SSL active on every live domain
//! uv-cli domains check-ssl
//!
//! # Delete expired login codes
//! uv-cli otp purge
//! ```
//!
//! # Environment Variables
//!
//! - `UNIVENDOR_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "uv-cli")]
#[command(author, version, about = "UniVendor CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage super admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Insert default subscription plans and global categories
    Seed,
    /// Storefront domain maintenance
    Domains {
        #[command(subcommand)]
        action: DomainsAction,
    },
    /// Login code maintenance
    Otp {
        #[command(subcommand)]
        action: OtpAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a super admin, or promote an existing account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        first_name: Option<String>,

        /// Last name
        #[arg(short, long)]
        last_name: Option<String>,
    },
}

#[derive(Subcommand)]
enum DomainsAction {
    /// Mark SSL active on every active, verified domain
    CheckSsl,
}

#[derive(Subcommand)]
enum OtpAction {
    /// Delete expired login codes
    Purge,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                first_name,
                last_name,
            } => {
                commands::admin::create(&email, first_name.as_deref(), last_name.as_deref())
                    .await?;
            }
        },
        Commands::Seed => commands::seed::run().await?,
        Commands::Domains { action } => match action {
            DomainsAction::CheckSsl => commands::maintenance::check_ssl().await?,
        },
        Commands::Otp { action } => match action {
            OtpAction::Purge => commands::maintenance::purge_otps().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_admin_create_args() {
        let cli = Cli::try_parse_from([
            "uv-cli", "admin", "create", "-e", "ops@example.com", "-f", "Ada",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Admin {
                action: AdminAction::Create { first_name: Some(_), last_name: None, .. }
            })
        ));
    }
}
