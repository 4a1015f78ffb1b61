//! CLI module - Command-line interface for Repurposely
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Repurposely - content repurposing backend
/// Token-metered text and image generation with Stripe billing
#[derive(Parser)]
#[command(name = "repurposely")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP API and the token reset job (default)
    #[command(alias = "daemon")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Apply pending database migrations and exit
    Migrate,

    /// Run the monthly token rollover once
    ResetTokens,

    /// Force a user onto a plan and refill their tokens
    FixSubscription {
        /// User id from the auth provider
        user_id: String,
        /// Target tier (free, pro, enterprise)
        #[arg(long, default_value = "pro")]
        tier: String,
    },
}

pub use commands::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::parse_from(["repurposely"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn fix_subscription_defaults_to_pro() {
        let cli = Cli::parse_from(["repurposely", "fix-subscription", "user-1"]);
        assert_eq!(
            cli.command,
            Some(Commands::FixSubscription {
                user_id: "user-1".to_string(),
                tier: "pro".to_string(),
            })
        );
    }

    #[test]
    fn reset_tokens_is_kebab_case() {
        let cli = Cli::parse_from(["repurposely", "reset-tokens"]);
        assert_eq!(cli.command, Some(Commands::ResetTokens));
    }
}
