//! Pitwall CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Talk to the race engineer (interactive or single message)
//! - `prompt`  — Print the prompt a message would produce, without a model
//! - `config`  — Print the default or effective configuration
//! - `doctor`  — Check that the configured backend answers

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "pitwall",
    about = "Pitwall — race-engineer NPC dialogue engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.pitwall/config.toml
    #[arg(short, long, global = true, env = "PITWALL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the race engineer
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Player display name
        #[arg(short, long, default_value = "driver")]
        name: String,

        /// Player id used in logs
        #[arg(long, default_value_t = 1)]
        player_id: u64,
    },

    /// Print the prompt for a message without calling a model
    Prompt {
        /// The player's utterance
        #[arg(short, long)]
        message: String,

        /// Player display name
        #[arg(short, long, default_value = "driver")]
        name: String,

        /// Sentiment label; tagged from the message when omitted
        #[arg(short, long)]
        sentiment: Option<String>,

        #[command(flatten)]
        build: commands::prompt::BuildArgs,
    },

    /// Show configuration
    Config {
        /// Print the effective configuration (secrets redacted) instead of the defaults
        #[arg(long)]
        show: bool,
    },

    /// Diagnose the configured backend
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Chat {
            message,
            name,
            player_id,
        } => commands::chat::run(config_path, message, name, player_id).await?,
        Commands::Prompt {
            message,
            name,
            sentiment,
            build,
        } => commands::prompt::run(config_path, message, name, sentiment, build).await?,
        Commands::Config { show } => commands::config_cmd::run(config_path, show).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_defaults() {
        let cli = Cli::try_parse_from(["pitwall", "chat"]).unwrap();
        match cli.command {
            Commands::Chat {
                message,
                name,
                player_id,
            } => {
                assert!(message.is_none());
                assert_eq!(name, "driver");
                assert_eq!(player_id, 1);
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pitwall", "doctor", "-v", "--config", "/tmp/p.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
    }

    #[test]
    fn prompt_takes_build_flags() {
        let cli = Cli::try_parse_from([
            "pitwall",
            "prompt",
            "-m",
            "which engine?",
            "--chassis",
            "Standard Monocoque",
            "--front-wing",
            "High Lift",
        ])
        .unwrap();
        match cli.command {
            Commands::Prompt { message, build, .. } => {
                assert_eq!(message, "which engine?");
                let build = build.into_build().unwrap();
                assert_eq!(build.chassis.as_deref(), Some("Standard Monocoque"));
                assert_eq!(build.front_wing.as_deref(), Some("High Lift"));
                assert!(build.engine.is_none());
            }
            _ => panic!("expected prompt"),
        }
    }

    #[test]
    fn prompt_requires_message() {
        assert!(Cli::try_parse_from(["pitwall", "prompt"]).is_err());
    }
}
