use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod core;
mod daemon;
mod icons;
mod providers;
mod ui;

#[derive(Parser)]
#[command(name = "claude-tracker")]
#[command(author, version, about = "Tray monitor for Claude plan usage limits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the tray daemon
    Daemon,

    /// Fetch and show current usage
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask the running daemon to fetch now via D-Bus
    Refresh,

    /// Set the polling interval in seconds (minimum 30)
    Interval {
        seconds: u64,
    },

    /// Manage starting the daemon at login
    Autostart {
        #[command(subcommand)]
        action: cli::autostart::AutostartAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging() {
    let debug = core::settings::Settings::config_path()
        .and_then(|path| core::settings::Settings::load_from(&path).ok())
        .is_some_and(|settings| settings.debug);
    let default_level = if debug { "debug" } else { "info" };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon => {
            init_logging();
            daemon::run().await
        }
        Commands::Status { json } => {
            init_logging();
            cli::status::run(json).await
        }
        Commands::Refresh => {
            init_logging();
            cli::refresh::run().await
        }
        Commands::Interval { seconds } => {
            init_logging();
            cli::interval::run(seconds)
        }
        Commands::Autostart { action } => {
            init_logging();
            cli::autostart::run(action)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_interval() {
        let cli = Cli::try_parse_from(["claude-tracker", "interval", "90"]).unwrap();
        assert!(matches!(cli.command, Commands::Interval { seconds: 90 }));
    }

    #[test]
    fn test_parse_autostart() {
        let cli = Cli::try_parse_from(["claude-tracker", "autostart", "enable"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Autostart {
                action: cli::autostart::AutostartAction::Enable
            }
        ));
        assert!(Cli::try_parse_from(["claude-tracker", "autostart"]).is_err());
    }
}
