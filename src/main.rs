use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use doorlockd::agent;
use doorlockd::utils;

#[derive(Parser)]
#[command(name = "doorlockd", version, about = "Token-gated door lock daemon")]
struct AppCli {
    /// Config file path
    #[arg(short, long, default_value = "config.json", global = true)]
    config: String,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the config file and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init();

    let args = AppCli::parse();

    match args.command {
        Some(Commands::CheckConfig) => {
            let config = agent::config::Config::from_file(&args.config)?;
            info!(ldap_uri = %config.ldap_uri, "config is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        None => {
            // Default: run the door lock daemon
            agent::daemon::run(args.config).await?;
            info!("teardown complete");
            // Don't wait for the stdin reader thread on runtime drop.
            std::process::exit(0);
        }
    }

    Ok(())
}
