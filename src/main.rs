//! Push Relay CLI - register browser push subscriptions and broadcast to them.
//!
//! This is the main binary entry point. See the `push_relay` library for
//! the core functionality.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use push_relay::registry::FileRegistry;
use push_relay::{commands, Config, PushRelay, Reply};

// CLI
#[derive(Parser)]
#[command(name = "push-relay")]
#[command(version)]
#[command(about = "Verified web push subscriptions with broadcast fan-out")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a browser push subscription with a probe notification and store it
    Register {
        /// Subscription JSON file (reads stdin if omitted)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Send a notification to every stored subscription
    Broadcast {
        /// Notification title
        #[arg(long)]
        title: String,
        /// Notification body
        #[arg(long)]
        message: String,
        /// Icon URL (defaults to the configured icon)
        #[arg(long)]
        icon: Option<String>,
    },
    /// List stored subscriptions
    List,
    /// Generate a new VAPID keypair
    VapidKeys,
    /// Print the effective configuration
    Config {
        /// Also write it to config.json (the VAPID private key is never written)
        #[arg(long)]
        save: bool,
    },
}

fn init_logging() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();

    // Keep stdout clean for JSON replies
    if let Ok(path) = std::env::var("PUSH_RELAY_LOG_FILE") {
        let log_file = std::fs::File::create(&path)
            .map_err(|e| anyhow::anyhow!("Failed to create log file at {path}: {e}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(env_logger::Target::Stderr);
    }

    builder.init();
    Ok(())
}

fn finish(reply: &Reply) {
    println!("{}", reply.to_json());
    if !reply.success {
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Register { file } => {
            let relay = PushRelay::from_config(&Config::load()?)?;
            let reply = commands::register(&relay, file.as_deref()).await?;
            finish(&reply);
        }
        Commands::Broadcast {
            title,
            message,
            icon,
        } => {
            let relay = PushRelay::from_config(&Config::load()?)?;
            let reply = commands::broadcast(&relay, &title, &message, icon).await;
            finish(&reply);
        }
        Commands::List => {
            let registry = FileRegistry::open(Config::load()?.store_path()?)?;
            commands::list(&registry).await?;
        }
        Commands::VapidKeys => {
            commands::generate_vapid_keys()?;
        }
        Commands::Config { save } => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("store: {}", config.store_path()?.display());
            if save {
                let path = config.save()?;
                println!("saved: {}", path.display());
            }
        }
    }

    Ok(())
}
