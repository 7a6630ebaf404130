mod app;
mod ask_commands;
mod config_commands;
mod session_commands;
mod slack_commands;
mod telegram_commands;
mod terminal;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "relay", about = "Relay: chat front-ends for a remote agent engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of discovering `relay.{toml,yaml,yml,json}`.
    #[arg(long, global = true, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot (long polling).
    Telegram,
    /// Run the Slack app (Socket Mode).
    Slack,
    /// Send one message and print the agent's answer.
    Ask(ask_commands::AskArgs),
    /// Session administration.
    Sessions {
        #[command(subcommand)]
        action: session_commands::SessionAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "relay starting");

    let explicit = cli.config.as_deref();
    match cli.command {
        Commands::Config { action } => config_commands::handle_config(action, explicit),
        Commands::Telegram => {
            let config = app::load_config(explicit)?;
            telegram_commands::run(&config).await
        },
        Commands::Slack => {
            let config = app::load_config(explicit)?;
            slack_commands::run(&config).await
        },
        Commands::Ask(args) => {
            let config = app::load_config(explicit)?;
            ask_commands::handle_ask(args, &config).await
        },
        Commands::Sessions { action } => {
            let config = app::load_config(explicit)?;
            session_commands::handle_sessions(action, &config).await
        },
    }
}
