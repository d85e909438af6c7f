//! dockhand - a small container-engine client.
//!
//! Logs go to stderr; command output goes to stdout.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{Cli, Commands};
use dockhand_core::{ClientConfig, EngineClient};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.debug {
        "dockhand_core=debug,dockhand_transport=debug,dockhand=debug"
    } else {
        "dockhand_core=warn,dockhand_transport=warn,dockhand=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = ClientConfig::from_env();
    if let Some(host) = cli.host {
        config.host = Some(host);
    }
    tracing::debug!(?config, "Configuration loaded");
    let client = EngineClient::new(config);

    match cli.command {
        Commands::Ping => commands::ping(&client).await,
        Commands::Version => commands::version(&client).await,
        Commands::Ps(args) => commands::ps(&client, args).await,
        Commands::Images => commands::images(&client).await,
        Commands::Pull(args) => commands::pull(client, args).await,
        Commands::Run(args) => commands::run(client, args).await,
        Commands::Logs(args) => commands::logs(&client, args).await,
        Commands::Cp(args) => commands::cp(&client, args).await,
        Commands::Login(args) => commands::login(&client, args).await,
    }
}
