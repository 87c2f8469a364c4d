use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use integration_hub::config::HubConfig;
use integration_hub::integrations::{serve, IntegrationHub, LoggingHandler};
use integration_hub::logging::{init_logging, LogFormat, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "integration-hub")]
#[command(version)]
#[command(about = "Relay workflow data between third-party services and inbound webhooks")]
struct Cli {
    /// Suppress all output except errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to a TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Address to bind to (overrides the configuration)
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides the configuration)
        #[arg(long, short)]
        port: Option<u16>,
    },
    /// Print the effective configuration with credentials redacted
    ShowConfig {
        /// Path to a TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, bind, port } => {
            let format = if cli.json_logs {
                LogFormat::Json
            } else {
                LogFormat::Text
            };
            init_logging(LoggingConfig::from_verbosity(cli.verbose, cli.quiet).with_format(format));

            let mut config = match HubConfig::load(config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load configuration");
                    eprintln!("Error: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            };
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let hub = Arc::new(build_hub(&config).await);
            serve(hub, config.server).await.map_err(|e| {
                tracing::error!(error = %e, "Integration hub stopped");
                e
            })?;
        }
        Commands::ShowConfig { config } => {
            let config = match HubConfig::load(config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            };
            print!("{}", toml::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Hub with the configured integrations and webhook endpoints registered
async fn build_hub(config: &HubConfig) -> IntegrationHub {
    let hub = IntegrationHub::new().with_endpoints(config.endpoints.clone());
    let endpoints = hub.endpoints();
    tracing::debug!(
        linear = %endpoints.linear,
        github = %endpoints.github,
        supabase = %endpoints.supabase,
        airtable = %endpoints.airtable,
        notion = %endpoints.notion,
        "Provider endpoints"
    );

    for integration in &config.integrations {
        hub.register(integration.clone()).await;
    }
    for endpoint in &config.webhook_endpoints {
        hub.register_webhook(endpoint.clone(), Arc::new(LoggingHandler::new(endpoint.clone())))
            .await;
    }

    hub
}
