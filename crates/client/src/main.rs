use anyhow::Context;
use clap::{Parser, Subcommand};
use registrar::{ClientConfig, RegisterOptions, Registrar, ResolveOptions};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Registry base URL (default: $REGISTRAR_URL or http://localhost:3030)
    #[arg(long)]
    registry: Option<String>,

    /// Scheme advertised in registered addresses (default: $REGISTRAR_PROTOCOL or http://)
    #[arg(long)]
    protocol: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an instance and send heartbeats until interrupted
    Register {
        service_name: String,
        /// Listening port (default: $REGISTRAR_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Instance identifier (default: random UUID)
        #[arg(long)]
        id: Option<String>,
    },
    /// Print the address of one instance of a service
    Resolve {
        service_name: String,
        /// Resolve the IPv6 address instead of IPv4
        #[arg(long)]
        ipv6: bool,
        /// Query timeout in milliseconds (default: 5000)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Run a command while registered
    Run {
        service_name: String,

        /// Port the command listens on (default: $REGISTRAR_PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Environment variable name for the port (default: PORT)
        #[arg(long, default_value = "PORT")]
        env_name: String,

        /// Command and arguments to execute
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = client_config(ClientConfig::from_env(), cli.registry, cli.protocol);

    match cli.command {
        Commands::Register {
            service_name,
            port,
            id,
        } => {
            let mut registrar = Registrar::new(config)?;
            let options = RegisterOptions {
                service_name: Some(service_name),
                port,
                identifier: id,
                protocol: None,
            };
            registrar.register(options).await?;
            println!("Registered {}", registrar.identifier());

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            info!("Shutting down");
            registrar.deregister().await?;
            println!("Deregistered {}", registrar.identifier());
        }
        Commands::Resolve {
            service_name,
            ipv6,
            timeout_ms,
        } => {
            let registrar = Registrar::new(config)?;
            let mut options = if ipv6 {
                ResolveOptions::ipv6()
            } else {
                ResolveOptions::ipv4()
            };
            if let Some(ms) = timeout_ms {
                options = options.with_timeout(Duration::from_millis(ms));
            }

            match registrar.resolve(&service_name, options).await {
                Ok(address) => println!("{}", address),
                Err(e) => {
                    error!(service = %service_name, error = %e, "Resolution failed");
                    std::process::exit(1);
                }
            }
        }
        Commands::Run {
            service_name,
            port,
            env_name,
            command,
        } => {
            let Some((cmd, args)) = command.split_first() else {
                anyhow::bail!("no command specified");
            };

            let mut registrar = Registrar::new(config)?;
            registrar
                .register(RegisterOptions {
                    service_name: Some(service_name.clone()),
                    port,
                    ..RegisterOptions::default()
                })
                .await?;
            let port = registrar.registration().port.unwrap_or_default();
            info!(service = %service_name, port, "Registered, starting command");

            let status = Command::new(cmd)
                .args(args)
                .env(&env_name, port.to_string())
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await;

            if let Err(e) = registrar.deregister().await {
                error!(error = %e, "Deregistration failed");
            }

            match status {
                Ok(s) if s.success() => {}
                Ok(s) => std::process::exit(s.code().unwrap_or(1)),
                Err(e) => {
                    error!(command = %cmd, error = %e, "Failed to run command");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Command-line flags take precedence over the environment.
fn client_config(
    mut config: ClientConfig,
    registry: Option<String>,
    protocol: Option<String>,
) -> ClientConfig {
    if let Some(registry) = registry {
        config.registry_url = registry;
    }
    if let Some(protocol) = protocol {
        config = config.with_protocol(protocol);
    }
    config
}
