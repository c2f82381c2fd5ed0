//! rconbot - reactive automation for Source-engine game servers
//!
//! Connects to a game server over RCON, tells it to forward its log
//! stream here, and fans every log line out to the configured plugins.
//! Plugins may issue RCON commands while handling an event.

mod config;
mod dispatch;
mod logs;
mod plugins;
mod protocol;
mod rcon;

use std::io::Write as _;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use dispatch::Dispatcher;
use logs::LogListener;
use rcon::RconClient;

/// Timeout for opening the RCON connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// rconbot - reactive automation for Source-engine game servers
#[derive(Parser)]
#[command(name = "rconbot")]
#[command(version = "0.1.0")]
#[command(about = "React to game server log events with RCON commands", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot host: connect, authenticate, and process log events
    Run,

    /// Open an interactive RCON console on a server
    Console {
        /// Server address, HOST or HOST:PORT
        address: String,

        /// RCON password (prompted for when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Show current configuration
    Config {
        /// Generate a sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for the generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&config.server.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Console { address, password } => run_console(&address, password).await,
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config();
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}

/// Run the bot host
async fn run_bot(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let rcon = RconClient::connect(&config.rcon.host, config.rcon.port, CONNECT_TIMEOUT)
        .await
        .with_context(|| {
            format!(
                "cannot connect to server via RCON at {}:{}",
                config.rcon.host, config.rcon.port
            )
        })?;
    rcon.authenticate(&config.rcon.password)
        .await
        .context("RCON authentication failed")?;

    // The game server has to be told to forward its log stream to us.
    let our_ip = rcon.local_addr().ip();
    tracing::info!(
        "Adding logging handle to our server at {}:{}",
        our_ip,
        config.log.port
    );
    rcon.execute_command("logaddress_delall").await?;
    rcon.execute_command(&format!("logaddress_add {}:{}", our_ip, config.log.port))
        .await?;
    rcon.execute_command("log on").await?;

    let listener = LogListener::bind(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        config.log.port,
    ))
    .await?;
    let stop = listener.stop_handle();

    let rcon = Arc::new(rcon);
    let mut dispatcher = Dispatcher::new();
    for name in &config.server.plugins {
        tracing::info!("Launching plugin {}", name);
        plugins::init_plugin(name, &rcon, &mut dispatcher, &config.plugin_config(name))
            .with_context(|| format!("cannot initialize plugin '{}'", name))?;
    }
    tracing::info!("Initialized {} subscriber(s)", dispatcher.len());

    // Ctrl-C injects the poison datagram; the loop below then delivers the
    // shutdown event to every subscriber and returns.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            if let Err(err) = stop.stop().await {
                tracing::error!("Failed to stop log listener: {}", err);
            }
        }
    });

    tracing::info!("Starting log collector");
    listener.run(&mut dispatcher).await?;
    tracing::info!("Stopped log collector");

    rcon.close().await?;
    Ok(())
}

/// Run the interactive console
async fn run_console(address: &str, password: Option<String>) -> anyhow::Result<()> {
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().context("invalid port in address")?),
        None => (address, protocol::DEFAULT_RCON_PORT),
    };

    let client = RconClient::connect(host, port, CONNECT_TIMEOUT)
        .await
        .with_context(|| format!("could not connect to RCON on {}", address))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let password = match password {
        Some(password) => password,
        None => prompt(&mut lines, "Password: ").await?,
    };

    if client.authenticate(&password).await.is_err() {
        client.close().await?;
        anyhow::bail!("could not connect - password not accepted");
    }

    loop {
        let line = prompt(&mut lines, "> ").await?;
        match line.trim() {
            "" => {}
            ".disconnect" => break,
            ".help" => {
                println!(".help - Print this page");
                println!(".disconnect - Exit this session");
            }
            command => {
                let output = client.execute_command(command).await?;
                print!("{}", String::from_utf8_lossy(&output));
                std::io::stdout().flush()?;
            }
        }
    }

    client.close().await?;
    Ok(())
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> anyhow::Result<String> {
    print!("{}", text);
    std::io::stdout().flush()?;
    lines
        .next_line()
        .await?
        .context("end of input")
}
