use std::time::Duration;

use clap::Parser;
use medley_engine::{GatewayConfig, GatewayConfigBuilder, MediaGateway, ProxyConfig};
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod error;
mod utils;

use cli::{Args, Commands};
use commands::CommandExecutor;
use error::{AppError, Result};
use utils::{parse_headers, parse_size};

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet)?;

    info!(
        "Medley v{} - offline-first media caching gateway",
        env!("CARGO_PKG_VERSION")
    );

    let config = build_config(&args)?;
    let gateway = MediaGateway::new(config).await?;
    let executor = CommandExecutor::new(gateway);

    match args.command {
        Commands::Fetch {
            url,
            destination,
            output_file,
        } => {
            executor
                .fetch(&url, destination.into(), output_file.as_deref())
                .await
        }
        Commands::Pin { id, url } => executor.pin(&id, &url).await,
        Commands::Check { id } => executor.check(&id).await,
        Commands::Play { id, url } => executor.play(&id, url.as_deref()).await,
        Commands::Warm => executor.warm().await,
        Commands::Status => executor.status().await,
    }
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .map_err(|e| AppError::Initialization(e.to_string()))
}

fn build_config(args: &Args) -> Result<GatewayConfig> {
    let max_bytes = parse_size(&args.max_bytes)?;

    let mut builder = GatewayConfigBuilder::new()
        .with_max_entries(args.max_entries)
        .with_max_bytes(max_bytes)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_headers(parse_headers(&args.headers));

    if args.in_memory {
        builder = builder.in_memory();
    } else if let Some(dir) = &args.cache_dir {
        builder = builder.with_cache_dir(dir);
    }

    if let Some(origin) = &args.origin {
        builder = builder.with_origin(origin.clone());
    }

    if !args.shell_path.is_empty() {
        builder = builder.with_shell_manifest(args.shell_path.clone());
    }

    // Explicit proxy wins over system proxy settings
    if let Some(proxy_url) = &args.proxy {
        let mut proxy = ProxyConfig::new(proxy_url.clone());
        if let (Some(username), Some(password)) = (&args.proxy_username, &args.proxy_password) {
            proxy = proxy.with_basic_auth(username.clone(), password.clone());
        }
        info!(proxy_url = %proxy_url, "Using explicit proxy configuration");
        builder = builder.with_proxy(proxy);
    } else if args.use_system_proxy {
        info!("Using system proxy settings");
        builder = builder.with_system_proxy(true);
    }

    Ok(builder.build())
}
