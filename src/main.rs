use anyhow::Result;
use clap::{Arg, Command};
use eth_rpc_gateway::{Config, GatewayMcpServer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // MCP speaks over stdout, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = Command::new("rpc-gateway")
        .version(env!("CARGO_PKG_VERSION"))
        .about("MCP server exposing an EVM node's JSON-RPC interface")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("chain")
                .long("chain")
                .value_name("CHAIN")
                .help("Chain name used to sign transactions (eth_mainnet, bsc_mainnet)"),
        )
        .arg(
            Arg::new("node")
                .short('n')
                .long("node")
                .value_name("URL")
                .help("Primary node JSON-RPC URL"),
        )
        .arg(
            Arg::new("fallback-node")
                .long("fallback-node")
                .value_name("URL")
                .help("Preventive node used when the primary one fails"),
        )
        .arg(
            Arg::new("allow-writes")
                .long("allow-writes")
                .help("Allow write operations (transactions)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = Config::load_or_default(config_path).await;

    if let Some(chain) = matches.get_one::<String>("chain") {
        config.gateway.chain = chain.clone();
    }

    if let Some(node) = matches.get_one::<String>("node") {
        config.gateway.node = node.clone();
    }

    if let Some(fallback) = matches.get_one::<String>("fallback-node") {
        config.gateway.fallback_node = Some(fallback.clone());
    }

    if matches.get_flag("allow-writes") {
        config.security.allow_write_operations = true;
    }

    config.validate()?;

    info!("Primary node: {}", config.gateway.node);
    if let Some(fallback) = &config.gateway.fallback_node {
        info!("Preventive node: {}", fallback);
    }
    info!("Chain: {}", config.gateway.chain);
    info!(
        "Write operations allowed: {}",
        config.security.allow_write_operations
    );

    let server = GatewayMcpServer::new(config)?;

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
