//! uniproxy-cli: query a panel from the command line.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use uniproxy::{Client, Config, FetchOutcome, NodeInfo};

/// Poll interval used when the panel does not set one.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "uniproxy-cli")]
#[command(version = "0.1.0")]
#[command(about = "Fetch node configuration and users from a UniProxy panel", long_about = None)]
struct Cli {
    #[command(flatten)]
    panel: PanelArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PanelArgs {
    /// YAML config file (overrides the individual flags)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Panel base URL
    #[arg(long, required_unless_present = "config")]
    api_host: Option<String>,

    /// Panel communication token
    #[arg(long, required_unless_present = "config")]
    key: Option<String>,

    /// Node id
    #[arg(long, required_unless_present = "config")]
    node_id: Option<i64>,

    /// Node type (vmess, vless, trojan, shadowsocks, tuic, hysteria, hysteria2, anytls)
    #[arg(long, required_unless_present = "config")]
    node_type: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 0)]
    timeout: u64,

    /// Local source IP for requests
    #[arg(long)]
    send_ip: Option<String>,

    /// Log every request
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and print the node configuration
    Node,

    /// Fetch and print the user list
    Users {
        /// Print every user
        #[arg(short, long)]
        verbose: bool,
    },

    /// Poll node config and users until interrupted
    Watch {
        /// Poll interval in seconds (defaults to the panel's pull interval)
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.panel)?;
    let client = Client::new(&config)?;

    match cli.command {
        Commands::Node => match client.get_node_info()? {
            FetchOutcome::Changed(node) => print_node(&node)?,
            FetchOutcome::Unchanged => println!("Node config not modified"),
        },
        Commands::Users { verbose } => {
            let users = client.get_user_list()?;
            println!("{} users", users.len());
            if verbose {
                for user in &users {
                    println!(
                        "  {:>6}  {}  speed_limit={} device_limit={}",
                        user.id, user.uuid, user.speed_limit, user.device_limit
                    );
                }
            }
        }
        Commands::Watch { interval } => watch(&client, interval.map(Duration::from_secs)),
    }

    Ok(())
}

fn load_config(args: PanelArgs) -> Result<Config, Box<dyn std::error::Error>> {
    if let Some(path) = args.config {
        return Ok(Config::from_yaml_file(path)?);
    }

    let mut config = Config::new(
        args.api_host.unwrap_or_default(),
        args.key.unwrap_or_default(),
        args.node_id.unwrap_or_default(),
        args.node_type.unwrap_or_default(),
    )
    .with_timeout(args.timeout)
    .with_debug(args.debug);
    if let Some(ip) = args.send_ip {
        config = config.with_send_ip(ip);
    }
    Ok(config)
}

fn print_node(node: &NodeInfo) -> Result<(), Box<dyn std::error::Error>> {
    let common = node.common();
    println!("Node {} ({})", node.id, node.node_type());
    println!("  host:          {}:{}", common.host, common.server_port);
    println!("  server name:   {}", common.server_name);
    println!("  security:      {:?}", node.security);
    println!("  push interval: {}s", node.push_interval.as_secs());
    println!("  pull interval: {}s", node.pull_interval.as_secs());
    println!(
        "  block rules:   {} patterns, {} protocols",
        node.rules.regexp.len(),
        node.rules.protocol.len()
    );
    println!(
        "  dns:           {} servers, raw override: {}",
        node.raw_dns.dns_map.len(),
        node.raw_dns.dns_json.is_some()
    );
    println!("{}", serde_json::to_string_pretty(&node.config)?);
    Ok(())
}

fn watch<T: uniproxy::Transport>(client: &Client<T>, fixed_interval: Option<Duration>) {
    let mut interval = fixed_interval.unwrap_or(DEFAULT_POLL_INTERVAL);

    loop {
        match client.get_node_info() {
            Ok(FetchOutcome::Changed(node)) => {
                log::info!(
                    "Node config updated: {} on port {}",
                    node.node_type(),
                    node.common().server_port
                );
                if fixed_interval.is_none() && !node.pull_interval.is_zero() {
                    interval = node.pull_interval;
                }
            }
            Ok(FetchOutcome::Unchanged) => log::debug!("Node config unchanged"),
            Err(e) => log::error!("Failed to fetch node config: {}", e),
        }

        match client.get_user_list() {
            Ok(users) => log::info!("{} users", users.len()),
            Err(e) => log::error!("Failed to fetch users: {}", e),
        }

        thread::sleep(interval);
    }
}
