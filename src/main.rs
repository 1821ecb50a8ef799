use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use rollcall::config::{
    random_node_id, AgentConfig, CoordinatorConfig, TlsConfig, DEFAULT_EXPIRE_SECS,
    DEFAULT_IO_TIMEOUT_SECS, DEFAULT_SERVER_NAME, DEFAULT_WAIT_SECS,
};
use rollcall::server::Coordinator;
use rollcall::shutdown::install_shutdown_handler;
use rollcall::worker::{facts, Agent, JobExecutor, NodeClient};

#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(version)]
#[command(about = "Check-in and job dispatch for a fleet of nodes")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the coordinator
    Server(ServerArgs),

    /// Run a node that checks in and executes its jobs
    Client(ClientArgs),
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Address to accept node connections on
    #[arg(long, default_value = "0.0.0.0:1337")]
    listen: SocketAddr,

    /// Redis URL or host:port. Without it, state is kept in memory.
    #[arg(long)]
    redis: Option<String>,

    /// Path to coordinator certificate chain (PEM format)
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Path to coordinator private key (PEM format)
    #[arg(long)]
    key: Option<PathBuf>,

    /// Allow serving plaintext when certificates are missing.
    /// Useful for development. NOT recommended for production.
    #[arg(long)]
    insecure: bool,

    /// Seconds a node stays registered without checking in
    #[arg(long, default_value_t = DEFAULT_EXPIRE_SECS)]
    expire: u64,

    /// Shared secret nodes must present. Generated if not set and none is stored.
    #[arg(long, env = "ROLLCALL_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// JSON file with per-family job templates
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Bound on a single read or write, in seconds
    #[arg(long, default_value_t = DEFAULT_IO_TIMEOUT_SECS)]
    io_timeout_secs: u64,
}

// =============================================================================
// Client Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Coordinator address (host:port)
    #[arg(long, default_value = "localhost:1337")]
    master: String,

    /// Node id
    #[arg(long, default_value_t = 2, conflicts_with = "random")]
    id: i64,

    /// Pick a random node id in 1..10000
    #[arg(long)]
    random: bool,

    /// Display name sent on registration
    #[arg(long, default_value = "client")]
    name: String,

    /// Shared secret
    #[arg(long, env = "ROLLCALL_PASSWORD", hide_env_values = true)]
    password: String,

    /// Seconds between check-ins
    #[arg(long, default_value_t = DEFAULT_WAIT_SECS)]
    wait: u64,

    /// Kill a job still running after this many seconds. 0 waits forever.
    #[arg(long, default_value_t = 0)]
    job_timeout_secs: u64,

    /// CA certificate (PEM) to verify the coordinator with
    #[arg(long, conflicts_with = "insecure")]
    ca_cert: Option<PathBuf>,

    /// Name expected on the coordinator certificate
    #[arg(long, default_value = DEFAULT_SERVER_NAME)]
    server_name: String,

    /// Talk to the coordinator over plaintext TCP
    #[arg(long)]
    insecure: bool,
}

// =============================================================================
// Server Implementation
// =============================================================================

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let tls = TlsConfig {
        enabled: true,
        ca_cert_path: None,
        cert_path: args.cert,
        key_path: args.key,
        allow_insecure: args.insecure,
    };

    let mut config = CoordinatorConfig::new(args.listen)
        .with_expire(Duration::from_secs(args.expire))
        .with_tls(tls);
    config.redis_url = args.redis;
    config.secret = args.secret;
    config.templates_path = args.templates;
    config.io_timeout = Duration::from_secs(args.io_timeout_secs);

    let shutdown = install_shutdown_handler();
    Coordinator::connect(config).await?.run(shutdown).await?;

    Ok(())
}

// =============================================================================
// Client Implementation
// =============================================================================

async fn run_client(args: ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let node_id = if args.random {
        random_node_id()
    } else {
        args.id
    };

    let tls = if args.insecure {
        TlsConfig::insecure()
    } else {
        TlsConfig {
            ca_cert_path: args.ca_cert,
            ..TlsConfig::default()
        }
    };

    let mut config = AgentConfig::new(args.master, node_id, args.password)
        .with_name(args.name)
        .with_wait(Duration::from_secs(args.wait))
        .with_tls(tls);
    config.server_name = args.server_name;
    if args.job_timeout_secs > 0 {
        config = config.with_job_timeout(Duration::from_secs(args.job_timeout_secs));
    }

    let client = NodeClient::from_config(&config).await?;
    let host = facts::collect();
    tracing::info!(
        node_id,
        family = host.os_family().as_deref().unwrap_or("unknown"),
        arch = %host.architecture,
        "Collected host facts"
    );

    let executor = JobExecutor::from_config(&config);
    let agent = Agent::new(config, client, executor, &host);
    agent.run(install_shutdown_handler()).await;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match args.command {
        Commands::Server(server_args) => run_server(server_args).await?,
        Commands::Client(client_args) => run_client(client_args).await?,
    }

    Ok(())
}
