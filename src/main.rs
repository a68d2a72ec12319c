//! Safe cosigning CLI
//!
//! Query the transaction service and walk through the multisig
//! propose / confirm / execute flow.

use clap::{Parser, Subcommand};
use safe_cosign::cli::{self, CliResult};
use safe_cosign::config::Config;
use safe_cosign::core::Address;
use safe_cosign::service::SafeApiClient;

#[derive(Parser)]
#[command(name = "safe-cosign")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Propose, confirm and execute Safe multisig transactions", long_about = None)]
struct Cli {
    /// Chain id or short name such as `sep` or `gor` (overrides CHAIN_ID)
    #[arg(long, global = true)]
    chain: Option<String>,

    /// Transaction service base URL (overrides TX_SERVICE_URL)
    #[arg(long, global = true)]
    tx_service_url: Option<String>,

    /// Chain RPC endpoint (overrides RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Query(QueryCommands),

    /// Run the full 2-of-3 flow on a local chain
    Walkthrough {
        /// Amount to withdraw in ETH
        #[arg(short, long, default_value = "0.05")]
        amount: String,

        /// Withdrawal recipient
        #[arg(short, long, default_value = cli::DEFAULT_RECIPIENT)]
        to: Address,
    },

    /// List known chains
    Networks,
}

/// Commands answered by the transaction service
#[derive(Subcommand)]
enum QueryCommands {
    /// Transaction service metadata
    Service {
        #[command(subcommand)]
        action: ServiceCommands,
    },

    /// Safe account queries
    Safe {
        #[command(subcommand)]
        action: SafeCommands,
    },

    /// Owner queries
    Owner {
        #[command(subcommand)]
        action: OwnerCommands,
    },

    /// List pending transactions of a Safe
    Pending {
        /// Safe address
        #[arg(short, long, env = "SAFE_ADDRESS")]
        address: Address,
    },
}

#[derive(Subcommand)]
enum ServiceCommands {
    /// Service name and version
    Info,

    /// Deployed singletons indexed by the service
    Singletons,
}

#[derive(Subcommand)]
enum SafeCommands {
    /// Owners, threshold and nonce
    Info {
        /// Safe address
        #[arg(short, long, env = "SAFE_ADDRESS")]
        address: Address,
    },

    /// Delegates registered for the Safe
    Delegates {
        /// Safe address
        #[arg(short, long, env = "SAFE_ADDRESS")]
        address: Address,
    },
}

#[derive(Subcommand)]
enum OwnerCommands {
    /// Safes an address owns
    Safes {
        /// Owner address
        #[arg(short, long)]
        address: Address,
    },
}

async fn run_query(config: &Config, query: QueryCommands) -> CliResult<()> {
    let client = SafeApiClient::new(&config.service_url()?)?;
    log::debug!("Using transaction service at {}", client.base_url());

    match query {
        QueryCommands::Service { action } => match action {
            ServiceCommands::Info => cli::cmd_service_info(&client).await,
            ServiceCommands::Singletons => cli::cmd_service_singletons(&client).await,
        },
        QueryCommands::Safe { action } => match action {
            SafeCommands::Info { address } => cli::cmd_safe_info(&client, &address).await,
            SafeCommands::Delegates { address } => {
                cli::cmd_safe_delegates(&client, &address).await
            }
        },
        QueryCommands::Owner { action } => match action {
            OwnerCommands::Safes { address } => cli::cmd_owner_safes(&client, &address).await,
        },
        QueryCommands::Pending { address } => cli::cmd_pending(&client, &address).await,
    }
}

fn main() -> CliResult<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(chain) = &cli.chain {
        config.select_chain(chain)?;
    }
    if cli.tx_service_url.is_some() {
        config.tx_service_url = cli.tx_service_url.clone();
    }
    if cli.rpc_url.is_some() {
        config.rpc_url = cli.rpc_url.clone();
    }

    match cli.command {
        Commands::Networks => cli::cmd_networks(),
        Commands::Walkthrough { amount, to } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_walkthrough(&config, &amount, &to))
        }
        Commands::Query(query) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_query(&config, query))
        }
    }
}
