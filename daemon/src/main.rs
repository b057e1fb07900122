//! Lattice wallet demo: derives a wallet from a mnemonic, sends from the
//! funded account 0 to account 1 and lets the auto-receiver pick the sends up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use lattice_client::{HttpNodeClient, NodeClient};
use lattice_crypto::{generate_mnemonic, mnemonic_to_seed};
use lattice_nullables::NullNode;
use lattice_types::{Address, Amount, KeyIndex, NetworkId};
use lattice_utils::{format_duration, init_logging, LogFormat};
use lattice_wallet_core::keys::derive;
use lattice_wallet_core::{Wallet, WalletConfig};
use lattice_work::{CachedWorkProvider, CpuWorkProvider, WorkProvider};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lattice-demo", about = "Lattice wallet engine demo")]
struct Cli {
    /// Network: "live", "test", or "dev".
    /// When a config file is provided, defaults to the file's network value.
    #[arg(long, env = "LATTICE_NETWORK")]
    network: Option<NetworkId>,

    /// BIP39 mnemonic. A fresh one is generated when omitted.
    #[arg(long, env = "LATTICE_MNEMONIC", hide_env_values = true)]
    mnemonic: Option<String>,

    /// Optional BIP39 passphrase.
    #[arg(long, default_value = "", env = "LATTICE_PASSPHRASE", hide_env_values = true)]
    passphrase: String,

    /// JSON-RPC endpoint of a node. Without it the demo runs against an
    /// in-memory node whose genesis account is index 0 of the mnemonic.
    #[arg(long, env = "LATTICE_NODE_URL")]
    node_url: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "LATTICE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "LATTICE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. CLI flags and env vars override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Send each amount from account 0 to account 1 and auto-receive them.
    Run {
        #[arg(long, value_delimiter = ',', default_value = "1000,2000")]
        amounts: Vec<u64>,

        /// Give up waiting for the receives after this many seconds.
        #[arg(long, default_value_t = 30)]
        wait_secs: u64,
    },
    /// Print the addresses of an index range.
    Addresses {
        #[arg(long, default_value_t = 0)]
        from: u32,
        #[arg(long, default_value_t = 4)]
        to: u32,
    },
    /// Generate and print a new mnemonic.
    Mnemonic,
}

fn load_config(cli: &Cli) -> anyhow::Result<WalletConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            WalletConfig::from_toml_file(&path).with_context(|| format!("loading {path}"))?
        }
        None => WalletConfig::default(),
    };
    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format, &config.log_level);

    let mnemonic = match (&cli.command, &cli.mnemonic) {
        (Command::Mnemonic, _) | (_, None) => {
            let phrase = generate_mnemonic()?;
            if matches!(cli.command, Command::Mnemonic) {
                println!("{phrase}");
                return Ok(());
            }
            warn!("no mnemonic given, generated a throwaway one");
            phrase
        }
        (_, Some(phrase)) => phrase.clone(),
    };
    let seed = mnemonic_to_seed(&mnemonic, &cli.passphrase)?;

    match cli.command {
        Command::Mnemonic => Ok(()),
        Command::Addresses { from, to } => {
            if from > to {
                bail!("empty index range {from}..={to}");
            }
            for index in from..=to {
                let account = derive(&seed, KeyIndex::new(index))?;
                println!("{index}\t{}", account.address);
            }
            Ok(())
        }
        Command::Run { amounts, wait_secs } => {
            let node: Arc<dyn NodeClient> = match &cli.node_url {
                Some(url) => {
                    info!(url = %url, network = %config.network, "using remote node");
                    Arc::new(HttpNodeClient::new(url.clone(), config.submit_timeout())?)
                }
                None => {
                    let genesis = derive(&seed, KeyIndex::new(0))?;
                    info!(
                        network = %config.network,
                        genesis = %genesis.address,
                        "using in-memory node"
                    );
                    Arc::new(NullNode::with_genesis(config.network, &genesis.keypair))
                }
            };
            let work: Arc<dyn WorkProvider> =
                Arc::new(CachedWorkProvider::new(Arc::new(CpuWorkProvider), 64));
            let wallet = Wallet::from_seed(seed, node, work, config)?;
            run(&wallet, &amounts, Duration::from_secs(wait_secs)).await
        }
    }
}

async fn run(wallet: &Wallet, amounts: &[u64], wait: Duration) -> anyhow::Result<()> {
    let source = KeyIndex::new(0);
    let target = KeyIndex::new(1);
    wallet.open_account_range(source, target).await?;
    let representative = wallet.address(source)?;
    let recipient = wallet.address(target)?;

    let _entries = wallet.on_account_entry(
        |entry| {
            info!(
                account = %entry.address,
                height = entry.height.value(),
                kind = ?entry.kind,
                counterparty = %entry.subject,
                balance = entry.balance.raw(),
                "ledger entry"
            );
            Ok(())
        },
        |e| warn!(error = %e, "entry feed error"),
    );
    // Adopt the current frontiers before anything is sent.
    wallet.monitor().poll_once().await?;
    wallet.start_monitoring();
    wallet.enable_auto_receiver(
        wallet.monitor(),
        wallet.config().auto_receive_min_amount,
        wallet.config().auto_receive_interval(),
        Arc::new(move |_: &Address| Some(representative.clone())),
    )?;

    let started = tokio::time::Instant::now();
    let mut expected = wallet.account(target).await?.balance;
    for &raw in amounts {
        let amount = Amount::new(raw);
        let block = wallet
            .send(source, recipient.clone(), amount, None)
            .await
            .with_context(|| format!("sending {raw}"))?;
        expected = expected.checked_add(amount).context("amount overflow")?;
        info!(hash = %block.hash, amount = raw, "sent");
    }

    let deadline = tokio::time::Instant::now() + wait;
    while wallet.account(target).await?.balance < expected {
        if tokio::time::Instant::now() >= deadline {
            wallet.shutdown().await;
            bail!("receives did not complete within {}", format_duration(wait));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    wallet.shutdown().await;

    for index in [source, target] {
        let state = wallet.account(index).await?;
        println!(
            "account {index} {} height={} balance={}",
            state.address,
            state.height,
            state.balance.raw()
        );
    }
    info!(elapsed = %format_duration(started.elapsed()), "demo finished");
    Ok(())
}
