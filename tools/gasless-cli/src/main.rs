use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use gasless_core::{
    types::{OperationReceipt, SponsorPool},
    ChainError, GasOverrides, GaslessPipeline, HttpChainReader, HttpRelayClient, JsonRpcClient,
    LocalSigner, OnchainPoolDirectory, OperationSigner, PipelineConfig, PoolDirectory,
    PriceOracle, StaticPoolDirectory, Token, TransferRequest, TransferStatus,
};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sponsored ERC-20 transfers through an ERC-4337 smart account.
///
/// The owner pays nothing in native currency: a sponsor pool covers gas and takes a fee in
/// the transferred token.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Node JSON-RPC URL (chain reads).
    #[arg(long, env = "RPC_URL")]
    rpc_url: String,

    /// Pipeline config JSON (chain id, entry point, factory, gas policy, polling).
    #[arg(long, env = "GASLESS_CONFIG")]
    config: Option<PathBuf>,

    /// JSON array of sponsor pool snapshots. Takes precedence over `--pool`.
    #[arg(long, env = "GASLESS_POOLS")]
    pools: Option<PathBuf>,

    /// Sponsor pool contract to read on-chain (repeatable).
    #[arg(long = "pool")]
    pool_addresses: Vec<Address>,

    /// Token price in wei per base unit, used for the gas-cost term of pool ranking.
    #[arg(long)]
    price: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the owner's smart account, its deployment state and nonce.
    Account {
        /// Owner address. Defaults to the address of the configured key.
        #[arg(long)]
        owner: Option<Address>,

        #[command(flatten)]
        key: KeyArgs,
    },

    /// Rank sponsor pools for a transfer.
    Quote {
        #[command(flatten)]
        token: TokenArgs,
    },

    /// Build, sign, submit and wait for a transfer.
    Transfer {
        /// Relay (bundler) JSON-RPC URL.
        #[arg(long, env = "RELAY_URL")]
        relay_url: String,

        #[arg(long)]
        recipient: Address,

        #[command(flatten)]
        token: TokenArgs,

        #[command(flatten)]
        key: KeyArgs,

        /// Override maxFeePerGas (wei).
        #[arg(long)]
        max_fee_per_gas: Option<u128>,

        /// Override maxPriorityFeePerGas (wei).
        #[arg(long)]
        max_priority_fee_per_gas: Option<u128>,

        /// Where to write the receipt record.
        #[arg(long, default_value = "transfers.json")]
        receipts_path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TokenArgs {
    /// ERC-20 token address.
    #[arg(long)]
    token: Address,

    /// Token symbol, as known to the price source.
    #[arg(long, default_value = "TOKEN")]
    symbol: String,

    /// Amount in token base units.
    #[arg(long)]
    amount: U256,
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Path to a file containing the owner private key.
    #[arg(long, env = "PRIV_KEY_PATH", conflicts_with = "private_key")]
    private_key_path: Option<PathBuf>,

    /// Owner private key (hex string, 0x...).
    #[arg(long, env = "PKEY", conflicts_with = "private_key_path")]
    private_key: Option<String>,
}

impl KeyArgs {
    fn signer(&self) -> Result<LocalSigner> {
        let raw = if let Some(ref path) = self.private_key_path {
            fs::read_to_string(path)
                .with_context(|| format!("failed reading key file {}", path.display()))?
        } else if let Some(ref pk) = self.private_key {
            pk.clone()
        } else {
            return Err(anyhow!(
                "missing owner key: provide --private-key-path or --private-key (or set PRIV_KEY_PATH/PKEY)"
            ));
        };
        LocalSigner::from_hex(&raw).context("failed parsing owner private key")
    }

    fn is_set(&self) -> bool {
        self.private_key_path.is_some() || self.private_key.is_some()
    }
}

/// Pools from a file or straight from the pool contracts.
enum PoolSource {
    Static(StaticPoolDirectory),
    Onchain(OnchainPoolDirectory<HttpChainReader>),
}

#[async_trait]
impl PoolDirectory for PoolSource {
    async fn pools_for_token(&self, token: Address) -> Result<Vec<SponsorPool>, ChainError> {
        match self {
            Self::Static(d) => d.pools_for_token(token).await,
            Self::Onchain(d) => d.pools_for_token(token).await,
        }
    }
}

struct FixedPrice(Option<f64>);

#[async_trait]
impl PriceOracle for FixedPrice {
    async fn price_in_native(&self, _symbol: &str) -> Option<f64> {
        self.0
    }
}

type Pipeline = GaslessPipeline<HttpChainReader, HttpRelayClient, PoolSource, FixedPrice>;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let chain = HttpChainReader::new(JsonRpcClient::new(&cli.rpc_url));

    match &cli.command {
        Command::Account { owner, key } => {
            let owner = match owner {
                Some(owner) => *owner,
                None if key.is_set() => key.signer()?.owner(),
                None => bail!("provide --owner or an owner key"),
            };
            // The relay is never contacted by this command.
            let p = pipeline(&cli, config, chain, &cli.rpc_url)?;
            let identity = p.resolve_account(owner).await?;
            println!("{}", serde_json::to_string_pretty(&identity)?);
        }
        Command::Quote { token } => {
            let p = pipeline(&cli, config, chain, &cli.rpc_url)?;
            let quote = p.quote(&token.token(), token.amount).await?;
            println!("{}", serde_json::to_string_pretty(&quote)?);
            if quote.best.is_none() {
                bail!("no healthy sponsor pool for {}", token.token);
            }
        }
        Command::Transfer {
            relay_url,
            recipient,
            token,
            key,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            receipts_path,
        } => {
            let signer = key.signer()?;
            let network = config.chain_id;
            let p = pipeline(&cli, config, chain, relay_url)?;
            let request = TransferRequest {
                recipient: *recipient,
                token: token.token(),
                amount: token.amount,
                overrides: GasOverrides {
                    max_fee_per_gas: *max_fee_per_gas,
                    max_priority_fee_per_gas: *max_priority_fee_per_gas,
                    ..GasOverrides::default()
                },
            };

            match p.run(&signer, &request).await? {
                TransferStatus::Completed(receipt) => {
                    write_receipt(receipts_path, network, &signer, &request, &receipt)?;
                    println!(
                        "Transferred {} of {} to {} in tx {}",
                        request.amount, request.token.address, request.recipient, receipt.transaction_hash
                    );
                }
                TransferStatus::NeedsApproval(approval) => {
                    println!("{}", serde_json::to_string_pretty(&approval)?);
                    bail!(
                        "allowance too low: send the approval above from {} and re-run",
                        approval.owner
                    );
                }
            }
        }
    }
    Ok(())
}

impl TokenArgs {
    fn token(&self) -> Token {
        Token::new(self.token, self.symbol.clone())
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    let config: PipelineConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing JSON in {}", path.display()))?;
    info!(path = %path.display(), chain_id = config.chain_id, "config_loaded");
    Ok(config)
}

fn pool_source(cli: &Cli, config: &PipelineConfig, chain: &HttpChainReader) -> Result<PoolSource> {
    if let Some(ref path) = cli.pools {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let pools: Vec<SponsorPool> = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing pools in {}", path.display()))?;
        return Ok(PoolSource::Static(StaticPoolDirectory::new(pools)));
    }
    if cli.pool_addresses.is_empty() {
        bail!("no sponsor pools: provide --pools <file> or at least one --pool <address>");
    }
    Ok(PoolSource::Onchain(OnchainPoolDirectory::new(
        chain.clone(),
        config.entry_point,
        cli.pool_addresses.clone(),
    )))
}

fn pipeline(
    cli: &Cli,
    config: PipelineConfig,
    chain: HttpChainReader,
    relay_url: &str,
) -> Result<Pipeline> {
    let pools = match &cli.command {
        Command::Account { .. } => PoolSource::Static(StaticPoolDirectory::default()),
        _ => pool_source(cli, &config, &chain)?,
    };
    let relay = HttpRelayClient::new(JsonRpcClient::new(relay_url));
    Ok(GaslessPipeline::new(config, chain, relay, pools, FixedPrice(cli.price)))
}

fn write_receipt(
    path: &Path,
    chain_id: u64,
    signer: &LocalSigner,
    request: &TransferRequest,
    receipt: &OperationReceipt,
) -> Result<()> {
    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());

    let existing = if path.exists() {
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?
    } else {
        String::new()
    };

    let mut root: Value = if existing.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(&existing)
            .with_context(|| format!("failed parsing JSON in {}", path.display()))?
    };
    if !root.is_object() {
        root = json!({});
    }
    if root.get("transfers").and_then(Value::as_array).is_none() {
        root["transfers"] = json!([]);
    }

    let entry = json!({
        "chainId": chain_id,
        "owner": signer.owner(),
        "recipient": request.recipient,
        "token": request.token.address,
        "symbol": request.token.symbol,
        "amount": request.amount,
        "receipt": receipt,
        "time": now,
    });
    if let Some(transfers) = root["transfers"].as_array_mut() {
        transfers.push(entry);
    }
    root["updatedAt"] = json!(now);

    write_json_atomic(path, &root)
}

fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }

    let serialised = serde_json::to_string_pretty(value).context("failed serialising receipts JSON")?;
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, serialised.as_bytes())
        .with_context(|| format!("failed writing temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("failed replacing {}", path.display()))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_keeps_directory() {
        let tmp = tmp_path_for(Path::new("out/transfers.json"));
        assert_eq!(tmp, PathBuf::from("out/transfers.json.tmp"));
    }

    #[test]
    fn missing_config_means_defaults() {
        assert_eq!(load_config(None).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn cli_parses_transfer() {
        let cli = Cli::try_parse_from([
            "gasless",
            "--rpc-url",
            "http://localhost:8545",
            "--pool",
            "0x0000000000000000000000000000000000000a11",
            "transfer",
            "--relay-url",
            "http://localhost:4337",
            "--recipient",
            "0x000000000000000000000000000000000000beef",
            "--token",
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            "--symbol",
            "USDC",
            "--amount",
            "1000000",
            "--private-key",
            "0x01",
        ])
        .unwrap();
        assert_eq!(cli.pool_addresses.len(), 1);
        match cli.command {
            Command::Transfer { token, .. } => {
                assert_eq!(token.amount, U256::from(1_000_000u64));
                assert_eq!(token.symbol, "USDC");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
