//! Guarded Wallet CLI
//!
//! Command-line tool for exercising the guarded smart account against
//! in-memory collaborators.

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use guarded_wallet_core::{
    AccountConfig, Collaborators, ENTRY_POINT_V06, ENTRY_POINT_V07, ExecutionOutcome,
    FeedFailureMode, PolicyConfig, SmartAccount, SwapParams, TransferRequest, calldata,
    external::memory::{
        ChannelConsumer, MemoryEntryPoint, MemoryExecutor, MemoryPriceFeed, MemoryPriceFeeds,
        MemoryRelayRouter, MemorySwapRouter, MemoryTokens,
    },
    policy::usd_value,
    signature::{address_from_key, guardian_digest, sign_prehash},
};
use k256::ecdsa::SigningKey;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

const USDC: Address = Address::repeat_byte(0x0c);
const WETH: Address = Address::repeat_byte(0xee);
const ACCOUNT: Address = Address::repeat_byte(0xac);
const FACTORY: Address = Address::repeat_byte(0xfa);
const RECIPIENT: Address = Address::repeat_byte(0xb0);

#[derive(Parser)]
#[command(name = "guarded-wallet")]
#[command(about = "Guarded smart account CLI", version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about the account engine
    Info,

    /// Value a token amount in whole fiat units
    UsdValue {
        /// Token amount in base units
        #[arg(short, long)]
        amount: String,

        /// Feed answer
        #[arg(short, long)]
        price: String,

        /// Token decimals
        #[arg(long, default_value_t = 18)]
        token_decimals: u8,

        /// Feed decimals
        #[arg(long, default_value_t = 8)]
        feed_decimals: u8,
    },

    /// Decode a call payload
    Decode {
        /// Hex-encoded payload
        payload: String,

        /// Contract the payload is sent to
        #[arg(short, long, default_value = "0x0000000000000000000000000000000000000000")]
        target: String,
    },

    /// Send a USDC transfer through the gate, approving it if escalated
    Simulate {
        /// Whole USDC to transfer
        #[arg(short, long, default_value_t = 2_500)]
        amount: u64,

        /// Fiat ceiling in whole units
        #[arg(short, long, default_value_t = 1_000)]
        ceiling: u64,

        /// Escalate when the price feed is missing
        #[arg(long)]
        fail_closed: bool,

        /// Drop the USDC price feed before sending
        #[arg(long)]
        no_feed: bool,
    },

    /// Swap USDC to WETH and relay the output to another domain
    Relay {
        /// Whole USDC to swap
        #[arg(short, long, default_value_t = 100)]
        amount: u64,

        /// Destination domain
        #[arg(short, long, default_value_t = 10)]
        destination: u64,

        /// Native relay fee
        #[arg(long, default_value_t = 50_000)]
        fee: u64,

        /// Native balance held by the account
        #[arg(long, default_value_t = 1_000_000)]
        balance: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .pretty()
        .init();

    match cli.command {
        Commands::Info => {
            show_info();
        }
        Commands::UsdValue {
            amount,
            price,
            token_decimals,
            feed_decimals,
        } => {
            value(&amount, &price, token_decimals, feed_decimals)?;
        }
        Commands::Decode { payload, target } => {
            decode(&payload, &target)?;
        }
        Commands::Simulate {
            amount,
            ceiling,
            fail_closed,
            no_feed,
        } => {
            simulate(amount, ceiling, fail_closed, no_feed).await?;
        }
        Commands::Relay {
            amount,
            destination,
            fee,
            balance,
        } => {
            relay(amount, destination, fee, balance).await?;
        }
    }

    Ok(())
}

fn show_info() {
    let defaults = PolicyConfig::default();

    println!("Guarded Wallet v{}", guarded_wallet_core::VERSION);
    println!();
    println!("Entry Points:");
    println!("  v0.6: {}", ENTRY_POINT_V06);
    println!("  v0.7: {}", ENTRY_POINT_V07);
    println!();
    println!("Default Policy:");
    println!("  Fiat ceiling: {}", defaults.usd_ceiling);
    println!("  Missing feed: {:?}", defaults.feed_failure_mode);
    println!("  Replay protection: {}", defaults.replay_protection);
    println!();
    println!("Authorization:");
    println!("  - Owner signs user operations (raw digest)");
    println!("  - Guardian approves escalations (EIP-191 digest)");
    println!("  - Entry point and factory drive the gate");
}

fn value(amount: &str, price: &str, token_decimals: u8, feed_decimals: u8) -> Result<()> {
    let amount: U256 = amount.parse().context("invalid amount")?;
    let price: U256 = price.parse().context("invalid price")?;

    let usd = usd_value(amount, price, token_decimals, feed_decimals)?;
    let ceiling = PolicyConfig::default().usd_ceiling;

    println!("Value: {} (ceiling {})", usd, ceiling);
    if usd >= ceiling {
        println!("Decision: requires guardian approval");
    } else {
        println!("Decision: executes immediately");
    }
    Ok(())
}

fn decode(payload: &str, target: &str) -> Result<()> {
    let payload = hex::decode(payload.trim_start_matches("0x")).context("invalid payload hex")?;
    let target: Address = target.parse().context("invalid target address")?;

    let operation = calldata::decode(target, &payload);
    if operation.is_money_moving() {
        println!("{}", serde_json::to_string_pretty(&operation)?);
    } else {
        println!("Unpriced call ({} bytes)", payload.len());
    }
    Ok(())
}

/// In-memory world around one account
struct Sandbox {
    account: SmartAccount,
    guardian_key: SigningKey,
    tokens: Arc<MemoryTokens>,
    feeds: Arc<MemoryPriceFeeds>,
    swap: Arc<MemorySwapRouter>,
    relay: Arc<MemoryRelayRouter>,
    requests: UnboundedReceiver<guarded_wallet_core::VerificationRequest>,
}

fn sandbox(policy: PolicyConfig) -> Result<Sandbox> {
    let owner_key = SigningKey::random(&mut rand::thread_rng());
    let guardian_key = SigningKey::random(&mut rand::thread_rng());

    let tokens = Arc::new(MemoryTokens::new());
    tokens.register(USDC, 6);
    tokens.register(WETH, 18);
    tokens.mint(USDC, ACCOUNT, U256::from(10_000_000u64) * U256::from(1_000_000u64))?;

    let feeds = Arc::new(MemoryPriceFeeds::new());
    feeds.register(
        USDC,
        Arc::new(MemoryPriceFeed::new(Address::repeat_byte(0xf0), 8, 100_000_000)),
    );

    let swap = Arc::new(MemorySwapRouter::new(Address::repeat_byte(0x5a), Arc::clone(&tokens)));
    let relay = Arc::new(MemoryRelayRouter::new(Address::repeat_byte(0x4e), Arc::clone(&tokens)));
    let (consumer, requests) = ChannelConsumer::new();

    let collaborators = Collaborators {
        price_feeds: feeds.clone(),
        tokens: tokens.clone(),
        consumer: Arc::new(consumer),
        swap_router: swap.clone(),
        relay_router: relay.clone(),
        entry_point: Arc::new(MemoryEntryPoint::new(ENTRY_POINT_V06)),
        executor: Arc::new(MemoryExecutor::new(Arc::clone(&tokens))),
    };

    let config = AccountConfig::new(
        ACCOUNT,
        address_from_key(owner_key.verifying_key()),
        address_from_key(guardian_key.verifying_key()),
    )
    .with_factory(FACTORY)
    .with_policy(policy);

    Ok(Sandbox {
        account: SmartAccount::initialize(config, collaborators)?,
        guardian_key,
        tokens,
        feeds,
        swap,
        relay,
        requests,
    })
}

async fn simulate(amount: u64, ceiling: u64, fail_closed: bool, no_feed: bool) -> Result<()> {
    let mode = if fail_closed {
        FeedFailureMode::FailClosed
    } else {
        FeedFailureMode::FailOpen
    };
    let policy = PolicyConfig::default()
        .with_usd_ceiling(U256::from(ceiling))
        .with_feed_failure_mode(mode);
    let mut sandbox = sandbox(policy)?;
    if no_feed {
        sandbox.feeds.remove(&USDC);
    }

    let base_units = U256::from(amount) * U256::from(1_000_000u64);
    let request = TransferRequest::new(
        USDC,
        U256::ZERO,
        calldata::encode_transfer(RECIPIENT, base_units),
    );

    info!(amount, ceiling, "submitting transfer");
    let entry_point = sandbox.account.entry_point();
    match sandbox.account.execute(entry_point, request).await? {
        ExecutionOutcome::Executed { .. } => {
            println!("Executed without escalation");
        }
        ExecutionOutcome::Escalated { nonce } => {
            println!("Escalated under nonce {}", nonce);
            if let Ok(request) = sandbox.requests.try_recv() {
                println!("Verification request: {}", serde_json::to_string(&request)?);
            }

            let pending = sandbox.account.pending(nonce).await;
            let signature = sign_prehash(&sandbox.guardian_key, &guardian_digest(&pending))?;
            sandbox
                .account
                .approve(entry_point, nonce, &signature.to_bytes())
                .await?;
            println!("Guardian approved nonce {}", nonce);
        }
    }

    println!(
        "Recipient balance: {} USDC base units",
        sandbox.tokens.balance(USDC, RECIPIENT)
    );
    println!("\nEvents:");
    for event in sandbox.account.events().await {
        println!("  {}: {}", event.kind(), serde_json::to_string(&event)?);
    }
    Ok(())
}

async fn relay(amount: u64, destination: u64, fee: u64, balance: u64) -> Result<()> {
    if amount == 0 {
        bail!("amount must be positive");
    }

    let sandbox = sandbox(PolicyConfig::default())?;
    // 1 USDC (6 decimals) buys 0.0005 WETH (18 decimals)
    sandbox.swap.set_rate(USDC, WETH, 500_000_000, 1);
    sandbox.relay.set_fee(destination, U256::from(fee));
    sandbox.account.receive(U256::from(balance)).await?;

    let params = SwapParams::new(
        USDC,
        WETH,
        U256::from(amount) * U256::from(1_000_000u64),
    );

    info!(amount, destination, fee, balance, "swapping and relaying");
    let transfer = sandbox
        .account
        .swap_and_relay(FACTORY, params, destination)
        .await?;

    println!("Relayed {} WETH base units to domain {}", transfer.amount, transfer.destination);
    println!("Message: {}", transfer.message_id);
    println!("Fee paid: {}", transfer.fee);
    println!(
        "Native balance left: {}",
        sandbox.account.native_balance().await
    );
    Ok(())
}
