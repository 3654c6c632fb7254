//! Luckysix command line
//!
//! Derives draws from a seed, simulates complete rounds against the local VRF
//! oracle and checks configuration files. Results are printed as JSON.

use clap::{Parser, Subcommand};
use luckysix::common::config::ConfigLoader;
use luckysix::lottery::{spawn_delivery_loop, DrawEngine, InMemoryTreasury, VrfOracle};
use luckysix::{LotteryConfig, PlayerId, RoundController, RoundEvent, Seed, SingleOperator};
use rand::seq::index;
use rand::Rng;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

const OPERATOR: &str = "operator";

#[derive(Parser, Debug)]
#[command(name = "luckysix")]
#[command(about = "Round-based number lottery engine", long_about = None)]
struct Args {
    /// TOML configuration file; defaults to the classic 6-of-48 game
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the draw order produced by a seed
    Draw {
        /// Seed as up to 64 hex digits
        #[arg(long)]
        seed: String,
    },
    /// Play complete rounds with random tickets
    Simulate {
        #[arg(long, default_value = "10")]
        players: usize,

        #[arg(long, default_value = "1")]
        rounds: u64,

        /// Stake per ticket; the configured ticket price wins when set
        #[arg(long, default_value = "10")]
        stake: u64,

        /// Starting house bankroll
        #[arg(long, default_value = "1000000")]
        bankroll: u64,
    },
    /// Validate a configuration file and print the resolved values
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "luckysix=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Draw { seed } => {
            let config = load_config(args.config)?;
            println!("{}", serde_json::to_string_pretty(&draw(&config, &seed)?)?);
        }
        Command::Simulate {
            players,
            rounds,
            stake,
            bankroll,
        } => {
            let config = load_config(args.config)?;
            let summary = simulate(config, players, rounds, stake, bankroll).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::CheckConfig { path } => {
            let config = ConfigLoader::new().with_path(path).load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<LotteryConfig, luckysix::ConfigError> {
    match path {
        Some(path) => ConfigLoader::new().with_path(path).load(),
        None => ConfigLoader::new().load(),
    }
}

fn draw(config: &LotteryConfig, seed: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let seed = Seed::from_hex(seed)?;
    let drawn = DrawEngine::from_config(&config.draw)?.derive(&seed);
    Ok(json!({ "seed": seed.to_string(), "drawn": drawn }))
}

async fn simulate(
    config: LotteryConfig,
    players: usize,
    rounds: u64,
    stake: u64,
    bankroll: u64,
) -> Result<Value, Box<dyn std::error::Error>> {
    let fixed_price = config.entry.ticket_price;
    let draw = config.draw.clone();
    let pool_size = DrawEngine::from_config(&draw)?.pool_size();
    let auto_settle = config.settlement.auto_settle;

    let (oracle, fulfillments) = VrfOracle::new_random(&config.oracle);
    let oracle = Arc::new(oracle);
    oracle.fund(rounds);
    let treasury = Arc::new(InMemoryTreasury::new(bankroll));
    let controller = Arc::new(RoundController::new(
        config,
        oracle.clone(),
        treasury.clone(),
        Arc::new(SingleOperator::new(OPERATOR)),
    )?);
    let delivery = spawn_delivery_loop(controller.clone(), fulfillments);

    info!("oracle key {}", oracle.public_key_hex());

    let operator = PlayerId::from(OPERATOR);
    let mut events = controller.subscribe();
    let mut reports = Vec::new();
    let mut rng = rand::thread_rng();

    for _ in 0..rounds {
        let round_id = controller.start(&operator).await?;

        for p in 0..players {
            let player = PlayerId::new(format!("player-{}", p + 1));
            let numbers: Vec<u32> = index::sample(&mut rng, pool_size, draw.pick_count)
                .into_iter()
                .map(|i| draw.pool_min + i as u32)
                .collect();
            let ticket_stake =
                fixed_price.unwrap_or_else(|| stake.saturating_add(rng.gen_range(0..3u64)));
            controller.enter(&player, numbers, ticket_stake).await?;
        }

        controller.close(&operator).await?;

        let report = if auto_settle {
            wait_for(&mut events, |e| {
                matches!(e, RoundEvent::Settled { round_id: id, .. } if *id == round_id)
            })
            .await?;
            controller
                .last_settlement()
                .await
                .ok_or("settled round has no report")?
        } else {
            wait_for(&mut events, |e| {
                matches!(e, RoundEvent::Drawn { round_id: id } if *id == round_id)
            })
            .await?;
            controller.settle(&operator).await?
        };
        reports.push(report);
    }

    delivery.abort();

    Ok(json!({
        "reports": reports,
        "bankroll": treasury.bankroll(),
        "metrics": controller.metrics().snapshot(),
    }))
}

async fn wait_for<F>(
    events: &mut broadcast::Receiver<RoundEvent>,
    matches: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Fn(&RoundEvent) -> bool,
{
    loop {
        match events.recv().await {
            Ok(event) if matches(&event) => return Ok(()),
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
