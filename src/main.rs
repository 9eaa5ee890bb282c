//! Tablestakes command line
//!
//! Account administration and headless simulations over the casino core.

use clap::{Parser, Subcommand};
use tablestakes::games::roulette::{BetKind, Color};
use tablestakes::games::types::CrashPhaseKind;
use tablestakes::{Casino, CasinoConfig, ConfigLoader, Money};

#[derive(Parser, Debug)]
#[command(name = "tablestakes")]
#[command(about = "Offline casino core: accounts, ledger and game simulations", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, short)]
    config: Option<String>,

    /// Override the database directory
    #[arg(long)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    InitConfig {
        #[arg(default_value = "tablestakes.toml")]
        path: String,
    },
    /// Register a player account
    Register {
        name: String,
        password: String,
        /// Referral code of the inviting player
        #[arg(long)]
        referral: Option<String>,
    },
    /// Top up a player balance
    Deposit { name: String, amount: Money },
    /// Admin withdrawal from a player balance
    Withdraw { name: String, amount: Money },
    /// List accounts and balances
    Accounts,
    /// Account count and total balance in play
    Stats,
    /// Show recent bet and transaction logs
    Logs {
        /// Substring filter on account names
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Set the roulette straight-number payout multiple
    SetPayout { payout: u32 },
    /// Play headless rounds of every game
    Simulate {
        name: String,
        #[arg(long, default_value = "10")]
        rounds: u32,
        #[arg(long, default_value = "10")]
        stake: Money,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Command::InitConfig { path } = &args.command {
        std::fs::write(path, ConfigLoader::to_toml(&CasinoConfig::default())?)?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;
    if let Some(db_path) = args.db_path {
        config.storage.data_directory = db_path;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tablestakes={}", config.monitoring.log_level.as_filter()).into()),
        )
        .init();

    let casino = Casino::open(config)?;

    match args.command {
        Command::InitConfig { .. } => {}
        Command::Register {
            name,
            password,
            referral,
        } => {
            let reg = casino
                .accounts()
                .register(&name, &password, referral.as_deref())?;
            println!(
                "Registered {} with {} (referral code {})",
                reg.name, reg.balance, reg.referral_code
            );
            println!("Referral: {:?}", reg.referral);
        }
        Command::Deposit { name, amount } => {
            let balance = casino.accounts().deposit(&name, amount)?;
            println!("{} balance: {}", name, balance);
        }
        Command::Withdraw { name, amount } => {
            let balance = casino.admin().withdraw(&name, amount)?;
            println!("{} balance: {}", name, balance);
        }
        Command::Accounts => {
            for account in casino.admin().list_accounts()? {
                println!("{:<20} {:>16}", account.name, account.balance.to_string());
            }
        }
        Command::Stats => {
            let stats = casino.admin().stats()?;
            println!("Accounts:      {}", stats.total_accounts);
            println!("Total balance: {}", stats.total_balance);
            println!("Roulette payout: {}x", casino.admin().roulette_payout()?);
        }
        Command::Logs { filter, limit } => {
            println!("Bets:");
            for bet in casino.admin().bet_logs(filter.as_deref(), limit)? {
                println!(
                    "  {} {:<12} {:<9} wager {:>12} net {:>12}",
                    bet.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    bet.account,
                    bet.game.to_string(),
                    bet.wager.to_string(),
                    bet.outcome.to_string()
                );
            }
            println!("Transactions:");
            for tx in casino.admin().transaction_logs(filter.as_deref(), limit)? {
                println!(
                    "  {} {:<12} {:<16} {:>12}",
                    tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    tx.account,
                    tx.kind.to_string(),
                    tx.amount.to_string()
                );
            }
        }
        Command::SetPayout { payout } => {
            casino.admin().set_roulette_payout(payout)?;
            println!("Roulette straight payout set to {}x", payout);
        }
        Command::Simulate {
            name,
            rounds,
            stake,
            seed,
        } => {
            let casino = match seed {
                Some(seed) => casino.with_seed(seed),
                None => casino,
            };
            simulate(&casino, &name, rounds, stake).await?;
        }
    }

    Ok(())
}

async fn simulate(
    casino: &Casino,
    name: &str,
    rounds: u32,
    stake: Money,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = casino.ledger().balance(name)?;

    let mut blackjack = casino.blackjack_table(name)?;
    for _ in 0..rounds {
        let mut snap = blackjack.deal(stake)?;
        while snap.result.is_none() && snap.player_value < 17 {
            snap = blackjack.hit()?;
        }
        if snap.result.is_none() {
            snap = blackjack.stand()?;
        }
        println!(
            "Blackjack: player {} dealer {:?} -> {:?}",
            snap.player_value, snap.dealer_value, snap.result
        );
    }

    let mut roulette = casino.roulette_table(name)?;
    for _ in 0..rounds {
        roulette.add_bet(BetKind::Color(Color::Red), stake)?;
        let spin = roulette.spin()?;
        println!("Roulette: pocket {} ({:?}) net {}", spin.pocket, spin.color, spin.outcome.net);
    }

    let (table, driver) = casino.start_crash(name)?;
    let target = 1.5;
    for _ in 0..rounds {
        table.lock().await.place_bet(stake)?;
        loop {
            tokio::time::sleep(casino.config().poll_interval()).await;
            let mut table = table.lock().await;
            let snap = table.snapshot();
            match snap.phase {
                CrashPhaseKind::Running if snap.multiplier >= target => {
                    let outcome = table.cash_out()?;
                    println!("Crash: cashed out at {:.2}x net {}", snap.multiplier, outcome.net);
                    break;
                }
                CrashPhaseKind::Crashed => {
                    println!("Crash: busted at {:.2}x", snap.multiplier);
                    break;
                }
                _ => {}
            }
        }
        // wait for the next countdown
        while table.lock().await.snapshot().phase != CrashPhaseKind::Waiting {
            tokio::time::sleep(casino.config().poll_interval()).await;
        }
    }
    driver.cancel().await;

    let end = casino.ledger().balance(name)?;
    println!("Balance {} -> {} ({})", start, end, end - start);
    Ok(())
}
