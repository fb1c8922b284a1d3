//! Auto Seller - lists owned limited collectibles for resale
//!
//! Loads the inventory, builds the selling queue and walks it until every
//! entry has been handled once. Purchases are watched in the background.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use auto_seller::{Config, DedupSets, Endpoints, EventSink, Seller, SellerEvent, Session};
use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;

/// Limited collectibles auto seller
#[derive(Parser, Debug)]
#[command(name = "auto_seller")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Directory holding the seen, blacklist and not-resellable id files
    #[arg(long, default_value = "blacklist")]
    data_dir: PathBuf,

    /// Forget which items were already handled before starting
    #[arg(long, default_value_t = false)]
    reset_progress: bool,

    /// Csrf token refresh interval in seconds
    #[arg(long, default_value_t = 30)]
    token_refresh_secs: u64,

    /// Purchase check interval in seconds
    #[arg(long, default_value_t = 10)]
    buy_check_secs: u64,
}

/// Log `$msg` with the error and stop the process
macro_rules! fatal {
    ($msg:expr, $err:expr) => {{
        log::error!("{}: {}", $msg, $err);
        std::process::exit(1);
    }};
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => fatal!("Failed to start", e),
    };

    let mut sets = match DedupSets::open(&args.data_dir) {
        Ok(sets) => sets,
        Err(e) => fatal!("Failed to open progress files", e),
    };
    if args.reset_progress {
        if let Err(e) = sets.seen.clear() {
            fatal!("Failed to reset progress", e);
        }
        log::info!("Progress reset, every item will be handled again");
    }

    let session = match Session::login(config.cookie.clone(), Endpoints::default()).await {
        Ok(session) => Arc::new(session),
        Err(e) => fatal!("Login failed", e),
    };
    log::info!("Logged in as {}", session.user().name);

    match session.has_premium().await {
        Ok(true) => {}
        Ok(false) => fatal!("Cannot sell", auto_seller::Error::NoPremium),
        Err(e) => fatal!("Premium check failed", e),
    }

    let (events, receiver) = EventSink::channel(
        config.webhook.on_sale.enabled,
        config.webhook.on_buy.enabled,
    );
    tokio::spawn(log_events(receiver));

    let seller = match Seller::load(
        Arc::clone(&session),
        sets,
        config.seller_options(),
        Some(events),
    )
    .await
    {
        Ok(seller) => Arc::new(seller),
        Err(e) => fatal!("Failed to load inventory", e),
    };
    log::info!("Loaded {} items to sell", seller.len().await);

    let refresher = session.spawn_token_refresher(Duration::from_secs(args.token_refresh_secs));
    let buy_checker = seller.spawn_buy_checker(Duration::from_secs(args.buy_check_secs));

    tokio::select! {
        result = seller.run() => {
            if let Err(e) = result {
                log::error!("Auto sell stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, sold {}x items so far", seller.total_sold().await);
        }
    }

    refresher.abort();
    buy_checker.abort();
}

/// Print seller notifications as they arrive
async fn log_events(mut receiver: UnboundedReceiver<SellerEvent>) {
    while let Some(event) = receiver.recv().await {
        match event {
            SellerEvent::Sold { entry, sold, price } => {
                log::info!("Put {}x {} on sale for ${} ({})", sold, entry.name, price, entry.link);
            }
            SellerEvent::Bought {
                entry,
                serial,
                buyer,
                sold_for,
            } => {
                log::info!(
                    "{} (#{}) was bought by {} for ${} ({})",
                    entry.name,
                    serial,
                    buyer.name,
                    sold_for,
                    buyer.profile_link()
                );
            }
        }
    }
}
