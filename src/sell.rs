//! Listing collectibles for resale
//!
//! Each listing call is classified by its status code. Rate limits, expired
//! tokens and other failures are retried within the per-collectible budget;
//! a precondition failure means the whole entry can not be resold.

use std::time::Duration;

use log::{debug, error, info, warn};
use reqwest::StatusCode;
use tokio::sync::RwLock;

use crate::catalog::CatalogEntry;
use crate::collectible::{Collectible, ListingHandle};
use crate::error::{Error, Result};
use crate::marketplace::Session;
use crate::sync::sync_collectibles;

/// Retry budget and backoff for listing calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed calls tolerated per collectible before giving up on it
    pub max_retries: u32,
    pub rate_limit_backoff: Duration,
    pub failure_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_backoff: Duration::from_secs(30),
            failure_backoff: Duration::from_secs(3),
        }
    }
}

/// Optional skip rules for collectibles that are already listed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SellOptions {
    pub skip_on_sale: bool,
    pub skip_if_cheapest: bool,
}

/// Classification of a single listing call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    RateLimited,
    TokenExpired,
    NonResellable,
    TransientFailure,
}

impl Outcome {
    pub fn classify(status: StatusCode) -> Self {
        match status {
            StatusCode::OK => Outcome::Success,
            StatusCode::TOO_MANY_REQUESTS => Outcome::RateLimited,
            StatusCode::FORBIDDEN => Outcome::TokenExpired,
            StatusCode::PRECONDITION_FAILED => Outcome::NonResellable,
            _ => Outcome::TransientFailure,
        }
    }
}

/// Why a collectible was left alone without calling the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Flagged,
    MissingHandle,
    SamePrice,
    AlreadyOnSale,
    AlreadyCheapest,
}

/// Final state of one collectible in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectibleResult {
    Sold,
    Skipped(SkipReason),
    /// Retry budget exhausted
    Abandoned,
    NotResellable,
}

/// Result of the retry loop for one collectible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellReport {
    pub result: CollectibleResult,
    /// Listing calls issued
    pub calls: u32,
    /// Total time spent in backoff
    pub waited: Duration,
}

/// Result of selling every collectible of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Sold(u32),
    NotResellable,
}

impl BatchOutcome {
    /// Sold count, `None` for a non-resellable entry
    pub fn sold_count(&self) -> Option<u32> {
        match self {
            BatchOutcome::Sold(count) => Some(*count),
            BatchOutcome::NotResellable => None,
        }
    }
}

/// Why `collectible` must not be offered at `price`, if anything
pub fn skip_reason(
    collectible: &Collectible,
    price: u64,
    lowest_resale: Option<u64>,
    options: SellOptions,
) -> Option<SkipReason> {
    if collectible.skip {
        return Some(SkipReason::Flagged);
    }
    if collectible.handle().is_none() {
        return Some(SkipReason::MissingHandle);
    }
    if collectible.active_price() == Some(price) {
        return Some(SkipReason::SamePrice);
    }
    if collectible.is_on_sale() {
        if options.skip_on_sale {
            return Some(SkipReason::AlreadyOnSale);
        }
        if options.skip_if_cheapest
            && lowest_resale.is_some()
            && lowest_resale == collectible.active_price()
        {
            return Some(SkipReason::AlreadyCheapest);
        }
    }
    None
}

/// One listing call, classified
pub async fn attempt(session: &Session, handle: &ListingHandle, price: u64) -> Outcome {
    match session.put_on_sale(handle, price).await {
        Ok(status) => Outcome::classify(status),
        Err(e) => {
            warn!("Listing call for instance {} failed: {}", handle.instance_id, e);
            Outcome::TransientFailure
        }
    }
}

/// List one collectible, retrying within `policy`
pub async fn sell_collectible(
    session: &Session,
    handle: &ListingHandle,
    serial: u64,
    price: u64,
    policy: &RetryPolicy,
) -> SellReport {
    let mut report = SellReport {
        result: CollectibleResult::Abandoned,
        calls: 0,
        waited: Duration::ZERO,
    };
    let mut failures = 0u32;

    loop {
        let outcome = attempt(session, handle, price).await;
        report.calls += 1;

        let backoff = match outcome {
            Outcome::Success => {
                info!("Successfully sold for ${} (#{})", price, serial);
                report.result = CollectibleResult::Sold;
                return report;
            }
            Outcome::NonResellable => {
                report.result = CollectibleResult::NotResellable;
                return report;
            }
            Outcome::RateLimited => {
                error!(
                    "You got rate limited! Trying again in {} seconds...",
                    policy.rate_limit_backoff.as_secs()
                );
                Some(policy.rate_limit_backoff)
            }
            Outcome::TokenExpired => {
                error!("Your token got updated. Getting a new one...");
                if let Err(e) = session.refresh_token().await {
                    warn!("Token refresh failed: {}", e);
                }
                None
            }
            Outcome::TransientFailure => {
                error!("Failed to sell limited (#{})", serial);
                Some(policy.failure_backoff)
            }
        };

        failures += 1;
        if failures > policy.max_retries {
            warn!("Giving up on #{} after {} call(s)", serial, report.calls);
            return report;
        }

        if let Some(backoff) = backoff {
            tokio::time::sleep(backoff).await;
            report.waited += backoff;
        }
    }
}

/// Refresh `entry` and list every eligible collectible at its price to sell.
///
/// Collectibles are listed strictly one after another. A non-resellable
/// answer ends the batch immediately.
pub async fn sell_all(
    session: &Session,
    entry: &RwLock<CatalogEntry>,
    policy: &RetryPolicy,
    options: SellOptions,
) -> BatchOutcome {
    sync_collectibles(session, entry).await;

    let (name, price, lowest_resale, collectibles) = {
        let entry = entry.read().await;
        (
            entry.name.clone(),
            entry.price_to_sell,
            entry.lowest_resale.value().flatten(),
            entry.collectibles.iter().cloned().collect::<Vec<_>>(),
        )
    };

    info!("Selling {}x of {} items...", collectibles.len(), name);
    let mut sold = 0;

    for collectible in collectibles {
        let serial = collectible.serial();

        if let Some(reason) = skip_reason(&collectible, price, lowest_resale, options) {
            log_skip(reason, serial);
            continue;
        }
        let Some(handle) = collectible.handle() else {
            continue;
        };

        let report = sell_collectible(session, &handle, serial, price, policy).await;
        match report.result {
            CollectibleResult::Sold => {
                entry.write().await.collectibles.mark_listed(serial, price);
                sold += 1;
            }
            CollectibleResult::NotResellable => {
                info!("Item is not resable. Skipping it");
                return BatchOutcome::NotResellable;
            }
            CollectibleResult::Abandoned | CollectibleResult::Skipped(_) => {}
        }
    }

    BatchOutcome::Sold(sold)
}

/// Cancel the resale listing of collectible `serial` of `entry`.
///
/// Returns whether the marketplace accepted the cancellation. Only then is the
/// collectible marked off sale and its listing price forgotten.
pub async fn cancel_listing(
    session: &Session,
    entry: &RwLock<CatalogEntry>,
    serial: u64,
) -> Result<bool> {
    let handle = {
        let entry = entry.read().await;
        let collectible = entry
            .collectibles
            .get(serial)
            .ok_or(Error::UnknownCollectible(serial))?;
        collectible.handle().ok_or(Error::UnknownCollectible(serial))?
    };

    let status = session.take_off_sale(&handle).await?;
    if status != StatusCode::OK {
        warn!("Failed to take #{} off sale: {}", serial, status);
        return Ok(false);
    }

    entry.write().await.collectibles.mark_unlisted(serial);
    info!("Took #{} off sale", serial);
    Ok(true)
}

fn log_skip(reason: SkipReason, serial: u64) {
    match reason {
        SkipReason::Flagged => debug!("Collectible #{} is kept, not selling it", serial),
        SkipReason::MissingHandle => debug!("Collectible #{} has no listing handle yet", serial),
        SkipReason::SamePrice => {
            info!("This collectible is already on sale for the same price (#{})", serial)
        }
        SkipReason::AlreadyOnSale => info!("This collectible is already on sale (#{})", serial),
        SkipReason::AlreadyCheapest => info!(
            "You are already selling this collectible for the cheapest price (#{})",
            serial
        ),
    }
}

#[cfg(test)]
#[path = "sell_tests.rs"]
mod tests;
