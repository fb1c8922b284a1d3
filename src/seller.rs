//! Selling queue
//!
//! [`Seller`] owns the ordered catalog entries and a cursor over them. Each
//! cycle sells the entry under the cursor and moves on; the entry one step
//! ahead gets its market data warmed in the background meanwhile.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::catalog::{refresh_market_data, CatalogEntry, EntrySnapshot, SortKey};
use crate::error::{Error, Result};
use crate::events::{Buyer, EventSink, SellerEvent};
use crate::marketplace::models::{CatalogDetails, InventoryAsset};
use crate::marketplace::{asset_type_name, Session};
use crate::persisted_set::DedupSets;
use crate::pricing::{compute_price, UnderCut};
use crate::sell::{sell_all, BatchOutcome, RetryPolicy, SellOptions};
use crate::sync::sync_collectibles;

/// Sold (entry, serial) pairs remembered to avoid double purchase notifications
const RECENTLY_SOLD_CAPACITY: usize = 10;
/// Transactions inspected per purchase check
const RECENT_SALES_LIMIT: u32 = 10;
/// Entries covered by one resale restriction lookup
const RESTRICTION_WINDOW: usize = 30;
/// `resaleRestriction` value of items that cannot be resold
const RESALE_RESTRICTED: u32 = 1;

/// Queue behaviour
#[derive(Debug, Clone)]
pub struct SellerOptions {
    /// Record every entry the cursor moves past in `seen`
    pub save_progress: bool,
    pub sort_by: SortKey,
    /// Collectibles with a serial above this are kept (0 = off)
    pub keep_serials: u64,
    /// Entries owning this many copies or fewer are not sold at all (0 = off)
    pub keep_copies: usize,
    pub creators_blacklist: HashSet<u64>,
    pub undercut: UnderCut,
    pub retry: RetryPolicy,
    pub sell: SellOptions,
    /// Pause between two automatic sell cycles
    pub cycle_pause: Duration,
}

impl Default for SellerOptions {
    fn default() -> Self {
        Self {
            save_progress: true,
            sort_by: SortKey::Name,
            keep_serials: 0,
            keep_copies: 0,
            creators_blacklist: HashSet::new(),
            undercut: UnderCut::default(),
            retry: RetryPolicy::default(),
            sell: SellOptions::default(),
            cycle_pause: Duration::from_millis(500),
        }
    }
}

/// Merge owned assets with catalog details into entries.
///
/// Assets excluded by `sets`, by creator, or lacking details are dropped.
/// The price to sell comes from the lowest resale, the undercut and the floor
/// of the asset's category.
pub fn collect_entries(
    assets: &[InventoryAsset],
    details: &[CatalogDetails],
    floors: &HashMap<String, u64>,
    sets: &DedupSets,
    options: &SellerOptions,
) -> Vec<CatalogEntry> {
    let details: HashMap<u64, &CatalogDetails> = details.iter().map(|d| (d.id, d)).collect();
    let mut entries: Vec<CatalogEntry> = Vec::new();
    let mut positions: HashMap<u64, usize> = HashMap::new();

    for asset in assets {
        let Some(serial) = asset.serial_number else {
            continue;
        };
        if sets.excludes(asset.asset_id) {
            continue;
        }
        let Some(detail) = details.get(&asset.asset_id) else {
            debug!("No catalog details for asset {}, skipping it", asset.asset_id);
            continue;
        };
        if detail
            .creator_target_id
            .is_some_and(|creator| options.creators_blacklist.contains(&creator))
        {
            continue;
        }

        let position = match positions.get(&asset.asset_id) {
            Some(position) => *position,
            None => {
                entries.push(new_entry(asset, detail, floors, options.undercut));
                positions.insert(asset.asset_id, entries.len() - 1);
                entries.len() - 1
            }
        };

        let collectible = entries[position].collectibles.entry(serial);
        if let Some(item_id) = &asset.collectible_item_id {
            collectible.item_id.fill(item_id.clone());
        }
        if let Some(instance_id) = &asset.collectible_item_instance_id {
            collectible.instance_id.fill(instance_id.clone());
        }
    }

    entries
}

fn new_entry(
    asset: &InventoryAsset,
    detail: &CatalogDetails,
    floors: &HashMap<String, u64>,
    undercut: UnderCut,
) -> CatalogEntry {
    let floor = detail
        .asset_type
        .and_then(asset_type_name)
        .and_then(|category| floors.get(category))
        .copied()
        .unwrap_or(0);

    let name = if detail.name.is_empty() {
        asset.asset_name.clone()
    } else {
        detail.name.clone()
    };

    let mut entry = CatalogEntry::new(
        asset.asset_id,
        asset.collectible_item_id.clone().unwrap_or_default(),
        name,
    );
    entry.creator_id = detail.creator_target_id;
    entry.creator_name = detail.creator_name.clone().unwrap_or_default();
    entry.asset_type = detail.asset_type;
    entry.price = detail.price;
    entry.quantity = detail.total_quantity;
    if let Some(lowest) = detail.lowest_resale_price {
        entry.lowest_resale.fill(Some(lowest));
    }
    entry.price_to_sell = compute_price(detail.lowest_resale_price, floor, undercut);
    entry
}

/// Apply the keep-copies and keep-serials filters, in that order.
///
/// Entries owning `keep_copies` or fewer collectibles are removed first;
/// collectibles of the remaining entries with a serial above `keep_serials`
/// are then flagged to be kept. Each filter is off when its value is 0.
pub fn apply_keep_filters(entries: &mut Vec<CatalogEntry>, options: &SellerOptions) {
    if options.keep_copies > 0 {
        entries.retain(|entry| entry.collectibles.len() > options.keep_copies);
    }

    if options.keep_serials > 0 {
        for entry in entries.iter_mut() {
            for collectible in entry.collectibles.iter_mut() {
                if collectible.serial() > options.keep_serials {
                    collectible.skip = true;
                }
            }
        }
    }
}

fn unmet_requirements(options: &SellerOptions) -> String {
    let mut not_met = Vec::new();
    if options.keep_copies > 0 {
        not_met.push(format!("{} copies or higher", options.keep_copies));
    }
    if options.keep_serials > 0 {
        not_met.push(format!("{} serial or higher", options.keep_serials));
    }
    format!("You dont have any limiteds with {}", not_met.join(", "))
}

#[derive(Clone)]
struct QueueSlot {
    id: u64,
    entry: Arc<RwLock<CatalogEntry>>,
}

struct QueueState {
    slots: Vec<QueueSlot>,
    cursor: usize,
    done: bool,
    total_sold: u64,
    sets: DedupSets,
    recently_sold: VecDeque<(u64, u64)>,
}

impl QueueState {
    fn current(&self) -> Option<&QueueSlot> {
        self.slots.get(self.cursor)
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == id)
    }

    /// Drop entry `id`, keeping the cursor on the same entry where possible.
    ///
    /// Removing the entry under the cursor moves it onto the next one; running
    /// off the end wraps to the start and completes the pass.
    fn remove(&mut self, id: u64) -> bool {
        let Some(position) = self.position(id) else {
            return false;
        };
        self.slots.remove(position);

        if position < self.cursor {
            self.cursor -= 1;
        }
        if self.cursor >= self.slots.len() {
            self.cursor = 0;
            self.done = true;
        }
        true
    }

    fn remember_sold(&mut self, key: (u64, u64)) -> bool {
        if self.recently_sold.contains(&key) {
            return false;
        }
        if self.recently_sold.len() == RECENTLY_SOLD_CAPACITY {
            self.recently_sold.pop_front();
        }
        self.recently_sold.push_back(key);
        true
    }
}

/// Clears the selling flag when the sell cycle ends
struct SellingGuard<'a>(&'a AtomicBool);

impl<'a> SellingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::AlreadySelling)?;
        Ok(Self(flag))
    }
}

impl Drop for SellingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Queue controller
pub struct Seller {
    session: Arc<Session>,
    options: SellerOptions,
    state: Arc<Mutex<QueueState>>,
    selling: AtomicBool,
    events: Option<EventSink>,
    loaded_at: DateTime<Utc>,
}

impl Seller {
    /// Build the queue from the live inventory.
    ///
    /// Fails when the inventory holds no limiteds or when dedup sets and
    /// filters leave nothing to sell.
    pub async fn load(
        session: Arc<Session>,
        sets: DedupSets,
        options: SellerOptions,
        events: Option<EventSink>,
    ) -> Result<Self> {
        let floors = session.price_floors().await?;

        let assets = session.full_inventory().await?;
        if assets.is_empty() {
            return Err(Error::NoInventory);
        }

        let mut ids: Vec<u64> = assets.iter().map(|asset| asset.asset_id).collect();
        ids.sort_unstable();
        ids.dedup();

        info!("Found {} items. Checking them...", ids.len());
        let details = session.catalog_details(&ids).await?;

        let mut entries = collect_entries(&assets, &details, &floors, &sets, &options);
        if entries.is_empty() {
            return Err(Error::NothingToSell(
                "You dont have any limiteds that are not in blacklist/ directory".to_string(),
            ));
        }

        apply_keep_filters(&mut entries, &options);
        if entries.is_empty() {
            return Err(Error::NothingToSell(unmet_requirements(&options)));
        }

        Ok(Self::new(session, entries, sets, options, events))
    }

    /// Queue over `entries`, sorted by the configured key
    pub fn new(
        session: Arc<Session>,
        mut entries: Vec<CatalogEntry>,
        sets: DedupSets,
        options: SellerOptions,
        events: Option<EventSink>,
    ) -> Self {
        entries.sort_by(|a, b| a.compare(b, options.sort_by));
        let slots = entries
            .into_iter()
            .map(|entry| QueueSlot {
                id: entry.id(),
                entry: Arc::new(RwLock::new(entry)),
            })
            .collect();

        Self {
            session,
            options,
            state: Arc::new(Mutex::new(QueueState {
                slots,
                cursor: 0,
                done: false,
                total_sold: 0,
                sets,
                recently_sold: VecDeque::with_capacity(RECENTLY_SOLD_CAPACITY),
            })),
            selling: AtomicBool::new(false),
            events,
            loaded_at: Utc::now(),
        }
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn options(&self) -> &SellerOptions {
        &self.options
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.slots.is_empty()
    }

    pub async fn cursor(&self) -> usize {
        self.state.lock().await.cursor
    }

    /// True once the cursor has wrapped around the whole queue
    pub async fn is_done(&self) -> bool {
        self.state.lock().await.done
    }

    pub async fn total_sold(&self) -> u64 {
        self.state.lock().await.total_sold
    }

    pub fn is_selling(&self) -> bool {
        self.selling.load(Ordering::Acquire)
    }

    /// Ids in queue order
    pub async fn entry_ids(&self) -> Vec<u64> {
        self.state.lock().await.slots.iter().map(|slot| slot.id).collect()
    }

    /// Entry under the cursor
    pub async fn current(&self) -> Option<Arc<RwLock<CatalogEntry>>> {
        let state = self.state.lock().await;
        state.current().map(|slot| Arc::clone(&slot.entry))
    }

    pub async fn current_entry(&self) -> Option<EntrySnapshot> {
        let entry = self.current().await?;
        let snapshot = entry.read().await.snapshot();
        Some(snapshot)
    }

    /// Run a closure over the dedup sets
    pub async fn with_sets<T>(&self, f: impl FnOnce(&mut DedupSets) -> T) -> T {
        let mut state = self.state.lock().await;
        f(&mut state.sets)
    }

    /// Move the cursor one step, wrapping to the start
    pub async fn advance(&self) {
        let mut state = self.state.lock().await;
        self.advance_locked(&mut state);
    }

    fn advance_locked(&self, state: &mut QueueState) {
        if state.slots.is_empty() {
            state.done = true;
            return;
        }

        state.cursor = (state.cursor + 1) % state.slots.len();
        if state.cursor == 0 {
            state.done = true;
        }

        if let Some(next) = state.slots.get(state.cursor + 1) {
            self.spawn_prefetch(next);
        }
        if restriction_check_due(state.cursor) {
            self.spawn_restriction_filter();
        }
    }

    fn spawn_restriction_filter(&self) {
        let session = Arc::clone(&self.session);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Err(e) = filter_restricted(&session, &state).await {
                debug!("Resale restriction lookup failed: {}", e);
            }
        });
    }

    /// Drop entries ahead of the cursor that the marketplace refuses to resell.
    ///
    /// Looks at up to 30 entries starting at the cursor. Restricted entries
    /// are recorded as not resellable. Returns how many were dropped.
    pub async fn filter_restricted(&self) -> Result<usize> {
        filter_restricted(&self.session, &self.state).await
    }

    fn spawn_prefetch(&self, slot: &QueueSlot) {
        let session = Arc::clone(&self.session);
        let entry = Arc::clone(&slot.entry);
        tokio::spawn(async move {
            refresh_market_data(&session, &entry).await;
        });
    }

    /// Fetch market data for the current and the next entry and wait for it
    pub async fn warm_up(&self) {
        let slots: Vec<QueueSlot> = {
            let state = self.state.lock().await;
            state
                .slots
                .iter()
                .skip(state.cursor)
                .take(2)
                .cloned()
                .collect()
        };

        for slot in slots {
            refresh_market_data(&self.session, &slot.entry).await;
        }
    }

    /// Sell every eligible collectible of the current entry, then advance.
    ///
    /// Returns the number listed, or `None` when the entry turned out to be
    /// not resellable (it is then recorded as such). Overlapping calls fail
    /// with [`Error::AlreadySelling`].
    pub async fn sell_current(&self) -> Result<Option<u32>> {
        let _guard = SellingGuard::acquire(&self.selling)?;

        let Some(slot) = self.state.lock().await.current().cloned() else {
            return Ok(Some(0));
        };

        let outcome = sell_all(&self.session, &slot.entry, &self.options.retry, self.options.sell).await;

        let mut state = self.state.lock().await;
        match outcome {
            BatchOutcome::NotResellable => {
                state.sets.not_resellable.add(slot.id)?;
            }
            BatchOutcome::Sold(sold) => {
                state.total_sold += u64::from(sold);
                if sold > 0 {
                    if let Some(events) = &self.events {
                        let entry = slot.entry.read().await.snapshot();
                        events.publish(SellerEvent::Sold {
                            price: entry.price_to_sell,
                            entry,
                            sold,
                        });
                    }
                }
            }
        }

        if self.options.save_progress {
            state.sets.seen.add(slot.id)?;
        }

        // a manual skip may have moved the cursor meanwhile
        if state.current().map(|current| current.id) == Some(slot.id) {
            self.advance_locked(&mut state);
        }

        Ok(outcome.sold_count())
    }

    /// Leave the current entry unsold and advance
    pub async fn skip_current(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(id) = state.current().map(|slot| slot.id) {
            if self.options.save_progress {
                state.sets.seen.add(id)?;
            }
            debug!("Skipped entry {}", id);
        }
        self.advance_locked(&mut state);
        Ok(())
    }

    /// Override the listing price of an entry
    pub async fn set_price_to_sell(&self, entry_id: u64, price: u64) -> Result<()> {
        let entry = {
            let state = self.state.lock().await;
            let position = state.position(entry_id).ok_or(Error::UnknownEntry(entry_id))?;
            Arc::clone(&state.slots[position].entry)
        };

        entry.write().await.price_to_sell = price;
        info!("Successfully set a new price to sell! (${})", price);
        Ok(())
    }

    /// Permanently exclude `entry_id`; moves on if it is the current entry
    pub async fn blacklist(&self, entry_id: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.sets.blacklist.add(entry_id)?;
        info!("Added {} into the blacklist", entry_id);

        if state.current().map(|slot| slot.id) == Some(entry_id) {
            self.advance_locked(&mut state);
        }
        Ok(())
    }

    async fn find(&self, entry_id: u64) -> Option<Arc<RwLock<CatalogEntry>>> {
        let state = self.state.lock().await;
        let position = state.position(entry_id)?;
        Some(Arc::clone(&state.slots[position].entry))
    }

    /// Look for collectibles bought since the queue was loaded.
    ///
    /// Every serial that left the inventory of a sold entry is reported once
    /// as [`SellerEvent::Bought`]. Entries left without collectibles drop out
    /// of the queue. Returns the number of purchases reported.
    pub async fn check_purchases(&self) -> Result<usize> {
        let sales = self.session.recent_sales(RECENT_SALES_LIMIT).await?;
        let mut reported = 0;

        for sale in sales {
            if sale.details.kind != "Asset" || sale.created < self.loaded_at {
                continue;
            }
            let entry_id = sale.details.id;
            let Some(entry) = self.find(entry_id).await else {
                continue;
            };

            let report = sync_collectibles(&self.session, &entry).await;
            if !report.complete {
                continue;
            }

            let (snapshot, sold_out) = {
                let entry = entry.read().await;
                (entry.snapshot(), entry.collectibles.is_empty())
            };

            let mut state = self.state.lock().await;
            for serial in report.removed {
                if !state.remember_sold((entry_id, serial)) {
                    continue;
                }
                info!("Someone bought {} (#{})", snapshot.name, serial);
                reported += 1;

                if let Some(events) = &self.events {
                    events.publish(SellerEvent::Bought {
                        entry: snapshot.clone(),
                        serial,
                        buyer: Buyer {
                            id: sale.agent.id,
                            name: sale.agent.name.clone(),
                        },
                        sold_for: sale.currency.amount,
                    });
                }
            }

            if sold_out && state.remove(entry_id) {
                info!("Entry {} sold out, removed from the queue", entry_id);
            }
        }

        Ok(reported)
    }

    /// Poll for purchases in the background
    pub fn spawn_buy_checker(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let seller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = seller.check_purchases().await {
                    warn!("Purchase check failed: {}", e);
                }
            }
        })
    }

    /// Sell entry after entry until the cursor wraps around. Returns the total sold.
    pub async fn run(&self) -> Result<u64> {
        self.warm_up().await;

        while !self.is_done().await {
            match self.sell_current().await {
                Ok(_) => {}
                Err(Error::AlreadySelling) => debug!("Sell cycle already running, waiting"),
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.options.cycle_pause).await;
        }

        let total = self.total_sold().await;
        info!("Sold {}x items", total);
        Ok(total)
    }
}

/// The lookup runs every 30 positions, two entries ahead of each window
fn restriction_check_due(cursor: usize) -> bool {
    cursor != 0 && (cursor + 2) % RESTRICTION_WINDOW == 0
}

async fn filter_restricted(session: &Session, state: &Mutex<QueueState>) -> Result<usize> {
    let window: Vec<QueueSlot> = {
        let state = state.lock().await;
        state
            .slots
            .iter()
            .skip(state.cursor)
            .take(RESTRICTION_WINDOW)
            .cloned()
            .collect()
    };

    let mut item_ids = Vec::with_capacity(window.len());
    for slot in &window {
        let item_id = slot.entry.read().await.item_id.clone();
        if !item_id.is_empty() {
            item_ids.push(item_id);
        }
    }
    if item_ids.is_empty() {
        return Ok(0);
    }

    let details = session.marketplace_item_details(&item_ids).await?;

    let mut state = state.lock().await;
    let mut dropped = 0;
    for detail in details {
        if detail.resale_restriction != RESALE_RESTRICTED {
            continue;
        }
        state.sets.not_resellable.add(detail.item_target_id)?;
        if state.remove(detail.item_target_id) {
            info!("Entry {} cannot be resold, removed from the queue", detail.item_target_id);
            dropped += 1;
        }
    }
    Ok(dropped)
}

#[cfg(test)]
#[path = "seller_tests.rs"]
mod tests;
