//! Serialized collectibles owned under one catalog entry

use std::collections::{BTreeMap, HashSet};

/// Optional value where the first concrete write wins.
///
/// Within one synchronization cycle, pages only fill unknown fields. A new
/// cycle clears the slots first, see [`Collectible::absorb`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FillOnce<T>(Option<T>);

impl<T> FillOnce<T> {
    pub fn unknown() -> Self {
        Self(None)
    }

    pub fn known(value: T) -> Self {
        Self(Some(value))
    }

    /// Store `value` if nothing is known yet. Returns whether it was stored.
    pub fn fill(&mut self, value: T) -> bool {
        if self.0.is_some() {
            return false;
        }
        self.0 = Some(value);
        true
    }

    /// Like [`FillOnce::fill`] but ignores `None`
    pub fn fill_opt(&mut self, value: Option<T>) -> bool {
        match value {
            Some(value) => self.fill(value),
            None => false,
        }
    }

    /// Overwrite unconditionally
    pub fn set(&mut self, value: T) {
        self.0 = Some(value);
    }

    /// Back to unknown
    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn is_known(&self) -> bool {
        self.0.is_some()
    }
}

impl<T: Copy> FillOnce<T> {
    pub fn value(&self) -> Option<T> {
        self.0
    }
}

/// Identifiers needed to mutate a resale listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingHandle {
    pub item_id: String,
    pub instance_id: String,
    pub product_id: String,
}

/// Live state of one owned instance as reported by the marketplace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceState {
    pub serial: u64,
    pub on_sale: bool,
    pub price: Option<u64>,
    pub item_id: String,
    pub instance_id: String,
    pub product_id: String,
}

/// One serially numbered owned unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collectible {
    serial: u64,
    pub on_sale: FillOnce<bool>,
    pub listing_price: FillOnce<u64>,
    pub item_id: FillOnce<String>,
    pub instance_id: FillOnce<String>,
    pub product_id: FillOnce<String>,
    /// Never offered for sale (kept copy, protected serial)
    pub skip: bool,
    /// Sync cycle the fields were last refreshed in
    synced_in: u64,
    /// Sync cycle during which a listing change was confirmed
    listed_in: Option<u64>,
}

impl Collectible {
    pub fn new(serial: u64) -> Self {
        Self {
            serial,
            on_sale: FillOnce::unknown(),
            listing_price: FillOnce::unknown(),
            item_id: FillOnce::unknown(),
            instance_id: FillOnce::unknown(),
            product_id: FillOnce::unknown(),
            skip: false,
            synced_in: 0,
            listed_in: None,
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Merge a live record seen during sync cycle `cycle`.
    ///
    /// The first record of a cycle replaces what the previous cycle knew;
    /// later records of the same cycle only fill unknown fields. Listing
    /// state confirmed by a sell during `cycle` is left alone.
    pub fn absorb(&mut self, state: &InstanceState, cycle: u64) {
        let listing_pinned = self.listed_in == Some(cycle);

        if self.synced_in != cycle {
            self.synced_in = cycle;
            self.item_id.clear();
            self.instance_id.clear();
            self.product_id.clear();
            if !listing_pinned {
                self.on_sale.clear();
                self.listing_price.clear();
            }
        }

        if !listing_pinned {
            self.on_sale.fill(state.on_sale);
            self.listing_price.fill_opt(state.price);
        }
        self.item_id.fill(state.item_id.clone());
        self.instance_id.fill(state.instance_id.clone());
        self.product_id.fill(state.product_id.clone());
    }

    /// Complete listing handle, if every id is known
    pub fn handle(&self) -> Option<ListingHandle> {
        Some(ListingHandle {
            item_id: self.item_id.get()?.clone(),
            instance_id: self.instance_id.get()?.clone(),
            product_id: self.product_id.get()?.clone(),
        })
    }

    pub fn is_on_sale(&self) -> bool {
        self.on_sale.value().unwrap_or(false)
    }

    /// Price of the live listing, if there is one
    pub fn active_price(&self) -> Option<u64> {
        if self.is_on_sale() {
            self.listing_price.value()
        } else {
            None
        }
    }

    /// Record a listing at `price` confirmed during sync cycle `cycle`
    pub fn mark_listed(&mut self, price: u64, cycle: u64) {
        self.on_sale.set(true);
        self.listing_price.set(price);
        self.listed_in = Some(cycle);
    }

    /// Record a cancelled listing confirmed during sync cycle `cycle`
    pub fn mark_unlisted(&mut self, cycle: u64) {
        self.on_sale.set(false);
        self.listing_price.clear();
        self.listed_in = Some(cycle);
    }
}

/// Owned collectibles of one catalog entry, keyed by serial
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectibleStore {
    by_serial: BTreeMap<u64, Collectible>,
    cycle: u64,
}

impl CollectibleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, serial: u64) -> Option<&Collectible> {
        self.by_serial.get(&serial)
    }

    pub fn get_mut(&mut self, serial: u64) -> Option<&mut Collectible> {
        self.by_serial.get_mut(&serial)
    }

    /// Insert an empty collectible for `serial` unless one already exists
    pub fn entry(&mut self, serial: u64) -> &mut Collectible {
        self.by_serial
            .entry(serial)
            .or_insert_with(|| Collectible::new(serial))
    }

    /// Start a new sync cycle, returning its number
    pub fn begin_cycle(&mut self) -> u64 {
        self.cycle += 1;
        self.cycle
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Create or update from a live record of the current cycle
    pub fn upsert(&mut self, state: &InstanceState) {
        let cycle = self.cycle;
        self.entry(state.serial).absorb(state, cycle);
    }

    /// Record a confirmed listing. Returns false for an unknown serial.
    pub fn mark_listed(&mut self, serial: u64, price: u64) -> bool {
        let cycle = self.cycle;
        match self.by_serial.get_mut(&serial) {
            Some(collectible) => {
                collectible.mark_listed(price, cycle);
                true
            }
            None => false,
        }
    }

    /// Record a confirmed cancellation. Returns false for an unknown serial.
    pub fn mark_unlisted(&mut self, serial: u64) -> bool {
        let cycle = self.cycle;
        match self.by_serial.get_mut(&serial) {
            Some(collectible) => {
                collectible.mark_unlisted(cycle);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, serial: u64) -> Option<Collectible> {
        self.by_serial.remove(&serial)
    }

    /// Drop every serial not in `seen`, returning the removed serials
    pub fn retain_seen(&mut self, seen: &HashSet<u64>) -> Vec<u64> {
        let stale: Vec<u64> = self
            .by_serial
            .keys()
            .copied()
            .filter(|serial| !seen.contains(serial))
            .collect();

        for serial in &stale {
            self.by_serial.remove(serial);
        }
        stale
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collectible> {
        self.by_serial.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Collectible> {
        self.by_serial.values_mut()
    }

    pub fn serials(&self) -> Vec<u64> {
        self.by_serial.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn make_test_state(serial: u64, on_sale: bool, price: Option<u64>) -> InstanceState {
    InstanceState {
        serial,
        on_sale,
        price,
        item_id: "item-1".to_string(),
        instance_id: format!("inst-{serial}"),
        product_id: "prod-1".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_once_keeps_first_value() {
        let mut value = FillOnce::unknown();
        assert!(value.fill(3));
        assert!(!value.fill(7));
        assert_eq!(value.value(), Some(3));

        value.set(9);
        assert_eq!(value.value(), Some(9));
    }

    #[test]
    fn test_fill_opt_ignores_none() {
        let mut value: FillOnce<u64> = FillOnce::unknown();
        assert!(!value.fill_opt(None));
        assert!(!value.is_known());
        assert!(value.fill_opt(Some(1)));
    }

    #[test]
    fn test_new_serial_starts_unknown() {
        let mut store = CollectibleStore::new();
        let col = store.entry(42);
        assert_eq!(col.serial(), 42);
        assert!(!col.on_sale.is_known());
        assert!(!col.listing_price.is_known());
        assert!(col.handle().is_none());
    }

    #[test]
    fn test_upsert_does_not_clobber_sell_of_same_cycle() {
        let mut store = CollectibleStore::new();
        store.begin_cycle();
        store.upsert(&make_test_state(1, false, None));
        assert!(store.mark_listed(1, 500));

        // stale page of the same cycle, fetched before the listing went through
        store.upsert(&make_test_state(1, false, Some(300)));

        let col = store.get(1).unwrap();
        assert_eq!(col.on_sale.value(), Some(true));
        assert_eq!(col.listing_price.value(), Some(500));
    }

    #[test]
    fn test_new_cycle_replaces_previous_state() {
        let mut store = CollectibleStore::new();
        store.begin_cycle();
        store.upsert(&make_test_state(1, false, None));

        store.begin_cycle();
        store.upsert(&make_test_state(1, true, Some(300)));

        let col = store.get(1).unwrap();
        assert_eq!(col.on_sale.value(), Some(true));
        assert_eq!(col.listing_price.value(), Some(300));

        store.begin_cycle();
        store.upsert(&make_test_state(1, false, None));

        let col = store.get(1).unwrap();
        assert_eq!(col.on_sale.value(), Some(false));
        assert_eq!(col.listing_price.value(), None);
    }

    #[test]
    fn test_sell_result_yields_to_next_cycle() {
        let mut store = CollectibleStore::new();
        store.begin_cycle();
        store.upsert(&make_test_state(1, false, None));
        store.mark_listed(1, 500);

        // listing was taken down on the website meanwhile
        store.begin_cycle();
        store.upsert(&make_test_state(1, false, None));

        assert!(!store.get(1).unwrap().is_on_sale());
    }

    #[test]
    fn test_first_record_of_a_cycle_wins() {
        let mut store = CollectibleStore::new();
        store.begin_cycle();
        store.upsert(&make_test_state(1, true, Some(200)));
        store.upsert(&make_test_state(1, false, Some(900)));

        assert_eq!(store.get(1).unwrap().listing_price.value(), Some(200));
    }

    #[test]
    fn test_handle_needs_every_id() {
        let mut col = Collectible::new(5);
        col.item_id.fill("item".to_string());
        col.instance_id.fill("inst".to_string());
        assert!(col.handle().is_none());

        col.product_id.fill("prod".to_string());
        let handle = col.handle().unwrap();
        assert_eq!(handle.product_id, "prod");
    }

    #[test]
    fn test_retain_seen_prunes_missing_serials() {
        let mut store = CollectibleStore::new();
        for serial in [1, 2, 3] {
            store.upsert(&make_test_state(serial, false, None));
        }

        let seen: HashSet<u64> = [1, 3].into_iter().collect();
        let removed = store.retain_seen(&seen);

        assert_eq!(removed, vec![2]);
        assert_eq!(store.serials(), vec![1, 3]);
    }

    #[test]
    fn test_mark_unlisted_clears_price() {
        let mut col = Collectible::new(1);
        col.mark_listed(10, 1);
        assert_eq!(col.active_price(), Some(10));

        col.mark_unlisted(1);
        assert!(!col.is_on_sale());
        assert_eq!(col.listing_price.value(), None);
        assert_eq!(col.active_price(), None);
    }

    #[test]
    fn test_mark_unknown_serial() {
        let mut store = CollectibleStore::new();
        assert!(!store.mark_listed(3, 10));
        assert!(!store.mark_unlisted(3));
    }
}
