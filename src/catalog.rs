//! Catalog entries: one resalable item type and the copies owned of it

use std::cmp::Ordering;
use std::fmt;

use log::debug;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::collectible::{CollectibleStore, FillOnce};
use crate::marketplace::models::{ResaleData, Reseller};
use crate::marketplace::Session;

/// How many resale listings the prefetch asks for
const RESELLERS_LIMIT: u32 = 99;

/// Queue ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Creator,
    Price,
}

/// Market value as far as it has been observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed {
    /// Not fetched, or the fetch failed
    Unknown,
    /// Fetched, nothing there (no resales, no sales)
    Absent,
    Value(u64),
}

impl Observed {
    fn from_slot(slot: &FillOnce<Option<u64>>) -> Self {
        match slot.get() {
            None => Observed::Unknown,
            Some(None) => Observed::Absent,
            Some(Some(value)) => Observed::Value(*value),
        }
    }

    pub fn value(&self) -> Option<u64> {
        match self {
            Observed::Value(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Unknown => write!(f, "Failed to Fetch"),
            Observed::Absent => write!(f, "None"),
            Observed::Value(value) => write!(f, "{}", value),
        }
    }
}

/// A catalog entry with the collectibles owned under it
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    id: u64,
    /// Marketplace id used by the resale endpoints
    pub item_id: String,
    pub name: String,
    pub creator_id: Option<u64>,
    pub creator_name: String,
    pub asset_type: Option<u32>,
    pub price: Option<u64>,
    pub quantity: Option<u64>,
    pub lowest_resale: FillOnce<Option<u64>>,
    pub recent_average_price: FillOnce<u64>,
    pub latest_sale: FillOnce<Option<u64>>,
    pub price_to_sell: u64,
    pub collectibles: CollectibleStore,
}

impl CatalogEntry {
    pub fn new(id: u64, item_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            item_id: item_id.into(),
            name: name.into(),
            creator_id: None,
            creator_name: String::new(),
            asset_type: None,
            price: None,
            quantity: None,
            lowest_resale: FillOnce::unknown(),
            recent_average_price: FillOnce::unknown(),
            latest_sale: FillOnce::unknown(),
            price_to_sell: 0,
            collectibles: CollectibleStore::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn link(&self) -> String {
        format!("https://www.roblox.com/catalog/{}", self.id)
    }

    /// Collectibles that may still be offered
    pub fn sellable_count(&self) -> usize {
        self.collectibles.iter().filter(|c| !c.skip).count()
    }

    /// Point-in-time copy for presentation and events
    pub fn snapshot(&self) -> EntrySnapshot {
        let recent_average_price = match self.recent_average_price.value() {
            Some(value) => Observed::Value(value),
            None => Observed::Unknown,
        };

        EntrySnapshot {
            id: self.id,
            name: self.name.clone(),
            link: self.link(),
            creator_name: self.creator_name.clone(),
            price: self.price,
            quantity: self.quantity,
            lowest_resale: Observed::from_slot(&self.lowest_resale),
            recent_average_price,
            latest_sale: Observed::from_slot(&self.latest_sale),
            price_to_sell: self.price_to_sell,
            collectibles: self.collectibles.len(),
        }
    }

    /// Ordering used for the queue
    pub fn compare(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Name => self.name.cmp(&other.name),
            SortKey::Creator => self.creator_name.cmp(&other.creator_name),
            SortKey::Price => self.price.cmp(&other.price),
        }
        .then(self.id.cmp(&other.id))
    }

    /// Replace recent average price and latest sale with fresh resale data
    pub fn absorb_resale_data(&mut self, data: &ResaleData) {
        if let Some(average) = data.recent_average_price {
            self.recent_average_price.set(average.max(0.0).round() as u64);
        }

        let latest = data
            .price_data_points
            .first()
            .map(|point| point.value)
            .filter(|value| *value != 0);
        self.latest_sale.set(latest);
    }

    /// Replace the lowest competing resale with the cheapest current reseller
    pub fn absorb_resellers(&mut self, resellers: &[Reseller]) {
        self.lowest_resale
            .set(resellers.first().map(|reseller| reseller.price));
    }
}

/// Read-only view of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub id: u64,
    pub name: String,
    pub link: String,
    pub creator_name: String,
    pub price: Option<u64>,
    pub quantity: Option<u64>,
    pub lowest_resale: Observed,
    pub recent_average_price: Observed,
    pub latest_sale: Observed,
    pub price_to_sell: u64,
    pub collectibles: usize,
}

/// Warm the display data of `entry`. Failures leave fields unknown.
pub async fn refresh_market_data(session: &Session, entry: &RwLock<CatalogEntry>) {
    let item_id = entry.read().await.item_id.clone();

    let (resale_data, resellers) = tokio::join!(
        session.resale_data(&item_id),
        session.resellers(&item_id, RESELLERS_LIMIT)
    );

    let mut entry = entry.write().await;
    match resale_data {
        Ok(data) => entry.absorb_resale_data(&data),
        Err(e) => debug!("Resale data prefetch for {} failed: {}", entry.name, e),
    }
    match resellers {
        Ok(resellers) => entry.absorb_resellers(&resellers),
        Err(e) => debug!("Resellers prefetch for {} failed: {}", entry.name, e),
    }
}

#[cfg(test)]
pub(crate) fn make_test_entry(id: u64, name: &str) -> CatalogEntry {
    let mut entry = CatalogEntry::new(id, format!("item-{id}"), name);
    entry.creator_name = "Builder".to_string();
    entry.price = Some(100);
    entry.quantity = Some(50);
    entry.price_to_sell = 250;
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::models::{DataPoint, ResellerAccount};

    fn reseller(price: u64) -> Reseller {
        Reseller {
            price,
            serial_number: Some(9),
            seller: ResellerAccount {
                seller_id: 1,
                name: "someone".to_string(),
            },
        }
    }

    #[test]
    fn test_snapshot_reports_unknown_before_prefetch() {
        let entry = make_test_entry(1, "Sparkle Hat");
        let snapshot = entry.snapshot();

        assert_eq!(snapshot.lowest_resale, Observed::Unknown);
        assert_eq!(snapshot.recent_average_price, Observed::Unknown);
        assert_eq!(snapshot.latest_sale, Observed::Unknown);
        assert_eq!(snapshot.link, "https://www.roblox.com/catalog/1");
        assert_eq!(snapshot.price_to_sell, 250);
    }

    #[test]
    fn test_resellers_replace_lowest_resale() {
        let mut entry = make_test_entry(1, "Sparkle Hat");
        entry.absorb_resellers(&[reseller(120), reseller(150)]);
        assert_eq!(entry.snapshot().lowest_resale, Observed::Value(120));

        entry.absorb_resellers(&[reseller(90)]);
        assert_eq!(entry.snapshot().lowest_resale, Observed::Value(90));

        entry.absorb_resellers(&[]);
        assert_eq!(entry.snapshot().lowest_resale, Observed::Absent);
    }

    #[test]
    fn test_prefetch_replaces_load_time_lowest_resale() {
        let mut entry = make_test_entry(1, "Sparkle Hat");
        entry.lowest_resale.fill(Some(500));

        entry.absorb_resellers(&[reseller(300)]);

        assert_eq!(entry.snapshot().lowest_resale, Observed::Value(300));
    }

    #[test]
    fn test_resale_data_replaces_previous_values() {
        let mut entry = make_test_entry(1, "Sparkle Hat");
        entry.recent_average_price.fill(700);
        entry.latest_sale.fill(Some(650));

        let data = ResaleData {
            recent_average_price: Some(320.0),
            price_data_points: vec![DataPoint {
                value: 310,
                date: None,
            }],
            volume_data_points: vec![],
        };
        entry.absorb_resale_data(&data);

        let snapshot = entry.snapshot();
        assert_eq!(snapshot.recent_average_price, Observed::Value(320));
        assert_eq!(snapshot.latest_sale, Observed::Value(310));
    }

    #[test]
    fn test_empty_resellers_mean_absent() {
        let mut entry = make_test_entry(1, "Sparkle Hat");
        entry.absorb_resellers(&[]);
        assert_eq!(entry.snapshot().lowest_resale, Observed::Absent);
    }

    #[test]
    fn test_resale_data_fills_average_and_latest_sale() {
        let mut entry = make_test_entry(1, "Sparkle Hat");
        let data = ResaleData {
            recent_average_price: Some(412.6),
            price_data_points: vec![DataPoint {
                value: 400,
                date: None,
            }],
            volume_data_points: vec![],
        };
        entry.absorb_resale_data(&data);

        let snapshot = entry.snapshot();
        assert_eq!(snapshot.recent_average_price, Observed::Value(413));
        assert_eq!(snapshot.latest_sale, Observed::Value(400));
    }

    #[test]
    fn test_zero_latest_sale_is_absent() {
        let mut entry = make_test_entry(1, "Sparkle Hat");
        let data = ResaleData {
            recent_average_price: None,
            price_data_points: vec![DataPoint {
                value: 0,
                date: None,
            }],
            volume_data_points: vec![],
        };
        entry.absorb_resale_data(&data);
        assert_eq!(entry.snapshot().latest_sale, Observed::Absent);
    }

    #[test]
    fn test_compare_by_each_key() {
        let mut a = make_test_entry(1, "Alpha");
        let mut b = make_test_entry(2, "Beta");
        a.creator_name = "Zed".to_string();
        b.creator_name = "Amy".to_string();
        a.price = Some(10);
        b.price = Some(5);

        assert_eq!(a.compare(&b, SortKey::Name), Ordering::Less);
        assert_eq!(a.compare(&b, SortKey::Creator), Ordering::Greater);
        assert_eq!(a.compare(&b, SortKey::Price), Ordering::Greater);
    }

    #[test]
    fn test_observed_display() {
        assert_eq!(Observed::Unknown.to_string(), "Failed to Fetch");
        assert_eq!(Observed::Absent.to_string(), "None");
        assert_eq!(Observed::Value(5).to_string(), "5");
    }
}
