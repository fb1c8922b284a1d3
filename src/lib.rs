//! Limited collectibles auto seller
//!
//! Loads the serialized limiteds an account owns, prices them against the
//! live resale market and lists them one catalog entry at a time.

pub mod catalog;
pub mod collectible;
pub mod config;
pub mod error;
pub mod events;
pub mod marketplace;
pub mod persisted_set;
pub mod pricing;
pub mod sell;
pub mod seller;
pub mod sync;

// Re-export commonly used items
pub use catalog::{CatalogEntry, EntrySnapshot, Observed, SortKey};
pub use collectible::{Collectible, CollectibleStore, FillOnce, ListingHandle};
pub use config::Config;
pub use error::{Error, Result, SellerError};
pub use events::{Buyer, EventSink, SellerEvent};
pub use marketplace::{Endpoints, Session, UserInfo};
pub use persisted_set::{DedupSets, PersistedSet};
pub use pricing::{compute_price, min_sale_price, UnderCut, UnderCutKind};
pub use sell::{BatchOutcome, Outcome, RetryPolicy, SellOptions};
pub use seller::{Seller, SellerOptions};
pub use sync::{sync_collectibles, SyncReport};
