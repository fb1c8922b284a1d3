//! Reconcile a catalog entry's collectibles with the live marketplace state

use std::collections::HashSet;

use log::{debug, warn};
use tokio::sync::RwLock;

use crate::catalog::CatalogEntry;
use crate::collectible::InstanceState;
use crate::marketplace::models::InstancePage;
use crate::marketplace::Session;

/// What one synchronization pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Pages fetched successfully
    pub pages: usize,
    /// Instance records applied
    pub upserted: usize,
    /// Serials dropped because they left the inventory
    pub removed: Vec<u64>,
    /// False when a page failed and the pass stopped early
    pub complete: bool,
}

/// Walk every page of owned instances and merge them into `entry`.
///
/// Each pass is a new sync cycle: the first record of a serial replaces what
/// the previous pass knew, later records only fill unknown fields. Serials the
/// marketplace no longer reports are pruned only after the last page, so a
/// failing page leaves the state of the pages before it and prunes nothing.
pub async fn sync_collectibles(session: &Session, entry: &RwLock<CatalogEntry>) -> SyncReport {
    let (item_id, name) = {
        let mut entry = entry.write().await;
        let cycle = entry.collectibles.begin_cycle();
        debug!("Sync cycle {} for {}", cycle, entry.name);
        (entry.item_id.clone(), entry.name.clone())
    };

    let mut report = SyncReport::default();
    let mut seen = HashSet::new();
    let mut cursor = String::new();

    loop {
        let page = match session.resellable_instances(&item_id, &cursor).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Collectible sync for {} stopped after {} page(s): {}", name, report.pages, e);
                return report;
            }
        };
        report.pages += 1;

        {
            let mut entry = entry.write().await;
            for instance in &page.item_instances {
                let state = InstanceState::from(instance);
                entry.collectibles.upsert(&state);
                seen.insert(state.serial);
                report.upserted += 1;
            }
        }

        match next_cursor(&cursor, &page) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    report.removed = entry.write().await.collectibles.retain_seen(&seen);
    report.complete = true;

    debug!(
        "Synced {}: {} record(s) over {} page(s), {} removed",
        name,
        report.upserted,
        report.pages,
        report.removed.len()
    );
    report
}

/// Cursor for the following page, or `None` when pagination is over.
///
/// A cursor pointing back at the page just read ends the walk as well.
fn next_cursor(current: &str, page: &InstancePage) -> Option<String> {
    let next = page
        .next_page_cursor
        .as_deref()
        .filter(|next| !next.is_empty())?;

    if next == current || page.previous_page_cursor.as_deref() == Some(next) {
        return None;
    }
    Some(next.to_string())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
