//! Inventory, catalog metadata, price floors and sale history

use std::collections::HashMap;

use log::{debug, info, warn};
use reqwest::Method;

use super::models::{
    CatalogDetails, CatalogDetailsRequest, CatalogDetailsResponse, CatalogItemRef,
    CollectiblesMetadata, InventoryAsset, InventoryPage, Transaction, TransactionsResponse,
};
use super::Session;
use crate::error::{Error, Result};

/// Asset type ids that can hold limited collectibles, with their category names
pub const ASSET_TYPES: &[(u32, &str)] = &[
    (8, "Hat"),
    (41, "HairAccessory"),
    (42, "FaceAccessory"),
    (43, "NeckAccessory"),
    (44, "ShoulderAccessory"),
    (45, "FrontAccessory"),
    (46, "BackAccessory"),
    (47, "WaistAccessory"),
    (64, "TShirtAccessory"),
    (65, "ShirtAccessory"),
    (66, "PantsAccessory"),
    (67, "JacketAccessory"),
    (68, "SweaterAccessory"),
    (69, "ShortsAccessory"),
    (72, "DressSkirtAccessory"),
];

/// Catalog details accept at most this many ids per request
const DETAILS_BATCH: usize = 120;
const INVENTORY_PAGE_LIMIT: u32 = 100;

/// Category name for an asset type id
pub fn asset_type_name(asset_type: u32) -> Option<&'static str> {
    ASSET_TYPES
        .iter()
        .find(|(id, _)| *id == asset_type)
        .map(|(_, name)| *name)
}

impl Session {
    /// Serialized assets of one type in the user's inventory.
    ///
    /// A failing page ends the walk early with what was collected so far.
    pub async fn user_inventory(&self, asset_type: u32) -> Result<Vec<InventoryAsset>> {
        let url = format!(
            "{}/v2/users/{}/inventory/{}",
            self.endpoints.inventory,
            self.user_id(),
            asset_type
        );

        let mut assets = Vec::new();
        let mut cursor = String::new();

        loop {
            let response = self
                .request(Method::GET, &url)
                .await
                .query(&[
                    ("limit", INVENTORY_PAGE_LIMIT.to_string()),
                    ("cursor", cursor.clone()),
                    ("sortOrder", "Desc".to_string()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                warn!(
                    "Inventory page for asset type {} failed: {}",
                    asset_type,
                    response.status()
                );
                return Ok(assets);
            }

            let page: InventoryPage = response.json().await?;
            assets.extend(page.data.into_iter().filter(|a| a.serial_number.is_some()));

            match page.next_page_cursor {
                Some(next) if !next.is_empty() && next != cursor => cursor = next,
                _ => return Ok(assets),
            }
        }
    }

    /// Serialized assets across every collectible asset type
    pub async fn full_inventory(&self) -> Result<Vec<InventoryAsset>> {
        info!("Loading your inventory");
        let mut assets = Vec::new();
        for (asset_type, name) in ASSET_TYPES {
            let found = self.user_inventory(*asset_type).await?;
            debug!("Found {} {} collectibles", found.len(), name);
            assets.extend(found);
        }
        Ok(assets)
    }

    /// Catalog details for `ids`, fetched in batches
    pub async fn catalog_details(&self, ids: &[u64]) -> Result<Vec<CatalogDetails>> {
        let url = format!("{}/v1/catalog/items/details", self.endpoints.catalog);
        let mut details = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(DETAILS_BATCH) {
            let body = CatalogDetailsRequest {
                items: chunk
                    .iter()
                    .map(|id| CatalogItemRef {
                        item_type: 1,
                        id: id.to_string(),
                    })
                    .collect(),
            };

            let response = self.request(Method::POST, &url).await.json(&body).send().await?;
            if !response.status().is_success() {
                warn!("Catalog details batch failed: {}", response.status());
                return Ok(details);
            }

            let parsed: CatalogDetailsResponse = response.json().await?;
            match parsed.data {
                Some(data) => details.extend(data),
                None => return Ok(details),
            }
        }

        Ok(details)
    }

    /// Minimum resale price per category name
    pub async fn price_floors(&self) -> Result<HashMap<String, u64>> {
        info!("Getting current limiteds cap");
        let url = format!(
            "{}/v1/collectibles/metadata",
            self.endpoints.item_configuration
        );
        let response = self.request(Method::GET, &url).await.send().await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        let metadata: CollectiblesMetadata = response.json().await?;
        Ok(metadata
            .limited_item_price_floors
            .into_iter()
            .map(|(category, floor)| (category, floor.price_floor))
            .collect())
    }

    /// Most recent sales on the account
    pub async fn recent_sales(&self, limit: u32) -> Result<Vec<Transaction>> {
        let url = format!(
            "{}/v2/users/{}/transactions",
            self.endpoints.economy,
            self.user_id()
        );
        let response = self
            .request(Method::GET, &url)
            .await
            .query(&[
                ("cursor", String::new()),
                ("limit", limit.to_string()),
                ("transactionType", "Sale".to_string()),
                ("itemPricingType", "PaidAndLimited".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        let parsed: TransactionsResponse = response.json().await?;
        Ok(parsed.data.unwrap_or_default())
    }
}
