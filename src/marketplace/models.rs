//! Wire shapes of the marketplace JSON API

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collectible::InstanceState;

/// `GET /v1/users/authenticated`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// Body of the marketplace item details lookup
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ItemDetailsRequest<'a> {
    pub item_ids: &'a [String],
}

/// Marketplace restrictions of one collectible item
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceItemDetails {
    /// Catalog entry id the item belongs to
    pub item_target_id: u64,
    #[serde(default)]
    pub resale_restriction: u32,
}

/// One page of the user's inventory for an asset type
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryPage {
    #[serde(default)]
    pub next_page_cursor: Option<String>,
    #[serde(default)]
    pub data: Vec<InventoryAsset>,
}

/// Owned asset, one row per serialized copy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAsset {
    pub asset_id: u64,
    #[serde(default)]
    pub asset_name: String,
    #[serde(default)]
    pub collectible_item_id: Option<String>,
    #[serde(default)]
    pub collectible_item_instance_id: Option<String>,
    #[serde(default)]
    pub serial_number: Option<u64>,
}

/// Batched catalog details response
#[derive(Debug, Deserialize)]
pub struct CatalogDetailsResponse {
    #[serde(default)]
    pub data: Option<Vec<CatalogDetails>>,
}

/// Market metadata for one catalog entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDetails {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub total_quantity: Option<u64>,
    #[serde(default)]
    pub lowest_resale_price: Option<u64>,
    #[serde(default)]
    pub creator_target_id: Option<u64>,
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(default)]
    pub asset_type: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CatalogDetailsRequest {
    pub items: Vec<CatalogItemRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CatalogItemRef {
    pub item_type: u8,
    pub id: String,
}

/// `GET /v1/collectibles/metadata`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectiblesMetadata {
    #[serde(default)]
    pub limited_item_price_floors: HashMap<String, PriceFloor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFloor {
    pub price_floor: u64,
}

/// One page of resellable instances the user owns
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePage {
    #[serde(default)]
    pub item_instances: Vec<ResellableInstance>,
    #[serde(default)]
    pub next_page_cursor: Option<String>,
    #[serde(default)]
    pub previous_page_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResellableInstance {
    pub serial_number: u64,
    pub sale_state: String,
    #[serde(default)]
    pub price: Option<u64>,
    pub collectible_item_id: String,
    pub collectible_instance_id: String,
    pub collectible_product_id: String,
}

impl From<&ResellableInstance> for InstanceState {
    fn from(instance: &ResellableInstance) -> Self {
        InstanceState {
            serial: instance.serial_number,
            on_sale: instance.sale_state == "OnSale",
            price: instance.price,
            item_id: instance.collectible_item_id.clone(),
            instance_id: instance.collectible_instance_id.clone(),
            product_id: instance.collectible_product_id.clone(),
        }
    }
}

/// `GET .../resale-data`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResaleData {
    #[serde(default)]
    pub recent_average_price: Option<f64>,
    #[serde(default)]
    pub price_data_points: Vec<DataPoint>,
    #[serde(default)]
    pub volume_data_points: Vec<DataPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPoint {
    pub value: u64,
    #[serde(default)]
    pub date: Option<String>,
}

/// `GET .../resellers`
#[derive(Debug, Deserialize)]
pub struct ResellersResponse {
    #[serde(default)]
    pub data: Option<Vec<Reseller>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reseller {
    pub price: u64,
    #[serde(default)]
    pub serial_number: Option<u64>,
    pub seller: ResellerAccount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResellerAccount {
    pub seller_id: u64,
    #[serde(default)]
    pub name: String,
}

/// Body of the resale listing mutation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResalePayload<'a> {
    pub collectible_product_id: &'a str,
    pub is_on_sale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
    pub seller_id: u64,
    pub seller_type: &'static str,
}

/// `GET /v2/users/{id}/transactions`
#[derive(Debug, Deserialize)]
pub struct TransactionsResponse {
    #[serde(default)]
    pub data: Option<Vec<Transaction>>,
}

/// A completed sale on the account
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub created: DateTime<Utc>,
    pub details: TransactionDetails,
    pub currency: TransactionCurrency,
    pub agent: TransactionAgent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionDetails {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionCurrency {
    pub amount: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionAgent {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}
