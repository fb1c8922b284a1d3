//! Per-item resale endpoints: owned instances, market data, listing mutation

use log::debug;
use reqwest::{Method, StatusCode};

use super::models::{
    InstancePage, ItemDetailsRequest, MarketplaceItemDetails, ResaleData, ResalePayload, Reseller,
    ResellersResponse,
};
use super::Session;
use crate::collectible::ListingHandle;
use crate::error::{Error, Result};

const INSTANCE_PAGE_LIMIT: u32 = 100;

impl Session {
    /// One page of the user's resellable instances of `item_id`
    pub async fn resellable_instances(&self, item_id: &str, cursor: &str) -> Result<InstancePage> {
        let url = format!(
            "{}/marketplace-sales/v1/item/{}/resellable-instances",
            self.endpoints.apis, item_id
        );
        let response = self
            .request(Method::GET, &url)
            .await
            .query(&[
                ("cursor", cursor.to_string()),
                ("ownerType", "User".to_string()),
                ("ownerId", self.user_id().to_string()),
                ("limit", INSTANCE_PAGE_LIMIT.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        Ok(response.json().await?)
    }

    /// Recent average price and sale history of `item_id`
    pub async fn resale_data(&self, item_id: &str) -> Result<ResaleData> {
        let url = format!(
            "{}/marketplace-sales/v1/item/{}/resale-data",
            self.endpoints.apis, item_id
        );
        let response = self.request(Method::GET, &url).await.send().await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        Ok(response.json().await?)
    }

    /// Current resale listings of `item_id`, cheapest first
    pub async fn resellers(&self, item_id: &str, limit: u32) -> Result<Vec<Reseller>> {
        let url = format!(
            "{}/marketplace-sales/v1/item/{}/resellers",
            self.endpoints.apis, item_id
        );
        let response = self
            .request(Method::GET, &url)
            .await
            .query(&[("limit", limit.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        let parsed: ResellersResponse = response.json().await?;
        Ok(parsed.data.unwrap_or_default())
    }

    /// Resale restrictions of the given collectible items
    pub async fn marketplace_item_details(
        &self,
        item_ids: &[String],
    ) -> Result<Vec<MarketplaceItemDetails>> {
        let url = format!("{}/marketplace-items/v1/items/details", self.endpoints.apis);
        let body = ItemDetailsRequest { item_ids };
        let response = self.request(Method::POST, &url).await.json(&body).send().await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        let details: Vec<MarketplaceItemDetails> = response.json().await?;
        debug!("Fetched marketplace details of {} item(s)", details.len());
        Ok(details)
    }

    /// List a collectible for resale at `price`.
    ///
    /// Only transport failures are errors; the status is returned as-is for
    /// the caller to classify.
    pub async fn put_on_sale(&self, handle: &ListingHandle, price: u64) -> Result<StatusCode> {
        self.patch_resale(handle, true, Some(price)).await
    }

    /// Cancel the resale listing of a collectible
    pub async fn take_off_sale(&self, handle: &ListingHandle) -> Result<StatusCode> {
        self.patch_resale(handle, false, None).await
    }

    async fn patch_resale(
        &self,
        handle: &ListingHandle,
        on_sale: bool,
        price: Option<u64>,
    ) -> Result<StatusCode> {
        let url = format!(
            "{}/marketplace-sales/v1/item/{}/instance/{}/resale",
            self.endpoints.apis, handle.item_id, handle.instance_id
        );
        let payload = ResalePayload {
            collectible_product_id: &handle.product_id,
            is_on_sale: on_sale,
            price,
            seller_id: self.user_id(),
            seller_type: "User",
        };

        let response = self
            .request(Method::PATCH, &url)
            .await
            .json(&payload)
            .send()
            .await?;

        debug!(
            "Resale update for instance {} (on sale: {}) returned {}",
            handle.instance_id,
            on_sale,
            response.status()
        );
        Ok(response.status())
    }
}
