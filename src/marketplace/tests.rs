//! Tests for the marketplace client against a mock server.

use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::collectible::ListingHandle;
use crate::error::Error;

fn session_for(server: &MockServer) -> Session {
    Session::with_user(
        "cookie".to_string(),
        Endpoints::uniform(&server.uri()),
        UserInfo {
            id: 42,
            name: "seller".to_string(),
            display_name: "Seller".to_string(),
        },
    )
}

fn handle() -> ListingHandle {
    ListingHandle {
        item_id: "item-1".to_string(),
        instance_id: "inst-5".to_string(),
        product_id: "prod-1".to_string(),
    }
}

async fn mock_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/login"))
        .respond_with(ResponseTemplate::new(403).insert_header(CSRF_HEADER, token))
        .mount(server)
        .await;
}

// ── credentials ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_fetches_token_and_user() {
    let server = MockServer::start().await;
    mock_login(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/v1/users/authenticated"))
        .and(header("cookie", ".ROBLOSECURITY=cookie"))
        .and(header(CSRF_HEADER, "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "name": "seller",
            "displayName": "Seller"
        })))
        .mount(&server)
        .await;

    let session = Session::login("cookie".to_string(), Endpoints::uniform(&server.uri()))
        .await
        .unwrap();

    assert_eq!(session.user_id(), 42);
    assert_eq!(session.user().display_name, "Seller");
    assert_eq!(session.csrf_token().await.as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn test_login_rejects_unknown_cookie() {
    let server = MockServer::start().await;
    mock_login(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/v1/users/authenticated"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = Session::login("bad".to_string(), Endpoints::uniform(&server.uri())).await;
    assert!(matches!(result, Err(Error::InvalidCredential)));
}

#[tokio::test]
async fn test_refresh_without_token_header_keeps_current_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/login"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.store_csrf_token(Some("stale".to_string())).await;
    let result = session.refresh_token().await;

    assert!(matches!(result, Err(Error::MissingCsrfToken)));
    assert_eq!(session.csrf_token().await.as_deref(), Some("stale"));
}

#[tokio::test]
async fn test_failed_refresh_transport_keeps_current_token() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.store_csrf_token(Some("stale".to_string())).await;
    drop(server);

    assert!(session.refresh_token().await.is_err());
    assert_eq!(session.csrf_token().await.as_deref(), Some("stale"));
}

#[tokio::test]
async fn test_refresh_replaces_token() {
    let server = MockServer::start().await;
    mock_login(&server, "tok-2").await;

    let session = session_for(&server);
    session.store_csrf_token(Some("stale".to_string())).await;
    tokio_test::assert_ok!(session.refresh_token().await);
    tokio_test::assert_ok!(session.refresh_token().await);

    assert_eq!(session.csrf_token().await.as_deref(), Some("tok-2"));
}

#[tokio::test]
async fn test_premium_membership_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/42/validate-membership"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .mount(&server)
        .await;

    assert!(session_for(&server).has_premium().await.unwrap());
}

// ── inventory and catalog ────────────────────────────────────────────

#[tokio::test]
async fn test_inventory_walks_pages_and_drops_unserialized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/users/42/inventory/8"))
        .and(query_param("cursor", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageCursor": "page-2",
            "data": [
                {"assetId": 1, "assetName": "Sparkle Hat", "collectibleItemId": "item-1",
                 "collectibleItemInstanceId": "inst-1", "serialNumber": 7},
                {"assetId": 2, "assetName": "Plain Hat"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/users/42/inventory/8"))
        .and(query_param("cursor", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageCursor": null,
            "data": [
                {"assetId": 1, "assetName": "Sparkle Hat", "collectibleItemId": "item-1",
                 "collectibleItemInstanceId": "inst-2", "serialNumber": 9}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let assets = session_for(&server).user_inventory(8).await.unwrap();

    let serials: Vec<Option<u64>> = assets.iter().map(|a| a.serial_number).collect();
    assert_eq!(serials, vec![Some(7), Some(9)]);
}

#[tokio::test]
async fn test_inventory_keeps_partial_result_on_failing_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/users/42/inventory/41"))
        .and(query_param("cursor", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageCursor": "next",
            "data": [{"assetId": 3, "serialNumber": 1}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/users/42/inventory/41"))
        .and(query_param("cursor", "next"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let assets = session_for(&server).user_inventory(41).await.unwrap();
    assert_eq!(assets.len(), 1);
}

#[tokio::test]
async fn test_catalog_details_are_batched() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/catalog/items/details"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": 1,
                "name": "Sparkle Hat",
                "price": 100,
                "totalQuantity": 50,
                "lowestResalePrice": 300,
                "creatorTargetId": 9,
                "creatorName": "Builder",
                "assetType": 8
            }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let ids: Vec<u64> = (1..=130).collect();
    let details = session_for(&server).catalog_details(&ids).await.unwrap();

    assert_eq!(details.len(), 2);
    assert_eq!(details[0].lowest_resale_price, Some(300));
    assert_eq!(details[0].asset_type, Some(8));
}

#[tokio::test]
async fn test_price_floors_by_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/collectibles/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "limitedItemPriceFloors": {
                "Hat": {"priceFloor": 50},
                "BackAccessory": {"priceFloor": 35}
            }
        })))
        .mount(&server)
        .await;

    let floors = session_for(&server).price_floors().await.unwrap();

    assert_eq!(floors.get("Hat"), Some(&50));
    assert_eq!(floors.get("BackAccessory"), Some(&35));
}

#[test]
fn test_asset_type_names() {
    assert_eq!(asset_type_name(8), Some("Hat"));
    assert_eq!(asset_type_name(46), Some("BackAccessory"));
    assert_eq!(asset_type_name(1), None);
}

// ── resale ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_resellable_instances_query_and_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/marketplace-sales/v1/item/item-1/resellable-instances"))
        .and(query_param("ownerType", "User"))
        .and(query_param("ownerId", "42"))
        .and(query_param("limit", "100"))
        .and(query_param("cursor", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "itemInstances": [{
                "serialNumber": 5,
                "saleState": "OnSale",
                "price": 250,
                "collectibleItemId": "item-1",
                "collectibleInstanceId": "inst-5",
                "collectibleProductId": "prod-1"
            }],
            "nextPageCursor": null
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/marketplace-sales/v1/item/item-2/resellable-instances"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let session = session_for(&server);
    let page = session.resellable_instances("item-1", "").await.unwrap();
    assert_eq!(page.item_instances.len(), 1);
    assert_eq!(page.item_instances[0].sale_state, "OnSale");

    let err = session.resellable_instances("item-2", "").await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus(StatusCode::TOO_MANY_REQUESTS)));
}

#[tokio::test]
async fn test_put_on_sale_sends_listing_payload() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/marketplace-sales/v1/item/item-1/instance/inst-5/resale"))
        .and(body_json(json!({
            "collectibleProductId": "prod-1",
            "isOnSale": true,
            "price": 250,
            "sellerId": 42,
            "sellerType": "User"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let status = session_for(&server).put_on_sale(&handle(), 250).await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_put_on_sale_returns_status_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;

    let status = session_for(&server).put_on_sale(&handle(), 250).await.unwrap();
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_take_off_sale_omits_price() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/marketplace-sales/v1/item/item-1/instance/inst-5/resale"))
        .and(body_json(json!({
            "collectibleProductId": "prod-1",
            "isOnSale": false,
            "sellerId": 42,
            "sellerType": "User"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let status = session_for(&server).take_off_sale(&handle()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_resellers_and_resale_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/marketplace-sales/v1/item/item-1/resellers"))
        .and(query_param("limit", "99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"price": 300, "serialNumber": 12, "seller": {"sellerId": 7, "name": "other"}},
                {"price": 320, "seller": {"sellerId": 8}}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/marketplace-sales/v1/item/item-1/resale-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "recentAveragePrice": 310.4,
            "priceDataPoints": [{"value": 305, "date": "2026-01-02T00:00:00Z"}],
            "volumeDataPoints": []
        })))
        .mount(&server)
        .await;

    let session = session_for(&server);
    let resellers = session.resellers("item-1", 99).await.unwrap();
    assert_eq!(resellers[0].price, 300);
    assert_eq!(resellers[1].seller.seller_id, 8);

    let data = session.resale_data("item-1").await.unwrap();
    assert_eq!(data.recent_average_price, Some(310.4));
    assert_eq!(data.price_data_points[0].value, 305);
}

#[tokio::test]
async fn test_marketplace_item_details_posts_item_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/marketplace-items/v1/items/details"))
        .and(body_json(json!({"itemIds": ["item-1", "item-2"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"itemTargetId": 1, "resaleRestriction": 1},
            {"itemTargetId": 2}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let ids = vec!["item-1".to_string(), "item-2".to_string()];
    let details = session_for(&server).marketplace_item_details(&ids).await.unwrap();

    assert_eq!(details.len(), 2);
    assert_eq!(details[0].item_target_id, 1);
    assert_eq!(details[0].resale_restriction, 1);
    assert_eq!(details[1].resale_restriction, 0);
}

#[tokio::test]
async fn test_marketplace_item_details_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/marketplace-items/v1/items/details"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let result = session_for(&server)
        .marketplace_item_details(&["item-1".to_string()])
        .await;

    assert!(matches!(result, Err(Error::HttpStatus(StatusCode::TOO_MANY_REQUESTS))));
}

#[tokio::test]
async fn test_recent_sales_are_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/users/42/transactions"))
        .and(query_param("transactionType", "Sale"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "created": "2026-03-01T12:00:00Z",
                "details": {"id": 1, "type": "Asset"},
                "currency": {"amount": 175},
                "agent": {"id": 77, "name": "buyer"}
            }]
        })))
        .mount(&server)
        .await;

    let sales = session_for(&server).recent_sales(10).await.unwrap();

    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].details.kind, "Asset");
    assert_eq!(sales[0].currency.amount, 175);
    assert_eq!(sales[0].agent.id, 77);
}
