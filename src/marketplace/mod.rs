//! Marketplace HTTP client
//!
//! [`Session`] carries the auth cookie, the rotating csrf token and the
//! authenticated user. It is handed explicitly to everything that talks to
//! the marketplace.

mod auth;
mod inventory;
pub mod models;
mod resale;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::header::COOKIE;
use reqwest::{Client, Method, RequestBuilder};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub use inventory::{asset_type_name, ASSET_TYPES};

/// Name of the auth cookie
const AUTH_COOKIE: &str = ".ROBLOSECURITY";
/// Header carrying the rotating csrf token
pub(crate) const CSRF_HEADER: &str = "x-csrf-token";

/// Base URLs of the marketplace services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub apis: String,
    pub auth: String,
    pub users: String,
    pub premium: String,
    pub inventory: String,
    pub catalog: String,
    pub economy: String,
    pub item_configuration: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            apis: "https://apis.roblox.com".to_string(),
            auth: "https://auth.roblox.com".to_string(),
            users: "https://users.roblox.com".to_string(),
            premium: "https://premiumfeatures.roblox.com".to_string(),
            inventory: "https://inventory.roblox.com".to_string(),
            catalog: "https://catalog.roblox.com".to_string(),
            economy: "https://economy.roblox.com".to_string(),
            item_configuration: "https://itemconfiguration.roblox.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Route every service to one base URL (local proxies, mock servers)
    pub fn uniform(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            apis: base.clone(),
            auth: base.clone(),
            users: base.clone(),
            premium: base.clone(),
            inventory: base.clone(),
            catalog: base.clone(),
            economy: base.clone(),
            item_configuration: base,
        }
    }
}

/// Authenticated account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub id: u64,
    pub name: String,
    pub display_name: String,
}

/// Shared marketplace session
pub struct Session {
    pub(crate) client: Client,
    pub(crate) endpoints: Endpoints,
    cookie: String,
    csrf_token: RwLock<Option<String>>,
    user: UserInfo,
}

impl Session {
    /// Session for an already known user. No request is made.
    pub fn with_user(cookie: String, endpoints: Endpoints, user: UserInfo) -> Self {
        Self {
            client: Client::new(),
            endpoints,
            cookie,
            csrf_token: RwLock::new(None),
            user,
        }
    }

    /// Fetch a csrf token and resolve the account behind `cookie`.
    ///
    /// Fails with [`crate::Error::InvalidCredential`] when the cookie is rejected.
    pub async fn login(cookie: String, endpoints: Endpoints) -> crate::Result<Self> {
        let mut session = Self::with_user(cookie, endpoints, UserInfo::default());
        session.refresh_token().await?;
        session.user = session.fetch_user_info().await?;
        debug!("Logged in as {} ({})", session.user.name, session.user.id);
        Ok(session)
    }

    pub fn user(&self) -> &UserInfo {
        &self.user
    }

    pub fn user_id(&self) -> u64 {
        self.user.id
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub async fn csrf_token(&self) -> Option<String> {
        self.csrf_token.read().await.clone()
    }

    pub(crate) async fn store_csrf_token(&self, token: Option<String>) {
        *self.csrf_token.write().await = token;
    }

    /// Request builder with auth cookie and current csrf token attached
    pub(crate) async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(COOKIE, format!("{AUTH_COOKIE}={}", self.cookie));

        if let Some(token) = self.csrf_token.read().await.as_deref() {
            builder = builder.header(CSRF_HEADER, token);
        }
        builder
    }

    /// Keep the csrf token fresh in the background
    pub fn spawn_token_refresher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately, login already fetched a token
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = session.refresh_token().await {
                    warn!("Failed to refresh csrf token: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
