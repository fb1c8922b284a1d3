//! Credential handling: csrf token rotation, account lookup, premium check

use log::{debug, info, warn};
use reqwest::Method;

use super::models::AuthenticatedUser;
use super::{Session, UserInfo, CSRF_HEADER};
use crate::error::{Error, Result};

impl Session {
    /// Fetch a fresh csrf token.
    ///
    /// The login endpoint rejects the empty request but always answers with
    /// a token header. The current token is only replaced once a new one
    /// arrives, so a failed refresh keeps it. Safe to call redundantly.
    pub async fn refresh_token(&self) -> Result<()> {
        let url = format!("{}/v1/login", self.endpoints.auth);
        let response = self.request(Method::POST, &url).await.send().await?;

        let token = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match token {
            Some(token) => {
                debug!("Refreshed csrf token");
                self.store_csrf_token(Some(token)).await;
                Ok(())
            }
            None => {
                warn!("Login endpoint answered {} without a csrf token", response.status());
                Err(Error::MissingCsrfToken)
            }
        }
    }

    /// Resolve the account the cookie belongs to
    pub(crate) async fn fetch_user_info(&self) -> Result<UserInfo> {
        info!("Checking cookie to be valid");
        let url = format!("{}/v1/users/authenticated", self.endpoints.users);
        let response = self.request(Method::GET, &url).await.send().await?;

        if !response.status().is_success() {
            debug!("Authenticated user lookup failed: {}", response.status());
            return Err(Error::InvalidCredential);
        }

        let user: AuthenticatedUser = response
            .json()
            .await
            .map_err(|_| Error::InvalidCredential)?;

        Ok(UserInfo {
            id: user.id,
            name: user.name,
            display_name: user.display_name,
        })
    }

    /// Whether the account may resell limiteds
    pub async fn has_premium(&self) -> Result<bool> {
        info!("Checking premium owning");
        let url = format!(
            "{}/v1/users/{}/validate-membership",
            self.endpoints.premium,
            self.user_id()
        );
        let response = self.request(Method::GET, &url).await.send().await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        Ok(response.json::<bool>().await?)
    }
}
