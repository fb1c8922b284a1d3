//! Configuration file (`config.json`)
//!
//! Key names follow the config files users already have. Sections and keys
//! not listed here are ignored.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::catalog::SortKey;
use crate::error::{Error, Result};
use crate::pricing::{UnderCut, UnderCutKind};
use crate::sell::{RetryPolicy, SellOptions};
use crate::seller::SellerOptions;

fn default_true() -> bool {
    true
}

fn default_retries() -> u32 {
    3
}

fn default_rate_limit_backoff() -> u64 {
    30
}

fn default_failure_backoff() -> u64 {
    3
}

fn default_undercut_value() -> f64 {
    10.0
}

fn default_undercut_kind() -> UnderCutKind {
    UnderCutKind::Percent
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "Cookie", default)]
    pub cookie: String,
    #[serde(rename = "Auto_Sell", default)]
    pub auto_sell: AutoSellConfig,
    #[serde(rename = "Webhook", default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoSellConfig {
    /// Record handled entries in `seen`
    #[serde(rename = "Save_Progress", default = "default_true")]
    pub save_progress: bool,
    /// Leave collectibles that are already listed alone
    #[serde(rename = "Hide_OnSale", default)]
    pub hide_on_sale: bool,
    #[serde(rename = "Skip_If_Cheapest", default)]
    pub skip_if_cheapest: bool,
    #[serde(rename = "Sort_Items_By", default)]
    pub sort_items_by: SortKey,
    #[serde(rename = "Keep_Serials", default)]
    pub keep_serials: u64,
    #[serde(rename = "Keep_Copy", default)]
    pub keep_copy: usize,
    #[serde(rename = "Creators_Blacklist", default)]
    pub creators_blacklist: Vec<u64>,
    #[serde(rename = "Under_Cut", default)]
    pub under_cut: UnderCutConfig,
    #[serde(rename = "Retries", default = "default_retries")]
    pub retries: u32,
    #[serde(rename = "Rate_Limit_Backoff_Secs", default = "default_rate_limit_backoff")]
    pub rate_limit_backoff_secs: u64,
    #[serde(rename = "Failure_Backoff_Secs", default = "default_failure_backoff")]
    pub failure_backoff_secs: u64,
}

impl Default for AutoSellConfig {
    fn default() -> Self {
        Self {
            save_progress: true,
            hide_on_sale: false,
            skip_if_cheapest: false,
            sort_items_by: SortKey::Name,
            keep_serials: 0,
            keep_copy: 0,
            creators_blacklist: Vec::new(),
            under_cut: UnderCutConfig::default(),
            retries: default_retries(),
            rate_limit_backoff_secs: default_rate_limit_backoff(),
            failure_backoff_secs: default_failure_backoff(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnderCutConfig {
    #[serde(rename = "Type", default = "default_undercut_kind")]
    pub kind: UnderCutKind,
    #[serde(rename = "Value", default = "default_undercut_value")]
    pub value: f64,
}

impl Default for UnderCutConfig {
    fn default() -> Self {
        Self {
            kind: default_undercut_kind(),
            value: default_undercut_value(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    #[serde(rename = "OnBuy", default)]
    pub on_buy: Toggle,
    #[serde(rename = "OnSale", default)]
    pub on_sale: Toggle,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Toggle {
    #[serde(rename = "Enabled", default)]
    pub enabled: bool,
}

impl Config {
    /// Read, decode and validate the config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to load \"{}\" file: {}", path.display(), e))
        })?;
        let config = Self::from_json(&content)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to decode config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cookie.trim().is_empty() {
            return Err(Error::Config("Cookie can not be empty".to_string()));
        }

        let value = self.auto_sell.under_cut.value;
        if !value.is_finite() || value < 0.0 {
            return Err(Error::Config(
                "Under cut amount can not be less than 0".to_string(),
            ));
        }
        if self.auto_sell.under_cut.kind == UnderCutKind::Percent && value > 100.0 {
            return Err(Error::Config(
                "Under cut percentage can not exceed 100".to_string(),
            ));
        }
        Ok(())
    }

    pub fn undercut(&self) -> UnderCut {
        let under_cut = &self.auto_sell.under_cut;
        UnderCut::from_kind(under_cut.kind, under_cut.value)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.auto_sell.retries,
            rate_limit_backoff: Duration::from_secs(self.auto_sell.rate_limit_backoff_secs),
            failure_backoff: Duration::from_secs(self.auto_sell.failure_backoff_secs),
        }
    }

    pub fn seller_options(&self) -> SellerOptions {
        let auto_sell = &self.auto_sell;
        SellerOptions {
            save_progress: auto_sell.save_progress,
            sort_by: auto_sell.sort_items_by,
            keep_serials: auto_sell.keep_serials,
            keep_copies: auto_sell.keep_copy,
            creators_blacklist: auto_sell.creators_blacklist.iter().copied().collect(),
            undercut: self.undercut(),
            retry: self.retry_policy(),
            sell: SellOptions {
                skip_on_sale: auto_sell.hide_on_sale,
                skip_if_cheapest: auto_sell.skip_if_cheapest,
            },
            ..SellerOptions::default()
        }
    }
}
