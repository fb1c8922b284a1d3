//! Resale price computation
//!
//! Prices are whole currency units. The marketplace keeps half of every
//! resale, so the offered price is pulled down to the lowest value that still
//! pays out the same integer share before the category floor is applied.

use serde::Deserialize;

/// How far below the lowest competing resale to list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnderCut {
    /// Fixed amount subtracted from the lowest resale price
    Absolute(u64),
    /// Percentage of the lowest resale price subtracted
    Percent(f64),
}

impl Default for UnderCut {
    fn default() -> Self {
        UnderCut::Percent(10.0)
    }
}

impl UnderCut {
    /// Build from the config file's `Type` / `Value` pair
    pub fn from_kind(kind: UnderCutKind, value: f64) -> Self {
        match kind {
            UnderCutKind::Robux => UnderCut::Absolute(value.max(0.0).round() as u64),
            UnderCutKind::Percent => UnderCut::Percent(value),
        }
    }

    /// Candidate price before rounding and floor clamping
    pub fn apply(&self, lowest_resale: u64) -> u64 {
        match *self {
            UnderCut::Absolute(amount) => lowest_resale.saturating_sub(amount),
            UnderCut::Percent(percent) => {
                let lowest = lowest_resale as f64;
                let candidate = (lowest - lowest * percent / 100.0).round_ties_even();
                if candidate <= 0.0 {
                    0
                } else {
                    candidate as u64
                }
            }
        }
    }
}

/// Undercut type as spelled in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnderCutKind {
    Robux,
    Percent,
}

/// Lowest price paying out the same integer half as `price`.
///
/// Walks down one unit at a time while the half-share does not drop, then
/// steps back up once. Floor division matches the marketplace split, so
/// prices 0 and 1 both collapse to 0.
pub fn min_sale_price(price: u64) -> u64 {
    let mut price = price as i64;
    let profit = price.div_euclid(2);

    while price.div_euclid(2) >= profit {
        price -= 1;
    }

    (price + 1) as u64
}

/// Price to list at, never below the category `floor`.
///
/// Without any competing resale there is nothing to undercut and the floor is
/// used directly.
pub fn compute_price(lowest_resale: Option<u64>, floor: u64, undercut: UnderCut) -> u64 {
    let Some(lowest) = lowest_resale else {
        return floor;
    };

    min_sale_price(undercut.apply(lowest)).max(floor)
}
