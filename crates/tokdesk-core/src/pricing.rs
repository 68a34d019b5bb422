//! Package price table.
//!
//! Packages are addressed by a stable site-count key and resolved by lookup.
//! Positional indexing is deliberately absent: removing a package from the
//! table must never shift the meaning of the remaining keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Stable package identifier: the number of sites the package covers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PackageKey(pub u32);

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-site", self.0)
    }
}

impl FromStr for PackageKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_suffix("-site").unwrap_or(s);
        digits.parse().map(Self)
    }
}

/// A purchasable service package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Stable key (site count).
    pub key: PackageKey,

    /// Display label.
    pub label: String,

    /// Token cost for non-subscribers.
    pub base_cost: i64,

    /// Token cost while an active, unexpired subscription is held.
    pub subscriber_cost: i64,

    /// Token cost of a rerun referencing an earlier order of this package.
    pub rerun_cost: i64,
}

/// Add-on prices applied on top of a package at order creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOnPrices {
    /// Verification add-on.
    pub verification: i64,
}

impl Default for AddOnPrices {
    fn default() -> Self {
        Self { verification: 25 }
    }
}

/// The package price table read at order-creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable {
    /// Packages keyed by site count.
    pub packages: BTreeMap<u32, Package>,

    /// Add-on prices.
    pub add_ons: AddOnPrices,
}

impl PriceTable {
    /// Look up a package by its stable key.
    #[must_use]
    pub fn get(&self, key: PackageKey) -> Option<&Package> {
        self.packages.get(&key.0)
    }

    /// All packages in key order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut packages = BTreeMap::new();
        for (sites, label, base, subscriber, rerun) in [
            (1u32, "Starter", 100i64, 80i64, 40i64),
            (3, "Plus", 250, 200, 100),
            (5, "Pro", 400, 320, 160),
            (10, "Agency", 700, 560, 280),
        ] {
            packages.insert(
                sites,
                Package {
                    key: PackageKey(sites),
                    label: label.to_string(),
                    base_cost: base,
                    subscriber_cost: subscriber,
                    rerun_cost: rerun,
                },
            );
        }
        Self {
            packages,
            add_ons: AddOnPrices::default(),
        }
    }
}
