//! The user profile aggregate and its enumerated preference fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::learned::LearnedPreferences;
use crate::watchlist::Watchlist;

/// Maximum number of entries kept in the search history.
pub const SEARCH_HISTORY_CAP: usize = 50;

/// How price-conscious the user is when ranking recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSensitivity {
    Budget,
    #[default]
    Balanced,
    Premium,
}

impl PriceSensitivity {
    /// Get the wire/storage name for this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSensitivity::Budget => "budget",
            PriceSensitivity::Balanced => "balanced",
            PriceSensitivity::Premium => "premium",
        }
    }

    /// Parse a stored value, coercing anything unknown to the default.
    pub fn from_str(s: &str) -> Self {
        match s {
            "budget" => PriceSensitivity::Budget,
            "premium" => PriceSensitivity::Premium,
            _ => PriceSensitivity::Balanced,
        }
    }
}

impl<'de> Deserialize<'de> for PriceSensitivity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(PriceSensitivity::from_str(&s))
    }
}

/// Shipping speed/cost tradeoff preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingPreference {
    Fastest,
    #[default]
    Normal,
    Cheapest,
}

impl ShippingPreference {
    /// Get the wire/storage name for this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingPreference::Fastest => "fastest",
            ShippingPreference::Normal => "normal",
            ShippingPreference::Cheapest => "cheapest",
        }
    }

    /// Parse a stored value, coercing anything unknown to the default.
    pub fn from_str(s: &str) -> Self {
        match s {
            "fastest" => ShippingPreference::Fastest,
            "cheapest" => ShippingPreference::Cheapest,
            _ => ShippingPreference::Normal,
        }
    }
}

impl<'de> Deserialize<'de> for ShippingPreference {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ShippingPreference::from_str(&s))
    }
}

/// A simulated payment card. Never a real credential.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SavedCard {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card_type: String,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub last_four_digits: String,
}

/// Display/autofill identity details.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Shipping address used for checkout autofill simulation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default)]
    pub address_line: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
}

/// One recorded simulated purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseEntry {
    pub product_id: String,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub card_used: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_status: Option<String>,
}

/// One recorded search, newest entries first in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub result_count: usize,
}

/// The root user aggregate.
///
/// One profile per user, persisted wholesale on every mutation. Every field
/// carries a serde default so older persisted shapes remain loadable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub price_sensitivity: PriceSensitivity,
    #[serde(default)]
    pub shipping_preference: ShippingPreference,
    #[serde(default)]
    pub preferred_brands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_card: Option<SavedCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_info: Option<PersonalInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub learned: LearnedPreferences,
    #[serde(default)]
    pub purchase_history: Vec<PurchaseEntry>,
    #[serde(default)]
    pub watchlist: Watchlist,
    #[serde(default)]
    pub search_history: Vec<SearchEntry>,
}

impl UserProfile {
    /// Record a search at the front of the history, evicting the oldest
    /// entries beyond [`SEARCH_HISTORY_CAP`].
    pub fn record_search(&mut self, query: impl Into<String>, result_count: usize) {
        self.search_history.insert(
            0,
            SearchEntry {
                query: query.into(),
                timestamp: Utc::now(),
                result_count,
            },
        );
        self.search_history.truncate(SEARCH_HISTORY_CAP);
    }

    /// Append a purchase to the history.
    pub fn record_purchase(&mut self, entry: PurchaseEntry) {
        self.purchase_history.push(entry);
    }

    /// Total amount spent across the purchase history.
    pub fn total_spent(&self) -> f64 {
        self.purchase_history.iter().map(|p| p.price).sum()
    }

    /// Spending rolled up by product category.
    pub fn spending_by_category(&self) -> BTreeMap<String, f64> {
        let mut by_category = BTreeMap::new();
        for purchase in &self.purchase_history {
            *by_category.entry(purchase.category.clone()).or_insert(0.0) += purchase.price;
        }
        by_category
    }
}
