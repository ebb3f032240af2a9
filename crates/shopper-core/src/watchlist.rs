//! Watchlist price tracking: per-product history, deltas, and targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::product::UiProduct;

/// One observed price at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub date: DateTime<Utc>,
}

/// A tracked product. `product_id` is the unique key within a watchlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub product_id: String,
    pub product_name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source_url: String,
    pub current_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_price: Option<f64>,
    /// Append-only. The first entry is the price at watch time and is the
    /// baseline for drop/gain display. Never empty once the item exists.
    #[serde(default)]
    pub price_history: Vec<PricePoint>,
}

impl WatchlistItem {
    fn new(product: &UiProduct) -> Self {
        Self {
            product_id: product.id.clone(),
            product_name: product.title.clone(),
            brand: product.brand.clone(),
            category: product.category.clone(),
            source_url: product.url.clone(),
            current_price: product.price,
            target_price: None,
            price_history: vec![PricePoint {
                price: product.price,
                date: Utc::now(),
            }],
        }
    }

    /// The watch-time baseline price.
    pub fn first_price(&self) -> f64 {
        self.price_history
            .first()
            .map(|p| p.price)
            .unwrap_or(self.current_price)
    }

    /// Record a newly observed price. Appends a history entry and moves
    /// `current_price` only when the price actually changed.
    fn record_price(&mut self, price: f64) -> WatchOutcome {
        let previous = self.current_price;
        if price == previous {
            return WatchOutcome::AlreadyWatching;
        }
        self.price_history.push(PricePoint {
            price,
            date: Utc::now(),
        });
        self.current_price = price;
        WatchOutcome::Updated {
            previous,
            current: price,
        }
    }

    /// Derived read model for display. Comparisons use the raw stored values;
    /// rounding to two decimals happens only in the UI layer.
    pub fn view(&self) -> PriceView {
        let first = self.first_price();
        let delta = self.current_price - first;
        PriceView {
            delta,
            percent_change: if first > 0.0 { delta / first * 100.0 } else { 0.0 },
            is_drop: delta < 0.0,
            hit_target: self
                .target_price
                .map(|target| self.current_price <= target)
                .unwrap_or(false),
        }
    }
}

/// Computed price summary for a watchlist item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceView {
    pub delta: f64,
    pub percent_change: f64,
    pub is_drop: bool,
    pub hit_target: bool,
}

/// Result of watching a product or observing a fresh price for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WatchOutcome {
    /// The product was not tracked before and was added.
    Added,
    /// Already tracked and the price is unchanged.
    AlreadyWatching,
    /// Already tracked; the price moved and one history entry was appended.
    Updated { previous: f64, current: f64 },
}

/// The set of tracked products, unique by product id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watchlist(Vec<WatchlistItem>);

impl Watchlist {
    /// Watch a product. Watching an already-tracked product updates it in
    /// place instead of duplicating the entry.
    pub fn watch(&mut self, product: &UiProduct) -> WatchOutcome {
        match self.0.iter_mut().find(|item| item.product_id == product.id) {
            Some(item) => item.record_price(product.price),
            None => {
                self.0.push(WatchlistItem::new(product));
                WatchOutcome::Added
            }
        }
    }

    /// Record a freshly observed price for a product, if it is tracked.
    ///
    /// Used when a later search re-surfaces a tracked product. Rises are
    /// recorded as well as drops; the history has to stay accurate for the
    /// percent-change display.
    pub fn observe_price(&mut self, product_id: &str, price: f64) -> Option<WatchOutcome> {
        self.0
            .iter_mut()
            .find(|item| item.product_id == product_id)
            .map(|item| item.record_price(price))
    }

    /// Set or clear the target price for a tracked product.
    pub fn set_target_price(&mut self, product_id: &str, target: Option<f64>) -> bool {
        match self.0.iter_mut().find(|item| item.product_id == product_id) {
            Some(item) => {
                item.target_price = target;
                true
            }
            None => false,
        }
    }

    /// Stop tracking a product. Returns true if it was tracked.
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|item| item.product_id != product_id);
        self.0.len() < before
    }

    pub fn get(&self, product_id: &str) -> Option<&WatchlistItem> {
        self.0.iter().find(|item| item.product_id == product_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchlistItem> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of (baseline - current) over items whose price has dropped.
    pub fn total_potential_savings(&self) -> f64 {
        self.0
            .iter()
            .map(|item| item.first_price() - item.current_price)
            .filter(|saving| *saving > 0.0)
            .sum()
    }

    /// Repair items loaded from older persisted shapes: an item stored
    /// without a price history gets one synthesized from its current price.
    pub fn backfill(&mut self) {
        for item in &mut self.0 {
            if item.price_history.is_empty() {
                item.price_history.push(PricePoint {
                    price: item.current_price,
                    date: Utc::now(),
                });
            }
        }
    }
}
