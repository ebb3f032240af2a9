//! Backend request and response types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use shopper_core::{
    BackendProduct, HistoryEntry, LearnedPreferences, PersonalInfo, ShippingAddress, UserProfile,
};

/// The profile fields the backend uses to personalize a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub price_sensitivity: String,
    pub shipping_preference: String,
    pub preferred_brands: Vec<String>,
}

impl ProfileSnapshot {
    /// Reduce a full profile to the snapshot sent with a search.
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            price_sensitivity: profile.price_sensitivity.as_str().to_string(),
            shipping_preference: profile.shipping_preference.as_str().to_string(),
            preferred_brands: profile.preferred_brands.clone(),
        }
    }
}

impl Default for ProfileSnapshot {
    fn default() -> Self {
        Self::from_profile(&UserProfile::default())
    }
}

/// Search request body.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub user_profile: ProfileSnapshot,
    pub conversation_history: Vec<HistoryEntry>,
}

impl SearchRequest {
    /// Create a request with a default profile and no history.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            user_profile: ProfileSnapshot::default(),
            conversation_history: Vec::new(),
        }
    }
}

/// A clarifying question returned instead of results.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FollowUpQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Search response. Either `products` is populated or `follow_up_question`
/// is present; both may carry a learned-preference update.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub agent_message: String,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub products: Vec<BackendProduct>,
    #[serde(default)]
    pub follow_up_question: Option<FollowUpQuestion>,
    #[serde(default)]
    pub learned_preferences: Option<LearnedPreferences>,
}

/// Purchase-record request body.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseRequest {
    pub product_id: String,
    pub product_name: String,
    pub price: f64,
    pub brand: String,
    pub category: String,
    pub card_nickname: String,
}

/// The record the backend creates for a simulated purchase.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseRecordInfo {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub shipping_status: Option<String>,
}

/// Purchase-record response.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseResponse {
    #[serde(default)]
    pub record: PurchaseRecordInfo,
}

/// One shipment status line.
#[derive(Debug, Clone, Deserialize)]
pub struct Shipment {
    pub product_id: String,
    pub shipping_status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShipmentsResponse {
    #[serde(default)]
    pub shipments: Vec<Shipment>,
}

/// Live price-tracking status from the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackingStatus {
    #[serde(default)]
    pub tracking_running: bool,
    #[serde(default)]
    pub user_active: bool,
    #[serde(default)]
    pub last_active: String,
    #[serde(default)]
    pub hours_until_pause: f64,
    #[serde(default)]
    pub watchlist_count: usize,
    #[serde(default)]
    pub purchase_count: usize,
    #[serde(default)]
    pub watchlist_interval_minutes: f64,
    #[serde(default)]
    pub purchase_interval_minutes: f64,
    #[serde(default)]
    pub recent_activity: Vec<serde_json::Value>,
}

/// A price-drop alert for a past purchase.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseAlert {
    pub product_id: String,
    pub product_name: String,
    pub purchased_price: f64,
    pub current_market_price: f64,
    pub savings: f64,
    pub drop_percent: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertsResponse {
    #[serde(default)]
    pub alerts: Vec<PurchaseAlert>,
}

/// Heartbeat acknowledgement. Largely ignored by callers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeartbeatResponse {
    #[serde(default)]
    pub tracking: bool,
    #[serde(default)]
    pub last_active: String,
}

/// Backend-computed spending overview.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpendingOverview {
    #[serde(default)]
    pub total_spent: f64,
    #[serde(default)]
    pub purchase_count: usize,
    #[serde(default)]
    pub by_category: BTreeMap<String, f64>,
    #[serde(default)]
    pub watchlist_count: usize,
}

/// One coupon for a product.
#[derive(Debug, Clone, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CouponsResponse {
    #[serde(default)]
    pub coupons: Vec<Coupon>,
}

/// Auto-checkout request body.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub product_name: String,
    pub personal_info: PersonalInfo,
    pub shipping_address: ShippingAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_with_results() {
        let json = r#"{
            "agent_message": "Found two jackets.",
            "thinking": "Cold climate, hiking.",
            "products": [{"id": "wj-001", "name": "Shell", "price": 99.0}],
            "learned_preferences": {"interests": ["hiking"]}
        }"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.products.len(), 1);
        assert!(response.follow_up_question.is_none());
        assert_eq!(
            response.learned_preferences.unwrap().interests,
            vec!["hiking"]
        );
    }

    #[test]
    fn test_search_response_with_follow_up() {
        let json = r#"{
            "agent_message": "One question first.",
            "follow_up_question": {
                "question": "What size?",
                "options": ["S", "M", "L"]
            }
        }"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert!(response.products.is_empty());
        let follow_up = response.follow_up_question.unwrap();
        assert_eq!(follow_up.question, "What size?");
        assert_eq!(follow_up.options, vec!["S", "M", "L"]);
    }

    #[test]
    fn test_profile_snapshot_wire_names() {
        let snapshot = ProfileSnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["price_sensitivity"], "balanced");
        assert_eq!(json["shipping_preference"], "normal");
    }

    #[test]
    fn test_purchase_response_tolerates_missing_fields() {
        let response: PurchaseResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(response.record.order_id.is_none());

        let response: PurchaseResponse =
            serde_json::from_str(r#"{"record": {"order_id": "ord-7"}}"#).unwrap();
        assert_eq!(response.record.order_id.as_deref(), Some("ord-7"));
    }

    #[test]
    fn test_tracking_status_tolerates_sparse_payload() {
        let status: TrackingStatus =
            serde_json::from_str(r#"{"tracking_running": true}"#).unwrap();
        assert!(status.tracking_running);
        assert_eq!(status.watchlist_count, 0);
    }
}
