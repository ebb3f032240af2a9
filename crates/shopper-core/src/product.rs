//! Backend product records and their UI-facing shape.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A product exactly as the backend returns it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackendProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub brand: String,
    pub price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub shipping_eta: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub value_tag: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub why_recommended: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub available_coupons: u32,
    #[serde(default)]
    pub key_features: Vec<String>,
}

/// A product shaped for display.
///
/// Field names follow what the UI shows rather than the backend wire names;
/// [`UiProduct::from_backend`] performs the mapping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiProduct {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub brand: String,
    pub price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub shipping_eta: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub reviews: u32,
    #[serde(default)]
    pub tag: String,
    /// Why this product was recommended, falling back to the description.
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub coupons: u32,
    /// Key features as an ordered `feature_1`, `feature_2`, ... map for
    /// display as tags.
    #[serde(default)]
    pub features: IndexMap<String, String>,
}

impl UiProduct {
    /// Map a backend record into the display shape.
    pub fn from_backend(product: BackendProduct) -> Self {
        let explanation = if product.why_recommended.is_empty() {
            product.description
        } else {
            product.why_recommended
        };

        let features = product
            .key_features
            .into_iter()
            .enumerate()
            .map(|(i, feature)| (format!("feature_{}", i + 1), feature))
            .collect();

        Self {
            id: product.id,
            title: product.name,
            brand: product.brand,
            price: product.price,
            original_price: product.original_price,
            shipping_eta: product.shipping_eta,
            rating: product.rating,
            reviews: product.review_count,
            tag: product.value_tag,
            explanation,
            image_url: product.image_url,
            source: product.source_name,
            url: product.source_url,
            category: product.category,
            coupons: product.available_coupons,
            features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_product() -> BackendProduct {
        BackendProduct {
            id: "wj-001".to_string(),
            name: "Alpine Shell Jacket".to_string(),
            brand: "Northway".to_string(),
            price: 129.99,
            original_price: Some(159.99),
            shipping_eta: "2 days".to_string(),
            rating: 4.6,
            review_count: 812,
            value_tag: "best value".to_string(),
            description: "A waterproof shell.".to_string(),
            why_recommended: "Matches your cold-climate preference.".to_string(),
            image_url: None,
            source_name: "TrailShop".to_string(),
            source_url: "https://trailshop.example/wj-001".to_string(),
            category: "outdoor".to_string(),
            available_coupons: 2,
            key_features: vec!["waterproof".to_string(), "packable".to_string()],
        }
    }

    #[test]
    fn test_field_renames() {
        let ui = UiProduct::from_backend(backend_product());
        assert_eq!(ui.title, "Alpine Shell Jacket");
        assert_eq!(ui.reviews, 812);
        assert_eq!(ui.tag, "best value");
        assert_eq!(ui.source, "TrailShop");
        assert_eq!(ui.url, "https://trailshop.example/wj-001");
        assert_eq!(ui.coupons, 2);
    }

    #[test]
    fn test_explanation_prefers_why_recommended() {
        let ui = UiProduct::from_backend(backend_product());
        assert_eq!(ui.explanation, "Matches your cold-climate preference.");

        let mut plain = backend_product();
        plain.why_recommended = String::new();
        let ui = UiProduct::from_backend(plain);
        assert_eq!(ui.explanation, "A waterproof shell.");
    }

    #[test]
    fn test_key_features_become_numbered_map() {
        let ui = UiProduct::from_backend(backend_product());
        assert_eq!(ui.features.len(), 2);
        assert_eq!(ui.features["feature_1"], "waterproof");
        assert_eq!(ui.features["feature_2"], "packable");
        // Insertion order preserved for display.
        let keys: Vec<&String> = ui.features.keys().collect();
        assert_eq!(keys, vec!["feature_1", "feature_2"]);
    }

    #[test]
    fn test_original_price_defaults_to_none() {
        let json = r#"{"id": "x", "name": "Thing", "price": 9.5}"#;
        let product: BackendProduct = serde_json::from_str(json).unwrap();
        assert_eq!(product.original_price, None);
        let ui = UiProduct::from_backend(product);
        assert_eq!(ui.original_price, None);
    }
}
