//! Preferences the backend infers about the user over the conversation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Facts learned about the user's taste and context.
///
/// The backend may return a sparse update alongside search results; it is
/// folded into the stored copy with [`LearnedPreferences::merge`]. A field is
/// only ever overwritten by a non-null, non-empty value, so partial updates
/// never erase what was learned earlier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LearnedPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climate: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub favorite_colors: Vec<String>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    /// Sizes per category, e.g. `{"shirt": "M", "shoe": "10"}`.
    #[serde(default)]
    pub sizes: BTreeMap<String, String>,
}

impl LearnedPreferences {
    /// Fold a backend update into this set of preferences.
    ///
    /// Scalars are overwritten by the latest non-empty value, list fields are
    /// set-unioned (deduplicated, existing order preserved), and sizes are
    /// overwritten per key.
    pub fn merge(&mut self, update: &LearnedPreferences) {
        merge_scalar(&mut self.gender, &update.gender);
        merge_scalar(&mut self.age_range, &update.age_range);
        merge_scalar(&mut self.style, &update.style);
        merge_scalar(&mut self.climate, &update.climate);

        merge_set(&mut self.interests, &update.interests);
        merge_set(&mut self.use_cases, &update.use_cases);
        merge_set(&mut self.favorite_colors, &update.favorite_colors);
        merge_set(&mut self.dislikes, &update.dislikes);

        for (category, size) in &update.sizes {
            if !size.is_empty() {
                self.sizes.insert(category.clone(), size.clone());
            }
        }
    }

    /// Whether anything has been learned yet.
    pub fn is_empty(&self) -> bool {
        self == &LearnedPreferences::default()
    }
}

fn merge_scalar(existing: &mut Option<String>, update: &Option<String>) {
    if let Some(value) = update {
        if !value.is_empty() {
            *existing = Some(value.clone());
        }
    }
}

fn merge_set(existing: &mut Vec<String>, update: &[String]) {
    for value in update {
        if !value.is_empty() && !existing.iter().any(|v| v == value) {
            existing.push(value.clone());
        }
    }
}
