//! Typed accessors for the persisted client-state slots.
//!
//! Each slot is one row in the `client_state` key-value table, written
//! wholesale on every mutation. Loads are tolerant by design: an absent or
//! unparseable value falls back to the default shape rather than failing,
//! and the watchlist is backfilled so older persisted profiles stay loadable.

use sqlx::SqlitePool;
use tracing::warn;

use shopper_core::{ChatMessage, UiProduct, UserProfile};

use crate::Result;

/// The persisted client-state slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey {
    /// The whole [`UserProfile`] as a JSON blob.
    Profile,
    /// The ordered chat message list.
    Messages,
    /// Monotonic message-id counter, kept separate from the message list so
    /// ids never repeat even after the list is cleared or reloaded.
    MessageCounter,
    /// The most recent search's product result set.
    ProductCache,
    /// Whether the user has completed an initial search.
    HasSearched,
}

impl StateKey {
    /// All slots, in no particular order.
    pub const ALL: [StateKey; 5] = [
        StateKey::Profile,
        StateKey::Messages,
        StateKey::MessageCounter,
        StateKey::ProductCache,
        StateKey::HasSearched,
    ];

    /// Get the storage key for this slot.
    pub fn key_name(&self) -> &'static str {
        match self {
            StateKey::Profile => "profile",
            StateKey::Messages => "messages",
            StateKey::MessageCounter => "message_counter",
            StateKey::ProductCache => "product_cache",
            StateKey::HasSearched => "has_searched",
        }
    }
}

/// Read a raw slot value, if present.
pub async fn get_raw(pool: &SqlitePool, key: StateKey) -> Result<Option<String>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT value FROM client_state WHERE key = ?")
            .bind(key.key_name())
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(value,)| value))
}

/// Write a raw slot value, replacing any previous one.
pub async fn put_raw(pool: &SqlitePool, key: StateKey, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO client_state (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = datetime('now')
        "#,
    )
    .bind(key.key_name())
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a single slot.
pub async fn clear(pool: &SqlitePool, key: StateKey) -> Result<()> {
    sqlx::query("DELETE FROM client_state WHERE key = ?")
        .bind(key.key_name())
        .execute(pool)
        .await?;

    Ok(())
}

/// Clear every persisted slot together. This is the "reset conversation"
/// action: profile, messages, id counter, product cache, and the
/// has-searched flag all go at once.
pub async fn reset(pool: &SqlitePool) -> Result<()> {
    for key in StateKey::ALL {
        clear(pool, key).await?;
    }
    Ok(())
}

/// Load the profile, falling back to defaults when the slot is absent or
/// corrupt. Enum coercion happens during deserialization; the watchlist is
/// backfilled so items stored without a price history get one synthesized
/// from their current price.
pub async fn load_profile(pool: &SqlitePool) -> Result<UserProfile> {
    let mut profile = match get_raw(pool, StateKey::Profile).await? {
        Some(raw) => match serde_json::from_str::<UserProfile>(&raw) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Discarding unparseable stored profile: {}", e);
                UserProfile::default()
            }
        },
        None => UserProfile::default(),
    };

    profile.watchlist.backfill();
    Ok(profile)
}

/// Persist the whole profile.
pub async fn save_profile(pool: &SqlitePool, profile: &UserProfile) -> Result<()> {
    let raw = serde_json::to_string(profile)?;
    put_raw(pool, StateKey::Profile, &raw).await
}

/// Load the message list, falling back to empty on absence or corruption.
pub async fn load_messages(pool: &SqlitePool) -> Result<Vec<ChatMessage>> {
    match get_raw(pool, StateKey::Messages).await? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(messages) => Ok(messages),
            Err(e) => {
                warn!("Discarding unparseable stored messages: {}", e);
                Ok(Vec::new())
            }
        },
        None => Ok(Vec::new()),
    }
}

/// Persist the whole message list.
pub async fn save_messages(pool: &SqlitePool, messages: &[ChatMessage]) -> Result<()> {
    let raw = serde_json::to_string(messages)?;
    put_raw(pool, StateKey::Messages, &raw).await
}

/// Allocate the next message id and persist the counter.
pub async fn next_message_id(pool: &SqlitePool) -> Result<u64> {
    let current = get_raw(pool, StateKey::MessageCounter)
        .await?
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0);

    let next = current + 1;
    put_raw(pool, StateKey::MessageCounter, &next.to_string()).await?;
    Ok(next)
}

/// Load the cached product result set.
pub async fn load_product_cache(pool: &SqlitePool) -> Result<Vec<UiProduct>> {
    match get_raw(pool, StateKey::ProductCache).await? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(products) => Ok(products),
            Err(e) => {
                warn!("Discarding unparseable product cache: {}", e);
                Ok(Vec::new())
            }
        },
        None => Ok(Vec::new()),
    }
}

/// Persist the product result set.
pub async fn save_product_cache(pool: &SqlitePool, products: &[UiProduct]) -> Result<()> {
    let raw = serde_json::to_string(products)?;
    put_raw(pool, StateKey::ProductCache, &raw).await
}

/// Whether the user has completed an initial search.
pub async fn has_searched(pool: &SqlitePool) -> Result<bool> {
    Ok(get_raw(pool, StateKey::HasSearched)
        .await?
        .map(|raw| raw == "true")
        .unwrap_or(false))
}

/// Set the has-searched flag.
pub async fn set_has_searched(pool: &SqlitePool, value: bool) -> Result<()> {
    put_raw(
        pool,
        StateKey::HasSearched,
        if value { "true" } else { "false" },
    )
    .await
}
