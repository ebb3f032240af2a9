//! Profile persistence with an in-memory working copy.

use cartwheel_database::{state, Database};
use shopper_core::UserProfile;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;

/// The user profile, cached in memory and written back to the database
/// as a whole on every change.
///
/// Reads never touch the database after startup. Writes persist
/// immediately; a failed write keeps the in-memory copy current and is
/// logged rather than surfaced, so a transient disk problem does not
/// lose the turn.
pub struct ProfileStore {
    db: Database,
    profile: RwLock<UserProfile>,
}

impl ProfileStore {
    /// Load the stored profile, falling back to defaults when absent.
    pub async fn load(db: Database) -> Result<Self> {
        let profile = state::load_profile(db.pool()).await?;
        debug!(
            watchlist = profile.watchlist.len(),
            purchases = profile.purchase_history.len(),
            "profile loaded"
        );
        Ok(Self {
            db,
            profile: RwLock::new(profile),
        })
    }

    /// A snapshot of the current profile.
    pub async fn get(&self) -> UserProfile {
        self.profile.read().await.clone()
    }

    /// Apply a reducer to the profile and persist the result. All
    /// mutation funnels through here. Returns the updated snapshot.
    pub async fn update<F>(&self, f: F) -> UserProfile
    where
        F: FnOnce(UserProfile) -> UserProfile,
    {
        let mut guard = self.profile.write().await;
        *guard = f(std::mem::take(&mut *guard));
        let snapshot = guard.clone();
        drop(guard);
        if let Err(e) = state::save_profile(self.db.pool(), &snapshot).await {
            warn!("failed to persist profile: {}", e);
        }
        snapshot
    }

    /// Replace the profile wholesale (used by reset).
    pub async fn replace(&self, profile: UserProfile) {
        *self.profile.write().await = profile;
    }
}
