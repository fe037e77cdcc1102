//! Persistence for the five core entities plus sessions and provider
//! credentials.
//!
//! Every write path is an idempotent upsert keyed on a stable natural key, so
//! overlapping cron invocations are safe without locking: the second insert of
//! the same `source_id` or (user, concert) edge is a no-op.

mod models;
mod schema;
mod sqlite_store;

pub use models::{ArtistRef, DigestFrequency, Profile, ProviderTokens, StoredConcert};
pub use sqlite_store::SqliteAppStore;

use anyhow::Result;

use crate::concerts::ConcertRow;

pub trait AppStore: Send + Sync {
    // ==================== Cities ====================

    /// Insert the city if missing; return its id either way.
    fn ensure_city(&self, name: &str) -> Result<i64>;

    fn get_city_id(&self, name: &str) -> Result<Option<i64>>;

    // ==================== Profiles ====================

    fn create_profile(&self, email: Option<&str>) -> Result<i64>;

    fn get_profile(&self, user_id: i64) -> Result<Option<Profile>>;

    fn list_profiles(&self) -> Result<Vec<Profile>>;

    fn set_profile_email(&self, user_id: i64, email: &str) -> Result<()>;

    fn set_profile_city(&self, user_id: i64, city_id: i64) -> Result<()>;

    fn update_profile_settings(
        &self,
        user_id: i64,
        city_id: Option<i64>,
        digest: DigestFrequency,
    ) -> Result<()>;

    /// The unsubscribe path: change only the digest preference.
    fn update_digest_preference(&self, user_id: i64, digest: DigestFrequency) -> Result<()>;

    // ==================== Sessions ====================

    fn insert_auth_token(&self, user_id: i64, token: &str) -> Result<()>;

    fn get_auth_token_user(&self, token: &str) -> Result<Option<i64>>;

    fn touch_auth_token(&self, token: &str) -> Result<()>;

    /// Returns whether a token was actually revoked.
    fn delete_auth_token(&self, token: &str) -> Result<bool>;

    // ==================== Provider credentials ====================

    fn set_provider_tokens(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<()>;

    fn set_provider_access_token(&self, user_id: i64, access_token: &str) -> Result<()>;

    fn get_provider_tokens(&self, user_id: i64) -> Result<Option<ProviderTokens>>;

    // ==================== Artists ====================

    /// Upsert by exact stored name; returns ids for every requested name,
    /// inserted or pre-existing.
    fn upsert_artists(&self, names: &[String]) -> Result<Vec<ArtistRef>>;

    /// Upsert (user, artist) edges, ignoring conflicts.
    fn link_user_artists(&self, user_id: i64, artist_ids: &[i64]) -> Result<()>;

    fn get_user_artist_names(&self, user_id: i64) -> Result<Vec<String>>;

    fn count_user_artists(&self, user_id: i64) -> Result<usize>;

    // ==================== Concerts ====================

    /// Upsert on `source_id` in one transaction; returns the row count of the
    /// payload (re-runs overwrite with identical data).
    fn upsert_concerts(&self, rows: &[ConcertRow]) -> Result<usize>;

    /// All concerts for a city with `date >= from_date`, date-ordered.
    fn upcoming_concerts_for_city(&self, city_id: i64, from_date: &str)
        -> Result<Vec<StoredConcert>>;

    /// Concerts for a city with `from_date <= date < to_date`, date-ordered.
    fn concerts_in_window_for_city(
        &self,
        city_id: i64,
        from_date: &str,
        to_date: &str,
    ) -> Result<Vec<StoredConcert>>;

    // ==================== Matches ====================

    /// Upsert (user, concert) match edges, ignoring conflicts.
    fn insert_matches(&self, user_id: i64, concert_ids: &[i64]) -> Result<()>;

    /// The user's matched concerts with `date >= from_date` (and
    /// `date <= to_date` when given), date-ordered.
    fn matched_concerts_for_user(
        &self,
        user_id: i64,
        from_date: &str,
        to_date: Option<&str>,
    ) -> Result<Vec<StoredConcert>>;
}
