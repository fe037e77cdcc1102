//! Match engine: intersect each user's artist library with their city's
//! upcoming concerts.
//!
//! Full recompute on every invocation; correctness rests on the match edges
//! being idempotent upserts, not on diffing. Stored `artist_name` is already
//! normalized by the row builder, so matching is exact set membership with no
//! re-normalization here.

use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::store::AppStore;

/// Hand-off from an ingestion run into matching.
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    pub city_id: i64,
    pub upserted: usize,
}

/// The ingest stage hands off here directly after upserting concert rows;
/// no self-referential HTTP round trip.
pub fn run_match_after_ingest(store: &dyn AppStore, outcome: IngestOutcome) -> Result<usize> {
    debug!(
        "Match pass after ingesting {} rows for city {}",
        outcome.upserted, outcome.city_id
    );
    run_match(store)
}

/// Recompute matches for every user with a city set. Returns the number of
/// match edges written (counting re-asserted duplicates, which upsert away).
pub fn run_match(store: &dyn AppStore) -> Result<usize> {
    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    run_match_from(store, &today)
}

fn run_match_from(store: &dyn AppStore, today: &str) -> Result<usize> {
    let profiles = store.list_profiles()?;
    if profiles.is_empty() {
        return Ok(0);
    }

    let mut total = 0usize;

    for profile in profiles {
        let Some(city_id) = profile.city_id else {
            continue;
        };

        let artist_set: HashSet<String> =
            store.get_user_artist_names(profile.id)?.into_iter().collect();
        if artist_set.is_empty() {
            continue;
        }

        let upcoming = store.upcoming_concerts_for_city(city_id, today)?;
        if upcoming.is_empty() {
            continue;
        }

        let matching_ids: Vec<i64> = upcoming
            .iter()
            .filter(|concert| artist_set.contains(&concert.artist_name))
            .map(|concert| concert.id)
            .collect();
        if matching_ids.is_empty() {
            continue;
        }

        store.insert_matches(profile.id, &matching_ids)?;
        debug!(
            "Matched {} upcoming concerts for user {}",
            matching_ids.len(),
            profile.id
        );
        total += matching_ids.len();
    }

    info!("Match pass wrote {} match edges", total);
    Ok(total)
}
