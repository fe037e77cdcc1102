//! Expansion of scraped shows into per-artist concert rows.
//!
//! Each show with N billed artists becomes N rows sharing a `show_id`; the
//! row's own `source_id` is a deterministic function of (artist, venue, date)
//! so repeated ingestion runs upsert instead of duplicating.

use std::collections::HashSet;

use crate::normalize::normalize_artist_name;
use crate::scrape::RawShow;

pub const SOURCE_PREFIX: &str = "omr";

// Key parts are truncated to bound key length. Two long names sharing a long
// sanitized prefix can collide; the key shape is load-bearing for upsert
// idempotence and must not change.
const VENUE_KEY_MAX: usize = 30;
const ARTIST_KEY_MAX: usize = 40;

/// One (artist, show) pairing ready for upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcertRow {
    /// Normalized artist name; this is the field matching compares against.
    pub artist_name: String,
    pub venue: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub time: Option<String>,
    pub ticket_url: Option<String>,
    /// Idempotency key: `omr:<artist>:<venue>:<date>`.
    pub source_id: String,
    pub city_id: i64,
    /// Full co-bill in display form, shared verbatim by all rows of a show.
    pub bill: Vec<String>,
    /// Groups co-billed rows into one physical event: `omr:<venue>:<date>`.
    pub show_id: String,
}

/// Lowercase, whitespace runs to a single hyphen, strip everything outside
/// `[a-z0-9-]`, truncate.
pub fn sanitize_key_part(s: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_len));
    let mut in_whitespace = false;
    for c in s.to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('-');
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            out.push(c);
        }
    }
    out.truncate(max_len);
    out
}

/// Expand raw shows into deduplicated concert rows for one city.
///
/// Artists whose normalized name is empty are skipped. Within one run the
/// first occurrence of a `source_id` wins, so a repeated artist on the same
/// bill (or the same show scraped twice) yields one row.
pub fn build_concert_rows(shows: &[RawShow], city_id: i64) -> Vec<ConcertRow> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows = Vec::new();

    for show in shows {
        let venue_part = sanitize_key_part(&show.venue, VENUE_KEY_MAX);
        let show_id = format!("{}:{}:{}", SOURCE_PREFIX, venue_part, show.date);

        for raw_artist in &show.artists {
            let artist_name = normalize_artist_name(raw_artist);
            if artist_name.is_empty() {
                continue;
            }

            let artist_part = sanitize_key_part(&artist_name, ARTIST_KEY_MAX);
            let source_id = format!(
                "{}:{}:{}:{}",
                SOURCE_PREFIX, artist_part, venue_part, show.date
            );
            if !seen.insert(source_id.clone()) {
                continue;
            }

            rows.push(ConcertRow {
                artist_name,
                venue: show.venue.clone(),
                date: show.date.clone(),
                time: if show.time.is_empty() {
                    None
                } else {
                    Some(show.time.clone())
                },
                ticket_url: show.show_url.clone(),
                source_id,
                city_id,
                bill: show.artists.clone(),
                show_id: show_id.clone(),
            });
        }
    }

    rows
}
