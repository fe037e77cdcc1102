//! Email digest batch run.
//!
//! One pass over the profiles opted into the requested frequency. Per-user
//! conditions that produce nothing to send are counted as skips, not errors;
//! a failed send is logged and skipped so one bad address cannot stall the
//! batch. Storage failures abort the remaining batch.

mod mailer;
mod template;

pub use mailer::{Mailer, OutboundEmail, ResendMailer, DEFAULT_MAILER_BASE};
pub use template::{build_digest_html, build_digest_text};

use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{error, info};

use crate::shows::{digest_window_end, group_into_shows};
use crate::store::{AppStore, DigestFrequency, StoredConcert};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestMode {
    Daily,
    Weekly,
}

impl DigestMode {
    /// Query-parameter parse; anything unrecognized falls back to weekly.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("daily") => DigestMode::Daily,
            _ => DigestMode::Weekly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestMode::Daily => "daily",
            DigestMode::Weekly => "weekly",
        }
    }

    pub fn window_days(&self) -> u64 {
        match self {
            DigestMode::Daily => 1,
            DigestMode::Weekly => 7,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            DigestMode::Daily => "Tonight in your city",
            DigestMode::Weekly => "Your shows this week",
        }
    }

    fn frequency(&self) -> DigestFrequency {
        match self {
            DigestMode::Daily => DigestFrequency::Daily,
            DigestMode::Weekly => DigestFrequency::Weekly,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestOutcome {
    pub sent: usize,
    pub skipped: usize,
}

/// Send the digest to every subscriber of `mode`.
pub async fn run_digest(
    store: &dyn AppStore,
    mailer: &dyn Mailer,
    app_url: &str,
    mode: DigestMode,
) -> Result<DigestOutcome> {
    let today = chrono::Local::now().date_naive();
    run_digest_from(store, mailer, app_url, mode, today).await
}

pub async fn run_digest_from(
    store: &dyn AppStore,
    mailer: &dyn Mailer,
    app_url: &str,
    mode: DigestMode,
    today: NaiveDate,
) -> Result<DigestOutcome> {
    let today_str = today.format("%Y-%m-%d").to_string();
    let window_end = digest_window_end(today, mode.window_days());

    let subscribers: Vec<_> = store
        .list_profiles()?
        .into_iter()
        .filter(|p| p.digest_preference == mode.frequency())
        .collect();
    if subscribers.is_empty() {
        info!("No {} digest subscribers", mode.as_str());
        return Ok(DigestOutcome::default());
    }

    let mut outcome = DigestOutcome::default();

    for profile in subscribers {
        let (Some(email), Some(city_id)) = (profile.email.as_deref(), profile.city_id) else {
            outcome.skipped += 1;
            continue;
        };

        let artist_set: HashSet<String> =
            store.get_user_artist_names(profile.id)?.into_iter().collect();
        if artist_set.is_empty() {
            outcome.skipped += 1;
            continue;
        }

        let concerts = store.concerts_in_window_for_city(city_id, &today_str, &window_end)?;
        let matched_rows: Vec<StoredConcert> = concerts
            .into_iter()
            .filter(|c| artist_set.contains(&c.artist_name))
            .collect();

        let shows = group_into_shows(&matched_rows);
        if shows.is_empty() {
            outcome.skipped += 1;
            continue;
        }

        let unsubscribe_url = format!(
            "{}/unsubscribe?uid={}",
            app_url.trim_end_matches('/'),
            profile.id
        );
        let outbound = OutboundEmail {
            to: email.to_string(),
            subject: mode.subject().to_string(),
            html: build_digest_html(&shows, &unsubscribe_url),
            text: build_digest_text(&shows),
        };

        match mailer.send(&outbound).await {
            Ok(()) => outcome.sent += 1,
            Err(err) => {
                error!("Failed to send digest to user {}: {}", profile.id, err);
                outcome.skipped += 1;
            }
        }
    }

    info!(
        "{} digest: {} sent, {} skipped",
        mode.as_str(),
        outcome.sent,
        outcome.skipped
    );
    Ok(outcome)
}
