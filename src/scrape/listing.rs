//! Listings page extraction.
//!
//! Knows where the ground truth lives in the listings markup and how to pull
//! it out robustly. Extraction is a pure function of (html, today) so it can
//! be tested offline against captured fixtures; fetching lives in the
//! [`super::ListingScraper`].

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

use super::html;

lazy_static! {
    static ref LISTING_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// One show entry as scraped, before expansion into per-artist concert rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawShow {
    /// Performer display names, in billing order.
    pub artists: Vec<String>,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// 12-hour start time ("07:00 PM"), or empty when the datetime did not parse.
    pub time: String,
    pub venue: String,
    pub show_url: Option<String>,
}

const DEFAULT_VENUE: &str = "Unknown Venue";

/// Extract future shows from a listings page.
///
/// Entries with no performers or no parseable date are dropped silently.
/// Entries dated strictly before `today` are dropped. A page without a single
/// show entry is an error: that is what a changed or broken page looks like,
/// and the whole scrape must fail rather than ingest nothing.
pub fn extract_shows(page_html: &str, origin: &str, today: NaiveDate) -> Result<Vec<RawShow>> {
    let entries = html::elements_with_classes(page_html, &["row", "vevent"]);
    if entries.is_empty() {
        bail!("no show entries found in listings page");
    }

    let mut shows = Vec::with_capacity(entries.len());

    for entry in &entries {
        let artists = extract_performers(entry.inner);
        let datetime = html::first_element_with_classes(entry.inner, &["value-title"])
            .and_then(|el| html::attr(el.attrs, "title"))
            .unwrap_or_default();

        if artists.is_empty() || datetime.is_empty() {
            continue;
        }

        let date = match datetime.split('T').next().and_then(parse_listing_date) {
            Some(date) => date,
            None => continue,
        };
        // Point-in-time filter: strictly past calendar days are gone,
        // today's shows stay regardless of time of day.
        if date < today {
            continue;
        }

        let venue = match html::first_element_with_classes(entry.inner, &["fn", "org"]) {
            Some(el) => html::text(el.inner),
            None => DEFAULT_VENUE.to_string(),
        };

        shows.push(RawShow {
            artists,
            date: date.format("%Y-%m-%d").to_string(),
            time: format_start_time(&datetime),
            venue,
            show_url: extract_show_url(entry.inner, origin),
        });
    }

    Ok(shows)
}

/// Performer names from the bill block.
///
/// Anchors carrying any class other than `non-profiled` are cross-links to
/// aggregator artist profiles, not performers on this bill.
fn extract_performers(entry_inner: &str) -> Vec<String> {
    let Some(bands) = html::first_element_with_classes(entry_inner, &["bands", "summary"]) else {
        return Vec::new();
    };

    html::elements_by_tag(bands.inner, "a")
        .iter()
        .filter(|a| {
            let classes = html::class_list(a.attrs);
            classes.is_empty() || classes.iter().any(|c| c == "non-profiled")
        })
        .map(|a| html::text(a.inner))
        .filter(|name| !name.is_empty())
        .collect()
}

fn extract_show_url(entry_inner: &str, origin: &str) -> Option<String> {
    let href = html::elements_by_tag(entry_inner, "a")
        .iter()
        .find(|a| html::class_list(a.attrs).iter().any(|c| c == "url"))
        .and_then(|a| html::attr(a.attrs, "href"))
        .or_else(|| {
            html::elements_by_tag(entry_inner, "a")
                .first()
                .and_then(|a| html::attr(a.attrs, "href"))
        })?;

    if href.is_empty() {
        return None;
    }
    if href.starts_with("http") {
        Some(href)
    } else {
        Some(format!("{}{}", origin, href))
    }
}

fn parse_listing_date(part: &str) -> Option<NaiveDate> {
    // Strict shape check first; chrono alone would accept "2025-5-1".
    if !LISTING_DATE.is_match(part) {
        return None;
    }
    NaiveDate::parse_from_str(part, "%Y-%m-%d").ok()
}

/// Render the entry's datetime as "hh:mm AM/PM"; an unparseable datetime
/// degrades to an empty time rather than dropping the show.
fn format_start_time(datetime: &str) -> String {
    let parsed = DateTime::parse_from_rfc3339(datetime)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(datetime, "%Y-%m-%dT%H:%M:%S"));

    match parsed {
        Ok(dt) => dt.format("%I:%M %p").to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(bands: &str, datetime: &str, venue: &str, url: &str) -> String {
        format!(
            r#"<div class="row vevent">
                 <div class="bands summary">{}</div>
                 <span class="value-title" title="{}"></span>
                 <div class="fn org">{}</div>
                 {}
               </div>"#,
            bands, datetime, venue, url
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 30).unwrap()
    }

    #[test]
    fn extracts_a_full_entry() {
        let page = entry(
            r#"<a href="/a/1">The Black Lips</a> <a class="non-profiled">Opener</a>"#,
            "2025-05-01T19:00:00-04:00",
            "Bowery Ballroom",
            r#"<a class="url" href="/shows/99">details</a>"#,
        );
        let shows = extract_shows(&page, "https://listings.example", today()).unwrap();
        assert_eq!(shows.len(), 1);
        let show = &shows[0];
        assert_eq!(show.artists, vec!["The Black Lips", "Opener"]);
        assert_eq!(show.date, "2025-05-01");
        assert_eq!(show.time, "07:00 PM");
        assert_eq!(show.venue, "Bowery Ballroom");
        assert_eq!(
            show.show_url.as_deref(),
            Some("https://listings.example/shows/99")
        );
    }

    #[test]
    fn profiled_artist_links_are_not_performers() {
        let page = entry(
            r#"<a class="profiled" href="/artists/5">Aggregator Link</a>
               <a href="/a/1">Real Act</a>"#,
            "2025-05-02T20:00:00-04:00",
            "Venue",
            "",
        );
        let shows = extract_shows(&page, "https://o", today()).unwrap();
        assert_eq!(shows[0].artists, vec!["Real Act"]);
    }

    #[test]
    fn yesterday_is_dropped_today_is_kept() {
        let page = format!(
            "{}{}",
            entry("<a>Past Act</a>", "2025-04-29T23:00:00-04:00", "V", ""),
            entry("<a>Tonight Act</a>", "2025-04-30T01:00:00-04:00", "V", ""),
        );
        let shows = extract_shows(&page, "https://o", today()).unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].artists, vec!["Tonight Act"]);
    }

    #[test]
    fn unparseable_time_degrades_to_empty() {
        let page = entry("<a>Act</a>", "2025-05-03Tlate", "V", "");
        // Date prefix "2025-05-03" still parses; the time portion does not.
        let shows = extract_shows(&page, "https://o", today()).unwrap();
        assert_eq!(shows[0].date, "2025-05-03");
        assert_eq!(shows[0].time, "");
    }

    #[test]
    fn rows_without_artists_or_date_are_dropped() {
        let page = format!(
            "{}{}{}",
            entry("", "2025-05-01T19:00:00-04:00", "V", ""),
            entry("<a>Act</a>", "", "V", ""),
            entry("<a>Act</a>", "not-a-date", "V", ""),
        );
        let shows = extract_shows(&page, "https://o", today()).unwrap();
        assert!(shows.is_empty());
    }

    #[test]
    fn missing_venue_defaults() {
        let page = r#"<div class="row vevent">
                 <div class="bands summary"><a>Act</a></div>
                 <span class="value-title" title="2025-05-01T19:00:00-04:00"></span>
               </div>"#;
        let shows = extract_shows(page, "https://o", today()).unwrap();
        assert_eq!(shows[0].venue, DEFAULT_VENUE);
        assert_eq!(shows[0].show_url, None);
    }

    #[test]
    fn absolute_show_urls_pass_through() {
        let page = entry(
            "<a>Act</a>",
            "2025-05-01T19:00:00-04:00",
            "V",
            r#"<a class="url" href="https://tickets.example/1">t</a>"#,
        );
        let shows = extract_shows(&page, "https://o", today()).unwrap();
        assert_eq!(shows[0].show_url.as_deref(), Some("https://tickets.example/1"));
    }

    #[test]
    fn empty_page_is_an_error() {
        assert!(extract_shows("<html><body></body></html>", "https://o", today()).is_err());
    }
}
