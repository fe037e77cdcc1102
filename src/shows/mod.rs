//! Show grouping and match highlighting, shared by the week view, the month
//! view and the email digest.
//!
//! Concert rows are denormalized per (artist, show); every surface needs them
//! re-grouped into physical shows with "which bill entries matched" flags.
//! That derivation lives here exactly once so the three surfaces cannot
//! drift apart.

use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::normalize::normalize_artist_name;
use crate::store::StoredConcert;

/// One physical show, grouped from the user's matched concert rows.
#[derive(Debug, Clone)]
pub struct ShowGroup {
    pub show_id: String,
    /// Full display bill, from any one grouped row (all rows share it).
    pub bill: Vec<String>,
    /// Normalized names of the user's matched artists on this bill.
    pub matched: Vec<String>,
    pub venue: String,
    pub date: String,
    pub time: Option<String>,
    pub ticket_url: Option<String>,
}

/// A bill entry tagged for display.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BillEntry {
    pub name: String,
    pub is_match: bool,
}

/// A show ready for a JSON surface.
#[derive(Debug, Clone, Serialize)]
pub struct ShowView {
    pub show_id: String,
    pub bill: Vec<BillEntry>,
    pub venue: String,
    pub date: String,
    pub time: Option<String>,
    pub ticket_url: Option<String>,
}

impl ShowGroup {
    /// Tag each display bill name as matched iff its normalized form is in
    /// the accumulated matched set. This is the one place display names are
    /// normalized a second time; it only works because normalization is
    /// stable over its own output.
    pub fn bill_entries(&self) -> Vec<BillEntry> {
        let matched: HashSet<&str> = self.matched.iter().map(String::as_str).collect();
        self.bill
            .iter()
            .map(|name| BillEntry {
                name: name.clone(),
                is_match: matched.contains(normalize_artist_name(name).as_str()),
            })
            .collect()
    }

    pub fn into_view(self) -> ShowView {
        let bill = self.bill_entries();
        ShowView {
            show_id: self.show_id,
            bill,
            venue: self.venue,
            date: self.date,
            time: self.time,
            ticket_url: self.ticket_url,
        }
    }
}

/// Group matched concert rows into physical shows by `show_id` (falling back
/// to the row's own id), accumulating one matched artist per grouped row.
/// First-seen order is preserved, so date-ordered input stays date-ordered.
pub fn group_into_shows(rows: &[StoredConcert]) -> Vec<ShowGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, ShowGroup> = HashMap::new();

    for row in rows {
        let key = if row.show_id.is_empty() {
            row.id.to_string()
        } else {
            row.show_id.clone()
        };

        match groups.get_mut(&key) {
            Some(group) => group.matched.push(row.artist_name.clone()),
            None => {
                let bill = if row.bill.is_empty() {
                    vec![row.artist_name.clone()]
                } else {
                    row.bill.clone()
                };
                groups.insert(
                    key.clone(),
                    ShowGroup {
                        show_id: key.clone(),
                        bill,
                        matched: vec![row.artist_name.clone()],
                        venue: row.venue.clone(),
                        date: row.date.clone(),
                        time: row.time.clone(),
                        ticket_url: row.ticket_url.clone(),
                    },
                );
                order.push(key);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect()
}

/// Group items by their date, preserving first-seen date order.
pub fn group_by_date<T, F>(items: Vec<T>, date_of: F) -> Vec<(String, Vec<T>)>
where
    F: Fn(&T) -> &str,
{
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<T>> = HashMap::new();

    for item in items {
        let date = date_of(&item).to_string();
        if !grouped.contains_key(&date) {
            order.push(date.clone());
        }
        grouped.entry(date).or_default().push(item);
    }

    order
        .into_iter()
        .filter_map(|date| grouped.remove(&date).map(|items| (date, items)))
        .collect()
}

/// Last day of the month view's window: six months out.
pub fn month_window_end(today: NaiveDate) -> String {
    today
        .checked_add_months(Months::new(6))
        .unwrap_or(NaiveDate::MAX)
        .format("%Y-%m-%d")
        .to_string()
}

/// Exclusive end of a digest window `days` ahead.
pub fn digest_window_end(today: NaiveDate, days: u64) -> String {
    (today + chrono::Duration::days(days as i64))
        .format("%Y-%m-%d")
        .to_string()
}
