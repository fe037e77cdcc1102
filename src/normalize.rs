//! Artist name normalization.
//!
//! Both the library sync and the concert ingestion run display names through
//! this transform so that "The Black Lips" (streaming catalog) and
//! "The Black Lips" (listings site) resolve to the same matching key.
//! Display names are never normalized for presentation, only for matching.

/// Canonicalize an artist display name into a matching key.
///
/// Lowercases, collapses whitespace runs, strips a single leading "the ",
/// replaces " & " with " and " and folds curly apostrophes to the straight
/// form. Any input produces some output; an all-punctuation name can
/// normalize to the empty string.
pub fn normalize_artist_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;

    for c in name.chars() {
        if c.is_whitespace() {
            // Collapse runs and drop leading whitespace in one pass.
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        let c = match c {
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        };
        for lower in c.to_lowercase() {
            out.push(lower);
        }
    }

    let out = match out.strip_prefix("the ") {
        Some(stripped) => stripped.to_string(),
        None => out,
    };

    out.replace(" & ", " and ").trim().to_string()
}
