//! Listings page fixtures.

/// One show entry in the listings markup shape the scraper understands.
pub fn show_entry(artists: &[&str], datetime: &str, venue: &str, href: &str) -> String {
    let anchors: String = artists
        .iter()
        .map(|name| format!(r#"<a href="/artists/x">{}</a> "#, name))
        .collect();

    format!(
        r#"<div class="row vevent">
             <div class="bands summary">{}</div>
             <span class="value-title" title="{}"></span>
             <div class="fn org">{}</div>
             <a class="url" href="{}">details</a>
           </div>"#,
        anchors, datetime, venue, href
    )
}

/// A full listings page wrapping the given entries.
pub fn listings_page(entries: &[String]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Shows</title></head>
<body>
  <div class="shows">{}</div>
</body>
</html>"#,
        entries.join("\n")
    )
}
