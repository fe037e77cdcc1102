//! Digest email rendering, HTML and plain text.

use chrono::NaiveDate;

use crate::shows::{group_by_date, ShowGroup};

const ACCENT: &str = "#2F4F3F";
const MUTED: &str = "#888";

/// "Thursday, May 1" from a `YYYY-MM-DD` date; unparseable dates render
/// verbatim rather than dropping the block.
fn format_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%A, %B %-d").to_string(),
        Err(_) => date.to_string(),
    }
}

fn format_bill_html(show: &ShowGroup) -> String {
    show.bill_entries()
        .iter()
        .map(|entry| {
            if entry.is_match {
                format!(
                    r#"<strong style="color:{};">{}</strong>"#,
                    ACCENT,
                    escape_html(&entry.name)
                )
            } else {
                format!(
                    r#"<span style="color:{};">{}</span>"#,
                    MUTED,
                    escape_html(&entry.name)
                )
            }
        })
        .collect::<Vec<_>>()
        .join(r#"<span style="color:#bbb;"> + </span>"#)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn build_digest_html(shows: &[ShowGroup], unsubscribe_url: &str) -> String {
    let mut date_blocks = String::new();

    for (date, date_shows) in group_by_date(shows.to_vec(), |s| s.date.as_str()) {
        let mut cards = String::new();
        for show in &date_shows {
            let time_str = show
                .time
                .as_deref()
                .map(|t| format!(" &middot; {}", t))
                .unwrap_or_default();
            let ticket_link = show
                .ticket_url
                .as_deref()
                .map(|url| {
                    format!(
                        r#"<a href="{}" style="display:inline-block;margin-top:10px;font-size:12px;color:{accent};text-decoration:none;border:1px solid {accent};border-radius:20px;padding:4px 12px;">Get tickets</a>"#,
                        escape_html(url),
                        accent = ACCENT
                    )
                })
                .unwrap_or_default();

            cards.push_str(&format!(
                r#"
            <div style="background:#fff;border-radius:12px;padding:20px 24px;margin-bottom:10px;border:1px solid #e8e2d9;">
              <p style="margin:0;font-size:16px;font-family:Georgia,serif;color:#2A2A2A;line-height:1.4;">{}</p>
              <p style="margin:6px 0 0;font-size:13px;color:{};font-family:system-ui,sans-serif;">{}{}</p>
              {}
            </div>"#,
                format_bill_html(show),
                MUTED,
                escape_html(&show.venue),
                time_str,
                ticket_link,
            ));
        }

        date_blocks.push_str(&format!(
            r#"
        <div style="margin-bottom:32px;">
          <p style="margin:0 0 12px;font-size:13px;font-weight:600;letter-spacing:0.06em;text-transform:uppercase;color:#999;font-family:system-ui,sans-serif;">{}</p>
          {}
        </div>"#,
            format_date(&date),
            cards,
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Your upcoming shows</title>
</head>
<body style="margin:0;padding:0;background:#F6F2EA;font-family:system-ui,-apple-system,sans-serif;">
  <table width="100%" cellpadding="0" cellspacing="0" style="background:#F6F2EA;padding:40px 16px;">
    <tr>
      <td align="center">
        <table width="100%" style="max-width:560px;">

          <!-- Header -->
          <tr>
            <td style="padding-bottom:32px;">
              <p style="margin:0;font-size:22px;font-family:Georgia,serif;font-weight:500;color:{accent};">Showgoer</p>
              <p style="margin:6px 0 0;font-size:14px;color:{muted};">Your upcoming shows</p>
            </td>
          </tr>

          <!-- Shows -->
          <tr>
            <td>{date_blocks}</td>
          </tr>

          <!-- Footer -->
          <tr>
            <td style="padding-top:32px;border-top:1px solid #e0d9ce;">
              <p style="margin:0;font-size:12px;color:#aaa;line-height:1.6;">
                You're getting this because you connected your music library to Showgoer.
                <br />
                <a href="{unsubscribe_url}" style="color:#aaa;">Manage email preferences</a>
              </p>
            </td>
          </tr>

        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#,
        accent = ACCENT,
        muted = MUTED,
        date_blocks = date_blocks,
        unsubscribe_url = escape_html(unsubscribe_url),
    )
}

pub fn build_digest_text(shows: &[ShowGroup]) -> String {
    let mut lines: Vec<String> = vec!["Your upcoming shows\n".to_string()];

    for (date, date_shows) in group_by_date(shows.to_vec(), |s| s.date.as_str()) {
        lines.push(format_date(&date));
        for show in &date_shows {
            let bill = show.bill.join(" + ");
            let time = show
                .time
                .as_deref()
                .map(|t| format!(" \u{b7} {}", t))
                .unwrap_or_default();
            lines.push(format!("  {} @ {}{}", bill, show.venue, time));
            if let Some(url) = &show.ticket_url {
                lines.push(format!("  Tickets: {}", url));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
