//! End-to-end tests for the ingest → match → view → digest pipeline
//!
//! The listings page and the email provider are stubs; everything between
//! them is the real server against a real database.

mod common;

use common::{
    listings_page, show_entry, spawn_listings_stub, spawn_mailer_stub, TestServer, TestUpstreams,
    CRON_SECRET,
};
use reqwest::StatusCode;
use showgoer::store::{AppStore, DigestFrequency};

fn date_offset(days: i64) -> String {
    (chrono::Local::now().date_naive() + chrono::Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

/// A page with one co-billed future show, one solo future show and one
/// show from yesterday that must be filtered out.
fn fixture_page() -> String {
    listings_page(&[
        show_entry(
            &["The Black Lips", "Night Crickets"],
            &format!("{}T19:00:00-04:00", date_offset(1)),
            "Bowery Ballroom",
            "/shows/1",
        ),
        show_entry(
            &["Unwound"],
            &format!("{}T20:30:00-04:00", date_offset(3)),
            "Saint Vitus",
            "/shows/2",
        ),
        show_entry(
            &["Gone Act"],
            &format!("{}T21:00:00-04:00", date_offset(-1)),
            "Mercury Lounge",
            "/shows/3",
        ),
    ])
}

fn seed_library(server: &TestServer, user_id: i64, artists: &[&str]) {
    let refs = server
        .store
        .upsert_artists(&artists.iter().map(|s| s.to_string()).collect::<Vec<_>>())
        .unwrap();
    server
        .store
        .link_user_artists(user_id, &refs.iter().map(|a| a.id).collect::<Vec<_>>())
        .unwrap();
}

#[tokio::test]
async fn ingest_is_idempotent_and_matches_synced_users() {
    let listings_url = spawn_listings_stub(fixture_page()).await;
    let server = TestServer::spawn(TestUpstreams {
        listings_url,
        ..Default::default()
    })
    .await;

    let user = server.seed_user(Some("fan@example.com"), "session-1");
    seed_library(&server, user, &["black lips"]);

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/ingest-concerts", server.base_url))
        .bearer_auth(CRON_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    // Two future shows survive the date filter; three concert rows (two
    // co-billed + one solo).
    assert_eq!(body["shows"], 2);
    assert_eq!(body["concerts"], 3);
    assert_eq!(body["matches"]["count"], 1);

    // Second run upserts the same source_ids: still three stored rows.
    let response = client
        .post(format!("{}/api/ingest-concerts", server.base_url))
        .bearer_auth(CRON_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = server
        .store
        .upcoming_concerts_for_city(server.city_id, "1970-01-01")
        .unwrap();
    assert_eq!(stored.len(), 3);
    let black_lips = stored
        .iter()
        .find(|c| c.artist_name == "black lips")
        .unwrap();
    assert_eq!(
        black_lips.source_id,
        format!("omr:black-lips:bowery-ballroom:{}", date_offset(1))
    );
    assert_eq!(black_lips.bill, vec!["The Black Lips", "Night Crickets"]);
    // The past show never made it in.
    assert!(stored.iter().all(|c| c.artist_name != "gone act"));
}

#[tokio::test]
async fn weekly_view_highlights_matched_bill_entries() {
    let listings_url = spawn_listings_stub(fixture_page()).await;
    let server = TestServer::spawn(TestUpstreams {
        listings_url,
        ..Default::default()
    })
    .await;

    let user = server.seed_user(Some("fan@example.com"), "session-1");
    seed_library(&server, user, &["black lips"]);

    let client = reqwest::Client::new();
    client
        .post(format!("{}/api/ingest-concerts", server.base_url))
        .bearer_auth(CRON_SECRET)
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("{}/api/shows/weekly", server.base_url))
        .header("Authorization", "session-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["needs_sync"], false);
    let days = body["days"].as_array().unwrap();
    assert_eq!(days.len(), 1);

    let show = &days[0]["shows"][0];
    assert_eq!(show["venue"], "Bowery Ballroom");
    let bill = show["bill"].as_array().unwrap();
    assert_eq!(bill.len(), 2);
    assert_eq!(bill[0]["name"], "The Black Lips");
    assert_eq!(bill[0]["is_match"], true);
    assert_eq!(bill[1]["name"], "Night Crickets");
    assert_eq!(bill[1]["is_match"], false);
}

#[tokio::test]
async fn monthly_view_keys_shows_by_date() {
    let listings_url = spawn_listings_stub(fixture_page()).await;
    let server = TestServer::spawn(TestUpstreams {
        listings_url,
        ..Default::default()
    })
    .await;

    let user = server.seed_user(None, "session-1");
    seed_library(&server, user, &["black lips", "unwound"]);

    let client = reqwest::Client::new();
    client
        .post(format!("{}/api/ingest-concerts", server.base_url))
        .bearer_auth(CRON_SECRET)
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("{}/api/shows/monthly", server.base_url))
        .header("Authorization", "session-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    let days = body["days"].as_object().unwrap();
    assert_eq!(days.len(), 2);
    assert!(days.contains_key(&date_offset(1)));
    assert!(days.contains_key(&date_offset(3)));
}

#[tokio::test]
async fn digest_sends_one_email_per_matched_subscriber() {
    let listings_url = spawn_listings_stub(fixture_page()).await;
    let mailer = spawn_mailer_stub().await;
    let server = TestServer::spawn(TestUpstreams {
        listings_url,
        mailer_base: mailer.base_url.clone(),
        ..Default::default()
    })
    .await;

    let subscriber = server.seed_user(Some("fan@example.com"), "session-1");
    seed_library(&server, subscriber, &["black lips"]);
    server
        .store
        .update_digest_preference(subscriber, DigestFrequency::Weekly)
        .unwrap();

    // A second user with no matching artists gets skipped.
    let bystander = server.seed_user(Some("other@example.com"), "session-2");
    seed_library(&server, bystander, &["sun ra"]);

    let client = reqwest::Client::new();
    client
        .post(format!("{}/api/ingest-concerts", server.base_url))
        .bearer_auth(CRON_SECRET)
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/send-digest?mode=weekly", server.base_url))
        .bearer_auth(CRON_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["sent"], 1);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["mode"], "weekly");
    assert_eq!(body["window_days"], 7);

    assert_eq!(mailer.sent_count(), 1);
    let email = &mailer.received.lock().unwrap()[0];
    assert_eq!(email["to"], "fan@example.com");
    assert_eq!(email["subject"], "Your shows this week");
    let html = email["html"].as_str().unwrap();
    assert!(html.contains("The Black Lips"));
    assert!(html.contains(&format!("uid={}", subscriber)));
}

#[tokio::test]
async fn scrape_failure_aborts_ingestion_with_bad_gateway() {
    // Nothing listening at the listings URL.
    let server = TestServer::spawn(TestUpstreams::default()).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/ingest-concerts", server.base_url))
        .bearer_auth(CRON_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
    assert!(server
        .store
        .upcoming_concerts_for_city(server.city_id, "1970-01-01")
        .unwrap()
        .is_empty());
}
