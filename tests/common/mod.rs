//! Common test infrastructure
//!
//! Spawns the real server on a random port, plus stub servers standing in
//! for the three upstreams: the listings page, the streaming provider and
//! the email provider. Tests only import from this module.
#![allow(dead_code)]

mod fixtures;
mod server;
mod stubs;

pub use fixtures::{listings_page, show_entry};
pub use server::{TestServer, TestUpstreams, CRON_SECRET, TEST_CITY};
pub use stubs::{spawn_listings_stub, spawn_mailer_stub, spawn_spotify_stub, MailerStub, SpotifyStub};
