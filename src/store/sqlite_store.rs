//! SQLite implementation of the application store.

use super::models::{ArtistRef, DigestFrequency, Profile, ProviderTokens, StoredConcert};
use super::schema::APP_SCHEMAS;
use super::AppStore;
use crate::concerts::ConcertRow;
use crate::sqlite_persistence::{migrate, BASE_DB_VERSION};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqliteAppStore {
    conn: Arc<Mutex<Connection>>,
}

const CONCERT_COLUMNS: &str =
    "id, artist_name, venue, date, time, ticket_url, source_id, city_id, bill, show_id";

impl SqliteAppStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open application database")?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        if is_new_db {
            info!("Creating new application database at {:?}", path);
            APP_SCHEMAS.last().unwrap().create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION as i64;
            if db_version < 1 {
                anyhow::bail!(
                    "Application database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let schema = APP_SCHEMAS
                .iter()
                .find(|s| s.version == db_version as usize)
                .with_context(|| format!("Unknown application database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Application database schema validation failed for version {}",
                    db_version
                )
            })?;

            let current = APP_SCHEMAS.last().unwrap().version;
            if (db_version as usize) < current {
                info!(
                    "Migrating application database from version {} to {}",
                    db_version, current
                );
                migrate(&mut conn, APP_SCHEMAS, db_version as usize)?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Fresh database in memory, latest schema.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        APP_SCHEMAS.last().unwrap().create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        let digest_str: String = row.get("digest_preference")?;
        Ok(Profile {
            id: row.get("id")?,
            email: row.get("email")?,
            city_id: row.get("city_id")?,
            digest_preference: DigestFrequency::parse(&digest_str)
                .unwrap_or(DigestFrequency::Weekly),
        })
    }

    fn row_to_concert(row: &rusqlite::Row) -> rusqlite::Result<StoredConcert> {
        let bill_json: String = row.get("bill")?;
        Ok(StoredConcert {
            id: row.get("id")?,
            artist_name: row.get("artist_name")?,
            venue: row.get("venue")?,
            date: row.get("date")?,
            time: row.get("time")?,
            ticket_url: row.get("ticket_url")?,
            source_id: row.get("source_id")?,
            city_id: row.get("city_id")?,
            bill: serde_json::from_str(&bill_json).unwrap_or_default(),
            show_id: row.get("show_id")?,
        })
    }
}

impl AppStore for SqliteAppStore {
    fn ensure_city(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cities (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        let id = conn.query_row(
            "SELECT id FROM cities WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_city_id(&self, name: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let id = conn
            .query_row(
                "SELECT id FROM cities WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn create_profile(&self, email: Option<&str>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT INTO profiles (email) VALUES (?1)", params![email])?;
        Ok(conn.last_insert_rowid())
    }

    fn get_profile(&self, user_id: i64) -> Result<Option<Profile>> {
        let conn = self.conn.lock().unwrap();
        let profile = conn
            .query_row(
                "SELECT id, email, city_id, digest_preference FROM profiles WHERE id = ?1",
                params![user_id],
                Self::row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    fn list_profiles(&self) -> Result<Vec<Profile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, email, city_id, digest_preference FROM profiles ORDER BY id")?;
        let profiles = stmt
            .query_map([], Self::row_to_profile)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(profiles)
    }

    fn set_profile_email(&self, user_id: i64, email: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE profiles SET email = ?2 WHERE id = ?1",
            params![user_id, email],
        )?;
        Ok(())
    }

    fn set_profile_city(&self, user_id: i64, city_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE profiles SET city_id = ?2 WHERE id = ?1",
            params![user_id, city_id],
        )?;
        Ok(())
    }

    fn update_profile_settings(
        &self,
        user_id: i64,
        city_id: Option<i64>,
        digest: DigestFrequency,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE profiles SET city_id = ?2, digest_preference = ?3 WHERE id = ?1",
            params![user_id, city_id, digest.as_str()],
        )?;
        Ok(())
    }

    fn update_digest_preference(&self, user_id: i64, digest: DigestFrequency) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE profiles SET digest_preference = ?2 WHERE id = ?1",
            params![user_id, digest.as_str()],
        )?;
        Ok(())
    }

    fn insert_auth_token(&self, user_id: i64, token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_tokens (token, user_id) VALUES (?1, ?2)",
            params![token, user_id],
        )?;
        Ok(())
    }

    fn get_auth_token_user(&self, token: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let user_id = conn
            .query_row(
                "SELECT user_id FROM auth_tokens WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;
        Ok(user_id)
    }

    fn touch_auth_token(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_tokens SET last_used_at = datetime('now') WHERE token = ?1",
            params![token],
        )?;
        Ok(())
    }

    fn delete_auth_token(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])?;
        Ok(deleted > 0)
    }

    fn set_provider_tokens(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO provider_tokens (user_id, access_token, refresh_token)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                updated_at = datetime('now')",
            params![user_id, access_token, refresh_token],
        )?;
        Ok(())
    }

    fn set_provider_access_token(&self, user_id: i64, access_token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE provider_tokens
             SET access_token = ?2, updated_at = datetime('now')
             WHERE user_id = ?1",
            params![user_id, access_token],
        )?;
        Ok(())
    }

    fn get_provider_tokens(&self, user_id: i64) -> Result<Option<ProviderTokens>> {
        let conn = self.conn.lock().unwrap();
        let tokens = conn
            .query_row(
                "SELECT access_token, refresh_token FROM provider_tokens WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(ProviderTokens {
                        access_token: row.get(0)?,
                        refresh_token: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(tokens)
    }

    fn upsert_artists(&self, names: &[String]) -> Result<Vec<ArtistRef>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut out = Vec::with_capacity(names.len());
        {
            let mut insert = tx
                .prepare("INSERT INTO artists (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")?;
            let mut select = tx.prepare("SELECT id FROM artists WHERE name = ?1")?;
            for name in names {
                insert.execute(params![name])?;
                let id: i64 = select.query_row(params![name], |row| row.get(0))?;
                out.push(ArtistRef {
                    id,
                    name: name.clone(),
                });
            }
        }
        tx.commit()?;
        Ok(out)
    }

    fn link_user_artists(&self, user_id: i64, artist_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO user_artists (user_id, artist_id) VALUES (?1, ?2)",
            )?;
            for artist_id in artist_ids {
                insert.execute(params![user_id, artist_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_user_artist_names(&self, user_id: i64) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.name FROM user_artists ua
             JOIN artists a ON a.id = ua.artist_id
             WHERE ua.user_id = ?1",
        )?;
        let names = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        Ok(names)
    }

    fn count_user_artists(&self, user_id: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_artists WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn upsert_concerts(&self, rows: &[ConcertRow]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut upsert = tx.prepare(
                "INSERT INTO concerts
                    (artist_name, venue, date, time, ticket_url, source_id, city_id, bill, show_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(source_id) DO UPDATE SET
                    artist_name = excluded.artist_name,
                    venue = excluded.venue,
                    date = excluded.date,
                    time = excluded.time,
                    ticket_url = excluded.ticket_url,
                    city_id = excluded.city_id,
                    bill = excluded.bill,
                    show_id = excluded.show_id",
            )?;
            for row in rows {
                let bill_json = serde_json::to_string(&row.bill)?;
                upsert.execute(params![
                    row.artist_name,
                    row.venue,
                    row.date,
                    row.time,
                    row.ticket_url,
                    row.source_id,
                    row.city_id,
                    bill_json,
                    row.show_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn upcoming_concerts_for_city(
        &self,
        city_id: i64,
        from_date: &str,
    ) -> Result<Vec<StoredConcert>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM concerts
             WHERE city_id = ?1 AND date >= ?2
             ORDER BY date, id",
            CONCERT_COLUMNS
        ))?;
        let concerts = stmt
            .query_map(params![city_id, from_date], Self::row_to_concert)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(concerts)
    }

    fn concerts_in_window_for_city(
        &self,
        city_id: i64,
        from_date: &str,
        to_date: &str,
    ) -> Result<Vec<StoredConcert>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM concerts
             WHERE city_id = ?1 AND date >= ?2 AND date < ?3
             ORDER BY date, id",
            CONCERT_COLUMNS
        ))?;
        let concerts = stmt
            .query_map(params![city_id, from_date, to_date], Self::row_to_concert)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(concerts)
    }

    fn insert_matches(&self, user_id: i64, concert_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO user_concert_matches (user_id, concert_id) VALUES (?1, ?2)",
            )?;
            for concert_id in concert_ids {
                insert.execute(params![user_id, concert_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn matched_concerts_for_user(
        &self,
        user_id: i64,
        from_date: &str,
        to_date: Option<&str>,
    ) -> Result<Vec<StoredConcert>> {
        let conn = self.conn.lock().unwrap();
        let concerts = match to_date {
            Some(to_date) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT c.{} FROM concerts c
                     JOIN user_concert_matches m ON m.concert_id = c.id
                     WHERE m.user_id = ?1 AND c.date >= ?2 AND c.date <= ?3
                     ORDER BY c.date, c.id",
                    CONCERT_COLUMNS.replace(", ", ", c.")
                ))?;
                let x = stmt
                    .query_map(params![user_id, from_date, to_date], Self::row_to_concert)?
                    .collect::<rusqlite::Result<_>>()?;
                x
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT c.{} FROM concerts c
                     JOIN user_concert_matches m ON m.concert_id = c.id
                     WHERE m.user_id = ?1 AND c.date >= ?2
                     ORDER BY c.date, c.id",
                    CONCERT_COLUMNS.replace(", ", ", c.")
                ))?;
                let x = stmt
                    .query_map(params![user_id, from_date], Self::row_to_concert)?
                    .collect::<rusqlite::Result<_>>()?;
                x
            }
        };
        Ok(concerts)
    }
}
