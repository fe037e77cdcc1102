//! SQLite schema for the application database.

use crate::sqlite_persistence::{Column, ForeignKeyOnDelete, SqlType, Table, VersionedSchema};

const CITIES_TABLE: Table = Table {
    name: "cities",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("name", SqlType::Text).non_null().unique(),
    ],
    indices: &[],
    unique_constraints: &[],
};

const PROFILES_TABLE: Table = Table {
    name: "profiles",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("email", SqlType::Text),
        Column::new("city_id", SqlType::Integer).references(
            "cities",
            "id",
            ForeignKeyOnDelete::SetNull,
        ),
        Column::new("digest_preference", SqlType::Text)
            .non_null()
            .default_value("'weekly'"),
    ],
    indices: &[],
    unique_constraints: &[],
};

const AUTH_TOKENS_TABLE: Table = Table {
    name: "auth_tokens",
    columns: &[
        Column::new("token", SqlType::Text).primary_key(),
        Column::new("user_id", SqlType::Integer).non_null().references(
            "profiles",
            "id",
            ForeignKeyOnDelete::Cascade,
        ),
        Column::new("created_at", SqlType::Text)
            .non_null()
            .default_value("(datetime('now'))"),
        Column::new("last_used_at", SqlType::Text),
    ],
    indices: &[("idx_auth_tokens_user", "user_id")],
    unique_constraints: &[],
};

const PROVIDER_TOKENS_TABLE: Table = Table {
    name: "provider_tokens",
    columns: &[
        Column::new("user_id", SqlType::Integer).primary_key().references(
            "profiles",
            "id",
            ForeignKeyOnDelete::Cascade,
        ),
        Column::new("access_token", SqlType::Text).non_null(),
        Column::new("refresh_token", SqlType::Text),
        Column::new("updated_at", SqlType::Text)
            .non_null()
            .default_value("(datetime('now'))"),
    ],
    indices: &[],
    unique_constraints: &[],
};

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        // Identity is the exact stored name, not the normalized key.
        Column::new("name", SqlType::Text).non_null().unique(),
    ],
    indices: &[],
    unique_constraints: &[],
};

const USER_ARTISTS_TABLE: Table = Table {
    name: "user_artists",
    columns: &[
        Column::new("user_id", SqlType::Integer).non_null().references(
            "profiles",
            "id",
            ForeignKeyOnDelete::Cascade,
        ),
        Column::new("artist_id", SqlType::Integer).non_null().references(
            "artists",
            "id",
            ForeignKeyOnDelete::Cascade,
        ),
    ],
    indices: &[("idx_user_artists_user", "user_id")],
    unique_constraints: &[&["user_id", "artist_id"]],
};

const CONCERTS_TABLE: Table = Table {
    name: "concerts",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("artist_name", SqlType::Text).non_null(),
        Column::new("venue", SqlType::Text).non_null(),
        Column::new("date", SqlType::Text).non_null(),
        Column::new("time", SqlType::Text),
        Column::new("ticket_url", SqlType::Text),
        Column::new("source_id", SqlType::Text).non_null().unique(),
        Column::new("city_id", SqlType::Integer).non_null().references(
            "cities",
            "id",
            ForeignKeyOnDelete::Cascade,
        ),
        // JSON array of display names.
        Column::new("bill", SqlType::Text).non_null(),
        Column::new("show_id", SqlType::Text).non_null(),
    ],
    indices: &[("idx_concerts_city_date", "city_id, date")],
    unique_constraints: &[],
};

const USER_CONCERT_MATCHES_TABLE: Table = Table {
    name: "user_concert_matches",
    columns: &[
        Column::new("user_id", SqlType::Integer).non_null().references(
            "profiles",
            "id",
            ForeignKeyOnDelete::Cascade,
        ),
        Column::new("concert_id", SqlType::Integer).non_null().references(
            "concerts",
            "id",
            ForeignKeyOnDelete::Cascade,
        ),
    ],
    indices: &[("idx_matches_user", "user_id")],
    unique_constraints: &[&["user_id", "concert_id"]],
};

pub const APP_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        CITIES_TABLE,
        PROFILES_TABLE,
        AUTH_TOKENS_TABLE,
        PROVIDER_TOKENS_TABLE,
        ARTISTS_TABLE,
        USER_ARTISTS_TABLE,
        CONCERTS_TABLE,
        USER_CONCERT_MATCHES_TABLE,
    ],
    migration: None,
}];
