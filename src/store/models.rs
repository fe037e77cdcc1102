//! Row models for the application store.

/// How often a user wants the email digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestFrequency {
    Daily,
    Weekly,
    None,
}

impl DigestFrequency {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(DigestFrequency::Daily),
            "weekly" => Some(DigestFrequency::Weekly),
            "none" => Some(DigestFrequency::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestFrequency::Daily => "daily",
            DigestFrequency::Weekly => "weekly",
            DigestFrequency::None => "none",
        }
    }
}

impl std::fmt::Display for DigestFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub id: i64,
    pub email: Option<String>,
    pub city_id: Option<i64>,
    pub digest_preference: DigestFrequency,
}

#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// An artist row as returned from an upsert, inserted or pre-existing.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRef {
    pub id: i64,
    pub name: String,
}

/// A concert row as persisted: one (artist, show) pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredConcert {
    pub id: i64,
    pub artist_name: String,
    pub venue: String,
    pub date: String,
    pub time: Option<String>,
    pub ticket_url: Option<String>,
    pub source_id: String,
    pub city_id: i64,
    pub bill: Vec<String>,
    pub show_id: String,
}
