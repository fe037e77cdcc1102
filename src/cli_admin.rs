//! Offline administration of the user database.
//!
//! Accounts and sessions are provisioned out-of-band (the identity provider
//! flow lives outside this server); this tool creates profiles, stores
//! provider credentials and issues the session tokens the server validates.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rand::Rng;
use rand_distr::Alphanumeric;
use std::path::PathBuf;

use showgoer::store::{AppStore, DigestFrequency, SqliteAppStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[command(name = "cli-admin")]
struct CliArgs {
    /// Path to the SQLite application database file.
    #[clap(value_parser = parse_path)]
    pub db_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a profile, optionally with an email address.
    AddUser { email: Option<String> },

    /// Shows all profiles.
    ListUsers,

    /// Sets a profile's email address.
    SetEmail { user_id: i64, email: String },

    /// Sets a profile's city, creating the city row if needed.
    SetCity { user_id: i64, city_name: String },

    /// Sets a profile's digest preference: daily, weekly or none.
    SetDigest { user_id: i64, preference: String },

    /// Stores a user's provider access (and optional refresh) token.
    SetProviderTokens {
        user_id: i64,
        access_token: String,
        refresh_token: Option<String>,
    },

    /// Issues a new session token for a user and prints it.
    IssueToken { user_id: i64 },

    /// Revokes a session token.
    RevokeToken { token: String },
}

fn generate_session_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

fn require_profile(store: &SqliteAppStore, user_id: i64) -> Result<()> {
    if store.get_profile(user_id)?.is_none() {
        bail!("no profile with id {}", user_id);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let store = SqliteAppStore::new(&args.db_path)?;

    match args.command {
        Command::AddUser { email } => {
            let user_id = store.create_profile(email.as_deref())?;
            println!("Created profile {}", user_id);
        }
        Command::ListUsers => {
            for profile in store.list_profiles()? {
                println!(
                    "{}\temail={}\tcity_id={}\tdigest={}",
                    profile.id,
                    profile.email.as_deref().unwrap_or("-"),
                    profile
                        .city_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    profile.digest_preference,
                );
            }
        }
        Command::SetEmail { user_id, email } => {
            require_profile(&store, user_id)?;
            store.set_profile_email(user_id, &email)?;
            println!("Updated email for profile {}", user_id);
        }
        Command::SetCity { user_id, city_name } => {
            require_profile(&store, user_id)?;
            let city_id = store.ensure_city(&city_name)?;
            store.set_profile_city(user_id, city_id)?;
            println!("Profile {} now in '{}' (city id {})", user_id, city_name, city_id);
        }
        Command::SetDigest {
            user_id,
            preference,
        } => {
            require_profile(&store, user_id)?;
            let Some(digest) = DigestFrequency::parse(&preference) else {
                bail!("invalid digest preference '{}' (daily, weekly or none)", preference);
            };
            store.update_digest_preference(user_id, digest)?;
            println!("Profile {} digest preference set to {}", user_id, digest);
        }
        Command::SetProviderTokens {
            user_id,
            access_token,
            refresh_token,
        } => {
            require_profile(&store, user_id)?;
            store.set_provider_tokens(user_id, &access_token, refresh_token.as_deref())?;
            println!("Stored provider tokens for profile {}", user_id);
        }
        Command::IssueToken { user_id } => {
            require_profile(&store, user_id)?;
            let token = generate_session_token();
            store.insert_auth_token(user_id, &token)?;
            println!("{}", token);
        }
        Command::RevokeToken { token } => {
            if store.delete_auth_token(&token)? {
                println!("Token revoked");
            } else {
                println!("Token not found");
            }
        }
    }

    Ok(())
}
