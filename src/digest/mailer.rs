//! HTTP client for the transactional email provider.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_MAILER_BASE: &str = "https://api.resend.com";

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}

/// Mailer backed by a Resend-compatible HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl ResendMailer {
    pub fn new(api_key: &str, from: &str) -> Result<Self> {
        Self::with_base_url(api_key, from, DEFAULT_MAILER_BASE)
    }

    pub fn with_base_url(api_key: &str, from: &str, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to create mailer HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let body = SendEmailBody {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach email provider")?;

        if !response.status().is_success() {
            bail!("email provider returned status {}", response.status());
        }
        Ok(())
    }
}
