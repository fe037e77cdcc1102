use super::RequestsLoggingLevel;

#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    pub port: u16,
    pub requests_logging_level: RequestsLoggingLevel,
    /// Shared secret for the cron-invoked endpoints. With no secret
    /// configured those endpoints reject everything.
    pub cron_secret: Option<String>,
    /// Public base URL, used for unsubscribe links in digest emails.
    pub app_url: String,
    /// The city whose listings this deployment ingests.
    pub city_name: String,
}
