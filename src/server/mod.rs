pub mod config;
mod cron_auth;
mod requests_logging;
pub mod server;
pub(crate) mod session;
pub mod state;

pub use config::ServerConfig;
pub use cron_auth::CronAuth;
pub use requests_logging::{log_requests, RequestsLoggingLevel};
pub use server::{make_app, run_server};
pub use session::Session;
