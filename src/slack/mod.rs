//! Client for the workspace Web API: rate-limited fetching, cursor
//! pagination and typed wrappers over the consumed methods.

pub mod api;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod pager;
pub mod transport;
pub mod types;

pub use api::{Fetched, SlackApi};
pub use config::SlackConfig;
pub use error::{ConfigError, SlackError};
pub use fetcher::RateLimitedFetcher;
pub use pager::Collected;
pub use transport::{RawResponse, ReqwestTransport, Sleeper, TokioSleeper, Transport};
pub use types::{DirectoryEntry, HistoryPage, SlackMessage};
