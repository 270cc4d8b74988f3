pub mod chart;
pub mod fallback;
pub mod nse;

pub use chart::ChartClient;
pub use fallback::{FallbackPriceSource, QuoteClient};
pub use nse::NseClient;

use std::time::Duration;

use reqwest::Client;

use common::{Error, Result};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Shared HTTP client settings: rustls, browser user agent, cookie jar and a
/// hard per-request timeout.
pub(crate) fn build_http(timeout: Duration) -> Result<Client> {
    Client::builder()
        .use_rustls_tls()
        .user_agent(USER_AGENT)
        .cookie_store(true)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Http(e.to_string()))
}
