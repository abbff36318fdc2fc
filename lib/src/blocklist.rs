use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use reqwest::Client;
use tracing::debug;
use tracing::instrument;

use crate::Error;

/// Address that marks a blocked host in hosts-format listings.
pub const SENTINEL: &str = "127.0.0.1";

/// Extracts hostnames from a hosts-format listing.
///
/// Only lines starting with [`SENTINEL`] count; the hostname is the next
/// whitespace-separated token. Inline `#` comments are dropped. Order of
/// appearance is kept.
#[must_use]
pub fn parse_hosts(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.trim_start().strip_prefix(SENTINEL))
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .filter_map(|rest| {
            let rest = rest.split('#').next().unwrap_or_default();
            rest.split_whitespace().next()
        })
        .map(ToOwned::to_owned)
        .collect()
}

/// Downloads blocklists over HTTP(S).
#[derive(Debug, Clone)]
pub struct BlocklistFetcher {
    client: Client,
}

impl BlocklistFetcher {
    /// # Errors
    ///
    /// - If the HTTP client fails to build
    pub fn try_new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("unable to build http client")?;
        Ok(Self { client })
    }

    /// Fetches `url` and extracts its hostnames.
    ///
    /// # Errors
    ///
    /// - [`Error::Fetch`] if the request fails or the status is not a success
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<String>, Error> {
        let fetch_error = |source| Error::Fetch {
            url: url.to_owned(),
            source,
        };
        let text = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_error)?
            .text()
            .await
            .map_err(fetch_error)?;

        let hosts = parse_hosts(&text);
        debug!(count = hosts.len(), "parsed blocklist");
        Ok(hosts)
    }
}
