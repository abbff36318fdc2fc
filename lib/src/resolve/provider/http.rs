use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::domain::Domain;
use crate::domain::ProbeTask;
use crate::domain::Technique;
use crate::resolve::Resolve;

const MAX_REDIRECTS: usize = 10;

/// Discovers the peer address actually serving `https://<domain>/` by issuing
/// a HEAD request and reading the remote address of the final connection.
#[derive(Debug, Clone)]
pub struct HttpProbeResolver {
    client: Client,
    scheme: &'static str,
}

impl Resolve for HttpProbeResolver {
    fn technique(&self) -> Technique {
        Technique::HttpProbe
    }

    fn resolve_fallible(&self, task: ProbeTask) -> BoxStream<'_, Result<Ipv4Addr>> {
        self.probe(task.domain)
    }
}

impl HttpProbeResolver {
    /// # Errors
    ///
    /// - If the HTTP client fails to build
    pub fn try_new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .no_proxy()
            .build()
            .context("unable to build http client")?;
        Ok(Self {
            client,
            scheme: "https",
        })
    }

    /// Overrides the URL scheme, which is `https` by default.
    #[must_use]
    pub fn with_scheme(mut self, scheme: &'static str) -> Self {
        self.scheme = scheme;
        self
    }

    fn probe(&self, domain: Domain) -> BoxStream<'_, Result<Ipv4Addr>> {
        try_stream! {
            let url = format!("{}://{domain}/", self.scheme);
            let response = self.client.head(&url).send().await?;
            let peer = response
                .remote_addr()
                .with_context(|| format!("no peer address for {url}"))?;
            yield ipv4_peer(peer.ip())?;
        }
        .boxed()
    }
}

fn ipv4_peer(ip: IpAddr) -> Result<Ipv4Addr> {
    match ip {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(ip) => match ip.to_ipv4_mapped() {
            Some(ip) => Ok(ip),
            None => bail!("peer address {ip} is not IPv4"),
        },
    }
}
