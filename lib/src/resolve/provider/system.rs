use std::net::Ipv4Addr;
use std::net::SocketAddr;

use anyhow::Context;
use anyhow::Result;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::domain::Domain;
use crate::domain::ProbeTask;
use crate::domain::Technique;
use crate::resolve::Resolve;

/// Resolves through the host's default name resolution, yielding at most the
/// first IPv4 address it reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLookupResolver;

impl Resolve for SystemLookupResolver {
    fn technique(&self) -> Technique {
        Technique::SystemResolver
    }

    fn resolve_fallible(&self, task: ProbeTask) -> BoxStream<'_, Result<Ipv4Addr>> {
        lookup(task.domain)
    }
}

fn lookup(domain: Domain) -> BoxStream<'static, Result<Ipv4Addr>> {
    try_stream! {
        let mut addrs = tokio::net::lookup_host((domain.as_str(), 0))
            .await
            .with_context(|| format!("system lookup failed for {domain}"))?;
        let first = addrs.find_map(|addr| match addr {
            SocketAddr::V4(addr) => Some(*addr.ip()),
            SocketAddr::V6(_) => None,
        });
        if let Some(ip) = first {
            yield ip;
        }
    }
    .boxed()
}
