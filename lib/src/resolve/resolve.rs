use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use anyhow::Result;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;
use tracing::warn;

use crate::domain::ProbeTask;
use crate::domain::Technique;
use crate::util::combinator::flatten_err;

/// Map probe tasks to the IPv4 addresses they discover.
///
/// Implementors yield errors instead of giving up silently, and never retry;
/// additional attempts come from other tasks in the cross product.
pub trait Resolve {
    /// The technique this resolver implements.
    fn technique(&self) -> Technique;

    /// Run a probe task.
    fn resolve_fallible(&self, task: ProbeTask) -> BoxStream<'_, Result<Ipv4Addr>>;
}

/// An extension trait for [`Resolve`] that provides a variety of convenient
/// combinator functions.
pub trait ResolveExt: Resolve {
    /// Like [`Resolve::resolve_fallible`], but logs and elides all errors.
    fn resolve(&self, task: ProbeTask) -> BoxStream<'_, Ipv4Addr>;

    /// Collects all addresses into a new set.
    async fn resolve_set(&self, task: ProbeTask) -> BTreeSet<Ipv4Addr>;
}

impl<R> ResolveExt for R
where
    R: Resolve + ?Sized,
{
    fn resolve(&self, task: ProbeTask) -> BoxStream<'_, Ipv4Addr> {
        let technique = task.technique;
        let domain = task.domain.clone();
        let server = task.server;
        flatten_err(self.resolve_fallible(task), move |error| {
            warn!(%technique, %domain, ?server, "probe failed: {error:#}");
        })
        .inspect(move |ip| debug!(%technique, %ip, "probe resolved"))
        .boxed()
    }

    async fn resolve_set(&self, task: ProbeTask) -> BTreeSet<Ipv4Addr> {
        self.resolve(task).collect().await
    }
}
