use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bon::Builder;
use futures::StreamExt;
use tokio::time::Instant;
use tracing::info;
use tracing::info_span;
use tracing::warn;
use tracing::Instrument;

use crate::aggregate::finalize;
use crate::config::Config;
use crate::domain::Domain;
use crate::domain::ProbeTask;
use crate::domain::Technique;
use crate::expand::expand;
use crate::resolve::DnsQueryResolver;
use crate::resolve::HttpProbeResolver;
use crate::resolve::Resolve;
use crate::resolve::ResolveExt;
use crate::resolve::SystemLookupResolver;
use crate::resolve::TrafficCaptureResolver;
use crate::util::tokio::spawn_timeout;
use crate::Error;

/// A technique together with the worker pool that runs its probes.
#[derive(Clone)]
pub struct Pool {
    resolver: Arc<dyn Resolve + Send + Sync>,
    workers: usize,
    timeout: Duration,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("technique", &self.technique())
            .field("workers", &self.workers)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Pool {
    /// Runs at most `workers` probes at once, each bounded by `timeout`.
    pub fn new(
        resolver: impl Resolve + Send + Sync + 'static,
        workers: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            workers: workers.max(1),
            timeout,
        }
    }

    #[must_use]
    pub fn technique(&self) -> Technique {
        self.resolver.technique()
    }

    /// Runs a single task on its own Tokio task. Failures and timeouts are
    /// logged and count as an empty result.
    async fn probe(&self, task: ProbeTask) -> BTreeSet<Ipv4Addr> {
        let resolver = Arc::clone(&self.resolver);
        let label = task.to_string();
        let run = async move { resolver.resolve(task).collect::<BTreeSet<_>>().await }
            .in_current_span();
        match spawn_timeout(self.timeout, run).await {
            Ok(ips) => ips,
            Err(error) => {
                warn!(task = %label, "probe abandoned: {error:#}");
                BTreeSet::new()
            }
        }
    }
}

/// Runs every enabled technique against every domain and unions the results.
#[derive(Debug, Builder)]
pub struct Engine {
    pools: Vec<Pool>,

    /// Servers that per-server techniques fan out across.
    #[builder(default)]
    servers: Vec<Ipv4Addr>,

    /// Subdomain prefixes used by [`Engine::run`].
    #[builder(default)]
    prefixes: Vec<String>,

    /// Overall time budget; tasks still outstanding when it expires are
    /// abandoned.
    deadline: Option<Duration>,
}

impl Engine {
    /// Builds the pools for every technique enabled in `config`.
    ///
    /// # Errors
    ///
    /// - If a technique fails to build
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.probe_timeout();
        let mut techniques = config.techniques.clone();
        techniques.sort_unstable();
        techniques.dedup();

        let pools = techniques
            .into_iter()
            .map(|technique| -> Result<Pool> {
                let workers = config.workers.for_technique(technique);
                let pool = match technique {
                    Technique::DnsQuery => Pool::new(
                        DnsQueryResolver::new(config.dns_servers.iter().copied(), timeout),
                        workers,
                        timeout,
                    ),
                    Technique::HttpProbe => {
                        Pool::new(HttpProbeResolver::try_new(timeout)?, workers, timeout)
                    }
                    Technique::TrafficCapture => Pool::new(
                        TrafficCaptureResolver::new(
                            &config.capture,
                            config.capture_window(),
                            config.private_ranges,
                        ),
                        workers,
                        config.capture_window() + timeout,
                    ),
                    Technique::SystemResolver => Pool::new(SystemLookupResolver, workers, timeout),
                };
                Ok(pool)
            })
            .collect::<Result<Vec<_>>>()?;

        let engine = Engine::builder()
            .pools(pools)
            .servers(config.dns_servers.clone())
            .prefixes(config.prefixes.clone())
            .maybe_deadline(config.deadline())
            .build();
        Ok(engine)
    }

    /// Full pipeline: expand the base domains, resolve them all and order the
    /// result for display.
    ///
    /// # Errors
    ///
    /// - [`Error::NoResults`] if nothing resolved
    pub async fn run(&self, bases: &BTreeSet<Domain>) -> Result<Vec<String>, Error> {
        let domains = expand(bases, &self.prefixes);
        let ips = self.resolve_all(&domains).await?;
        finalize(&ips)
    }

    /// Resolves every domain with every pool concurrently.
    ///
    /// One task failing never cancels its siblings; the only failure is an
    /// empty union once everything has finished.
    ///
    /// # Errors
    ///
    /// - [`Error::NoResults`] if nothing resolved
    pub async fn resolve_all(&self, domains: &BTreeSet<Domain>) -> Result<BTreeSet<Ipv4Addr>, Error> {
        let deadline = self.deadline.map(|d| Instant::now() + d);

        let runs = self
            .pools
            .iter()
            .map(|pool| self.run_pool(pool, domains, deadline));
        let ips: BTreeSet<Ipv4Addr> = futures::future::join_all(runs)
            .await
            .into_iter()
            .flatten()
            .collect();

        if ips.is_empty() {
            return Err(Error::NoResults);
        }
        info!(count = ips.len(), "resolved addresses");
        Ok(ips)
    }

    /// Builds the cross product of `domains` and, for per-server techniques,
    /// the configured servers.
    #[must_use]
    pub fn tasks(&self, technique: Technique, domains: &BTreeSet<Domain>) -> Vec<ProbeTask> {
        let mut tasks = Vec::new();
        for domain in domains {
            let task = ProbeTask::new(domain.clone(), technique);
            if technique.per_server() {
                tasks.extend(self.servers.iter().map(|s| task.clone().with_server(*s)));
            } else {
                tasks.push(task);
            }
        }
        tasks
    }

    async fn run_pool(
        &self,
        pool: &Pool,
        domains: &BTreeSet<Domain>,
        deadline: Option<Instant>,
    ) -> BTreeSet<Ipv4Addr> {
        let technique = pool.technique();
        let tasks = self.tasks(technique, domains);
        let total = tasks.len();
        let span = info_span!("technique", %technique, indicatif.pb_show = true);

        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        let (ips, done) = futures::stream::iter(tasks)
            .map(|task| pool.probe(task))
            .buffer_unordered(pool.workers)
            .take_until(expired)
            .fold((BTreeSet::new(), 0usize), |(mut ips, done), found| async move {
                ips.extend(found);
                (ips, done + 1)
            })
            .instrument(span.clone())
            .await;

        span.in_scope(|| {
            if done < total {
                warn!(done, total, "deadline reached, abandoned outstanding probes");
            }
            info!(done, total, found = ips.len(), "technique finished");
        });
        ips
    }
}
