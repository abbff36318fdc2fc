use std::collections::BTreeSet;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Result;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::domain::Domain;
use crate::domain::ProbeTask;
use crate::domain::Technique;
use crate::resolve::Resolve;

#[derive(Debug, Clone)]
enum Answer {
    Ips(BTreeSet<Ipv4Addr>),
    Fail(String),
}

/// Answers probes from a fixed table, keyed by domain and optionally server.
///
/// Deterministic stand-in for any technique. Unknown domains yield nothing.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    technique: Technique,
    answers: HashMap<(Domain, Option<Ipv4Addr>), Answer>,
    delay: Option<Duration>,
}

impl Resolve for StaticResolver {
    fn technique(&self) -> Technique {
        self.technique
    }

    fn resolve_fallible(&self, task: ProbeTask) -> BoxStream<'_, Result<Ipv4Addr>> {
        try_stream! {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let answer = self
                .answers
                .get(&(task.domain.clone(), task.server))
                .or_else(|| self.answers.get(&(task.domain.clone(), None)));
            match answer {
                Some(Answer::Ips(ips)) => {
                    for ip in ips {
                        yield *ip;
                    }
                }
                Some(Answer::Fail(message)) => Err::<(), _>(anyhow!("{message}"))?,
                None => {}
            }
        }
        .boxed()
    }
}

impl StaticResolver {
    #[must_use]
    pub fn new(technique: Technique) -> Self {
        Self {
            technique,
            answers: HashMap::new(),
            delay: None,
        }
    }

    /// Answer probes for `domain` (through any server) with `ips`.
    #[must_use]
    pub fn with(mut self, domain: Domain, ips: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        self.answers
            .insert((domain, None), Answer::Ips(ips.into_iter().collect()));
        self
    }

    /// Answer probes for `domain` through `server` with `ips`.
    #[must_use]
    pub fn with_server(
        mut self,
        domain: Domain,
        server: Ipv4Addr,
        ips: impl IntoIterator<Item = Ipv4Addr>,
    ) -> Self {
        self.answers
            .insert((domain, Some(server)), Answer::Ips(ips.into_iter().collect()));
        self
    }

    /// Fail probes for `domain` with `message`.
    #[must_use]
    pub fn with_failure(mut self, domain: Domain, message: impl Into<String>) -> Self {
        self.answers
            .insert((domain, None), Answer::Fail(message.into()));
        self
    }

    /// Sleep before answering each probe.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}
