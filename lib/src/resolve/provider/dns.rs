use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use hickory_resolver::config::NameServerConfig;
use hickory_resolver::config::NameServerConfigGroup;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::config::ResolverOpts;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::TokioResolver;

use crate::domain::Domain;
use crate::domain::ProbeTask;
use crate::domain::Technique;
use crate::resolve::Resolve;

const DNS_PORT: u16 = 53;

/// Resolves A records by querying one specific DNS server per task, never the
/// system-configured resolver.
#[derive(Clone)]
pub struct DnsQueryResolver {
    servers: HashMap<Ipv4Addr, TokioResolver>,
}

impl fmt::Debug for DnsQueryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsQueryResolver")
            .field("servers", &self.servers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Resolve for DnsQueryResolver {
    fn technique(&self) -> Technique {
        Technique::DnsQuery
    }

    fn resolve_fallible(&self, task: ProbeTask) -> BoxStream<'_, Result<Ipv4Addr>> {
        match task.server {
            Some(server) => self.resolve_domain(task.domain, server),
            None => futures::stream::iter([Err(anyhow!("dns query requires a server"))]).boxed(),
        }
    }
}

impl DnsQueryResolver {
    /// Creates one single-server resolver per address. Each query is attempted
    /// once and bounded by `timeout`.
    #[must_use]
    pub fn new(servers: impl IntoIterator<Item = Ipv4Addr>, timeout: Duration) -> Self {
        Self::with_port(servers, DNS_PORT, timeout)
    }

    /// Like [`DnsQueryResolver::new`], but queries every server on `port`.
    #[must_use]
    pub fn with_port(
        servers: impl IntoIterator<Item = Ipv4Addr>,
        port: u16,
        timeout: Duration,
    ) -> Self {
        let servers = servers
            .into_iter()
            .map(|server| {
                let addr = SocketAddr::new(IpAddr::V4(server), port);
                (server, single_server(addr, timeout))
            })
            .collect();
        Self { servers }
    }

    fn resolve_domain(&self, domain: Domain, server: Ipv4Addr) -> BoxStream<'_, Result<Ipv4Addr>> {
        try_stream! {
            let dns = self
                .servers
                .get(&server)
                .with_context(|| format!("no resolver configured for {server}"))?;
            let lookup = dns.ipv4_lookup(domain.as_str()).await?;
            for record in lookup.iter() {
                yield record.0;
            }
        }
        .boxed()
    }
}

/// A resolver with one UDP name server, sending each query exactly once.
fn single_server(addr: SocketAddr, timeout: Duration) -> TokioResolver {
    let group = NameServerConfigGroup::from(vec![NameServerConfig::new(addr, Protocol::Udp)]);
    let config = ResolverConfig::from_parts(None, vec![], group);

    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;
    opts.num_concurrent_reqs = 1;

    TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
        .with_options(opts)
        .build()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use hickory_resolver::proto::op::Message;
    use hickory_resolver::proto::op::MessageType;
    use hickory_resolver::proto::op::OpCode;
    use hickory_resolver::proto::op::Query;
    use hickory_resolver::proto::rr::rdata::A;
    use hickory_resolver::proto::rr::RData;
    use hickory_resolver::proto::rr::Record;
    use hickory_resolver::proto::rr::RecordType;
    use hickory_resolver::proto::serialize::binary::BinEncodable;
    use tokio::net::UdpSocket;

    use super::*;
    use crate::resolve::ResolveExt;

    /// Answers a single query with one A record and returns the question.
    async fn answer_once(socket: UdpSocket, answer: Ipv4Addr) -> Result<Query> {
        let mut buf = [0u8; 512];
        let (len, peer) = socket.recv_from(&mut buf).await?;
        let request = Message::from_vec(&buf[..len])?;
        let query = request.queries().first().cloned().context("empty question")?;

        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(request.recursion_desired())
            .set_recursion_available(true);
        response.add_query(query.clone());
        response.add_answer(Record::from_rdata(query.name().clone(), 300, RData::A(A(answer))));
        socket.send_to(&response.to_vec()?, peer).await?;

        Ok(query)
    }

    fn task(server: Ipv4Addr) -> ProbeTask {
        let domain = Domain::from_str("example.com").unwrap();
        ProbeTask::new(domain, Technique::DnsQuery).with_server(server)
    }

    #[tokio::test]
    async fn resolves_a_record_from_server() {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let answer = Ipv4Addr::new(93, 184, 216, 34);
        let server = tokio::spawn(answer_once(socket, answer));

        let resolver = DnsQueryResolver::with_port([Ipv4Addr::LOCALHOST], port, Duration::from_secs(5));
        let got = resolver.resolve_set(task(Ipv4Addr::LOCALHOST)).await;
        assert_eq!(got, [answer].into_iter().collect());

        let query = server.await.unwrap().unwrap();
        assert_eq!(query.query_type(), RecordType::A);
        assert_eq!(query.name().to_utf8().trim_end_matches('.'), "example.com");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn queries_only_the_given_server() {
        let first = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = first.local_addr().unwrap().port();
        let other = Ipv4Addr::new(127, 0, 0, 2);
        let second = UdpSocket::bind((other, port)).await.unwrap();
        let first = tokio::spawn(answer_once(first, Ipv4Addr::new(1, 1, 1, 1)));
        let second = tokio::spawn(answer_once(second, Ipv4Addr::new(2, 2, 2, 2)));

        let resolver =
            DnsQueryResolver::with_port([Ipv4Addr::LOCALHOST, other], port, Duration::from_secs(5));
        let got = resolver.resolve_set(task(other)).await;
        assert_eq!(got, [Ipv4Addr::new(2, 2, 2, 2)].into_iter().collect());

        second.await.unwrap().unwrap();
        assert!(!first.is_finished());
        first.abort();
    }

    #[tokio::test]
    async fn unresponsive_server_yields_nothing() {
        // Bound but never read from, so the query times out.
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = socket.local_addr().unwrap().port();

        let resolver =
            DnsQueryResolver::with_port([Ipv4Addr::LOCALHOST], port, Duration::from_millis(200));
        let got = resolver.resolve_set(task(Ipv4Addr::LOCALHOST)).await;
        assert!(got.is_empty());
        drop(socket);
    }

    #[tokio::test]
    async fn missing_server_yields_nothing() {
        let resolver = DnsQueryResolver::new([Ipv4Addr::new(127, 0, 0, 1)], Duration::from_secs(1));
        let domain = Domain::from_str("example.com").unwrap();

        let task = ProbeTask::new(domain.clone(), Technique::DnsQuery);
        assert!(resolver.resolve_set(task).await.is_empty());

        let task = ProbeTask::new(domain, Technique::DnsQuery).with_server(Ipv4Addr::new(9, 9, 9, 9));
        assert!(resolver.resolve_set(task).await.is_empty());
    }
}
