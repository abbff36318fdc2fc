use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use anyhow::bail;
use serde::Deserialize;
use serde::Serialize;
use strum::Display;
use strum::EnumString;

/// A DNS hostname. Treated as an opaque token beyond being non-empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prepends a subdomain label. An empty prefix yields the bare domain.
    #[must_use]
    pub fn with_prefix(&self, prefix: &str) -> Domain {
        let prefix = prefix.trim_end_matches('.');
        if prefix.is_empty() {
            return self.clone();
        }
        Domain(format!("{prefix}.{}", self.0))
    }
}

impl FromStr for Domain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_suffix('.').unwrap_or(name);
        if name.is_empty() {
            bail!("domain must not be empty");
        }
        Ok(Self(name.to_owned()))
    }
}

impl TryFrom<String> for Domain {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Domain> for String {
    fn from(value: Domain) -> Self {
        value.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strategies for discovering the addresses behind a domain.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Technique {
    DnsQuery,
    HttpProbe,
    TrafficCapture,
    SystemResolver,
}

impl Technique {
    /// Whether probes of this technique fan out across every DNS server.
    #[must_use]
    pub fn per_server(self) -> bool {
        matches!(self, Technique::DnsQuery)
    }
}

/// A single unit of work: one domain, one technique and maybe one server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProbeTask {
    pub domain: Domain,
    pub technique: Technique,
    pub server: Option<Ipv4Addr>,
}

impl ProbeTask {
    #[must_use]
    pub fn new(domain: Domain, technique: Technique) -> Self {
        Self {
            domain,
            technique,
            server: None,
        }
    }

    #[must_use]
    pub fn with_server(mut self, server: Ipv4Addr) -> Self {
        self.server = Some(server);
        self
    }
}

impl fmt::Display for ProbeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.technique, self.domain)?;
        if let Some(server) = self.server {
            write!(f, "@{server}")?;
        }
        Ok(())
    }
}
