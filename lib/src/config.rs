use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use ipnet::Ipv4Net;
use serde::Deserialize;
use serde::Serialize;

use crate::domain::Technique;
use crate::Error;

/// Public DNS servers queried directly, bypassing the system resolver.
pub const PUBLIC_DNS: [Ipv4Addr; 12] = [
    // Google
    Ipv4Addr::new(8, 8, 8, 8),
    Ipv4Addr::new(8, 8, 4, 4),
    // Cloudflare
    Ipv4Addr::new(1, 1, 1, 1),
    Ipv4Addr::new(1, 0, 0, 1),
    // Quad9
    Ipv4Addr::new(9, 9, 9, 9),
    Ipv4Addr::new(149, 112, 112, 112),
    // OpenDNS
    Ipv4Addr::new(208, 67, 222, 222),
    Ipv4Addr::new(208, 67, 220, 220),
    // AdGuard
    Ipv4Addr::new(94, 140, 14, 14),
    Ipv4Addr::new(94, 140, 15, 15),
    // Level3
    Ipv4Addr::new(4, 2, 2, 1),
    Ipv4Addr::new(4, 2, 2, 2),
];

pub const COMMON_PREFIXES: [&str; 6] = ["www", "api", "m", "svc", "media", "gateway"];

pub const BLOCKLISTS: [(&str, &str); 3] = [
    (
        "stevenblack",
        "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts",
    ),
    ("adaway", "https://adaway.org/hosts.txt"),
    (
        "yoyo",
        "https://pgl.yoyo.org/adservers/serverlist.php?hostformat=hosts&showintro=0&mimetype=plaintext",
    ),
];

/// Immutable settings for a run. Defaults are compiled in; every field may be
/// overridden from a config file or the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dns_servers: Vec<Ipv4Addr>,
    pub prefixes: Vec<String>,
    pub blocklists: BTreeMap<String, String>,
    pub techniques: Vec<Technique>,
    pub probe_timeout_secs: u64,
    pub capture_window_secs: u64,
    pub deadline_secs: Option<u64>,
    pub workers: Workers,
    pub capture: CaptureConfig,
    pub private_ranges: PrivateRanges,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dns_servers: PUBLIC_DNS.to_vec(),
            prefixes: COMMON_PREFIXES.iter().map(ToString::to_string).collect(),
            blocklists: BLOCKLISTS
                .iter()
                .map(|(name, url)| ((*name).to_owned(), (*url).to_owned()))
                .collect(),
            techniques: vec![
                Technique::DnsQuery,
                Technique::HttpProbe,
                Technique::SystemResolver,
            ],
            probe_timeout_secs: 5,
            capture_window_secs: 10,
            deadline_secs: None,
            workers: Workers::default(),
            capture: CaptureConfig::default(),
            private_ranges: PrivateRanges::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    #[must_use]
    pub fn capture_window(&self) -> Duration {
        Duration::from_secs(self.capture_window_secs.max(1))
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Looks up the URL of a named blocklist source.
    ///
    /// # Errors
    ///
    /// - If no source with that name is configured
    pub fn blocklist_url(&self, name: &str) -> Result<&str, Error> {
        self.blocklists
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownSource {
                name: name.to_owned(),
                known: self
                    .blocklists
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Worker pool size per technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workers {
    pub dns: usize,
    pub http: usize,
    pub capture: usize,
    pub system: usize,
}

impl Default for Workers {
    fn default() -> Self {
        Self {
            dns: 15,
            http: 5,
            capture: 2,
            system: 5,
        }
    }
}

impl Workers {
    #[must_use]
    pub fn for_technique(&self, technique: Technique) -> usize {
        let n = match technique {
            Technique::DnsQuery => self.dns,
            Technique::HttpProbe => self.http,
            Technique::TrafficCapture => self.capture,
            Technique::SystemResolver => self.system,
        };
        n.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Packet capture program, invoked tcpdump-style.
    pub program: String,
    pub interface: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            program: "tcpdump".to_owned(),
            interface: "any".to_owned(),
        }
    }
}

/// Which observed addresses the traffic capture discards as private.
///
/// `Loose` drops all of `172.0.0.0/8`, which also discards public addresses
/// outside `172.16.0.0/12`. It is the default because historical output was
/// produced that way; `Strict` uses the real RFC 1918 block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrivateRanges {
    #[default]
    Loose,
    Strict,
}

impl PrivateRanges {
    fn nets(self) -> [Ipv4Net; 3] {
        let middle = match self {
            PrivateRanges::Loose => Ipv4Net::new_assert(Ipv4Addr::new(172, 0, 0, 0), 8),
            PrivateRanges::Strict => Ipv4Net::new_assert(Ipv4Addr::new(172, 16, 0, 0), 12),
        };
        [
            Ipv4Net::new_assert(Ipv4Addr::new(10, 0, 0, 0), 8),
            middle,
            Ipv4Net::new_assert(Ipv4Addr::new(192, 168, 0, 0), 16),
        ]
    }

    #[must_use]
    pub fn excludes(self, ip: Ipv4Addr) -> bool {
        self.nets().iter().any(|net| net.contains(&ip))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_compiled_tables() {
        let config = Config::default();
        assert_eq!(config.dns_servers.len(), 12);
        assert_eq!(config.prefixes, COMMON_PREFIXES);
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.deadline(), None);
        assert_eq!(config.workers.for_technique(Technique::DnsQuery), 15);
        assert_eq!(config.workers.for_technique(Technique::HttpProbe), 5);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let text = r#"
            prefixes = ["www"]
            techniques = ["dns-query", "traffic-capture"]
            private_ranges = "strict"

            [workers]
            dns = 40
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.prefixes, vec!["www".to_owned()]);
        assert_eq!(
            config.techniques,
            vec![Technique::DnsQuery, Technique::TrafficCapture]
        );
        assert_eq!(config.private_ranges, PrivateRanges::Strict);
        assert_eq!(config.workers.dns, 40);
        assert_eq!(config.workers.http, 5);
        assert_eq!(config.dns_servers, PUBLIC_DNS.to_vec());
    }

    #[test]
    fn zero_workers_clamps_to_one() {
        let workers = Workers {
            dns: 0,
            ..Workers::default()
        };
        assert_eq!(workers.for_technique(Technique::DnsQuery), 1);
    }

    #[test]
    fn zero_durations_clamp_to_one_second() {
        let text = r"
            probe_timeout_secs = 0
            capture_window_secs = 0
        ";
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.probe_timeout(), Duration::from_secs(1));
        assert_eq!(config.capture_window(), Duration::from_secs(1));
    }

    #[test]
    fn blocklist_url_lookup() {
        let config = Config::default();
        assert!(config.blocklist_url("adaway").unwrap().starts_with("https://"));

        let error = config.blocklist_url("nope").unwrap_err();
        assert!(matches!(error, Error::UnknownSource { .. }));
        assert!(error.to_string().contains("stevenblack"));
    }

    #[rstest]
    #[case("10.0.0.5", true, true)]
    #[case("192.168.1.1", true, true)]
    #[case("172.16.4.4", true, true)]
    #[case("172.55.1.1", true, false)]
    #[case("172.15.0.1", true, false)]
    #[case("93.184.216.34", false, false)]
    #[case("11.0.0.1", false, false)]
    fn private_ranges_work(#[case] ip: Ipv4Addr, #[case] loose: bool, #[case] strict: bool) {
        assert_eq!(PrivateRanges::Loose.excludes(ip), loose);
        assert_eq!(PrivateRanges::Strict.excludes(ip), strict);
    }
}
