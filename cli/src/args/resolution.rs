use std::net::Ipv4Addr;
use std::time::Duration;

use clap::Args;
use webblock::config::Config;
use webblock::config::PrivateRanges;
use webblock::domain::Technique;

const HEADING: Option<&str> = Some("Resolution Options");

/// Overrides for how domains get resolved. Unset options keep the value from
/// the config file or the compiled-in default.
#[derive(Debug, Args, Clone, Default)]
pub struct ResolutionArgs {
    /// Technique to enable: dns-query, http-probe, traffic-capture or
    /// system-resolver. Repeatable.
    #[clap(short = 't', long = "technique", value_delimiter = ',', help_heading = HEADING)]
    pub techniques: Vec<Technique>,

    /// Public DNS server to query. Repeatable.
    #[clap(long = "dns-server", value_delimiter = ',', help_heading = HEADING)]
    pub dns_servers: Vec<Ipv4Addr>,

    /// Subdomain prefix to expand each domain with. Repeatable.
    #[clap(long = "prefix", value_delimiter = ',', help_heading = HEADING)]
    pub prefixes: Vec<String>,

    /// Only probe the domains as given.
    #[clap(long, conflicts_with = "prefixes", help_heading = HEADING)]
    pub no_prefixes: bool,

    /// Time to allow each probe to complete.
    #[clap(long, help_heading = HEADING)]
    pub timeout: Option<humantime::Duration>,

    /// How long each traffic capture listens.
    #[clap(long, help_heading = HEADING)]
    pub capture_window: Option<humantime::Duration>,

    /// Overall time budget. Outstanding probes are abandoned when it expires.
    #[clap(long, help_heading = HEADING)]
    pub deadline: Option<humantime::Duration>,

    /// Number of concurrent DNS queries.
    #[clap(long, help_heading = HEADING)]
    pub dns_workers: Option<usize>,

    /// Number of concurrent HTTP probes.
    #[clap(long, help_heading = HEADING)]
    pub http_workers: Option<usize>,

    /// Only discard RFC 1918 addresses from captured traffic, instead of all
    /// of 172.0.0.0/8.
    #[clap(long, help_heading = HEADING)]
    pub strict_private_ranges: bool,
}

impl ResolutionArgs {
    /// Applies the given overrides on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if !self.techniques.is_empty() {
            config.techniques.clone_from(&self.techniques);
        }
        if !self.dns_servers.is_empty() {
            config.dns_servers.clone_from(&self.dns_servers);
        }
        if !self.prefixes.is_empty() {
            config.prefixes.clone_from(&self.prefixes);
        }
        if self.no_prefixes {
            config.prefixes.clear();
        }
        if let Some(timeout) = self.timeout {
            config.probe_timeout_secs = whole_secs(timeout.into());
        }
        if let Some(window) = self.capture_window {
            config.capture_window_secs = whole_secs(window.into());
        }
        if let Some(deadline) = self.deadline {
            config.deadline_secs = Some(whole_secs(deadline.into()));
        }
        if let Some(n) = self.dns_workers {
            config.workers.dns = n;
        }
        if let Some(n) = self.http_workers {
            config.workers.http = n;
        }
        if self.strict_private_ranges {
            config.private_ranges = PrivateRanges::Strict;
        }
    }
}

fn whole_secs(duration: Duration) -> u64 {
    duration.as_secs().max(1)
}
