use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use regex::Regex;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::config::CaptureConfig;
use crate::config::PrivateRanges;
use crate::domain::Domain;
use crate::domain::ProbeTask;
use crate::domain::Technique;
use crate::resolve::Resolve;

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").expect("valid IPv4 pattern")
});

/// Passively watches traffic to a domain's host for a fixed window and yields
/// every public IPv4 address seen.
///
/// Best effort: it needs capture privileges and relies on other traffic to the
/// domain happening during the window.
#[derive(Debug, Clone)]
pub struct TrafficCaptureResolver {
    program: String,
    interface: String,
    window: Duration,
    private_ranges: PrivateRanges,
}

impl Resolve for TrafficCaptureResolver {
    fn technique(&self) -> Technique {
        Technique::TrafficCapture
    }

    fn resolve_fallible(&self, task: ProbeTask) -> BoxStream<'_, Result<Ipv4Addr>> {
        try_stream! {
            let observed = self.capture(&task.domain).await?;
            for ip in observed {
                if self.private_ranges.excludes(ip) {
                    continue;
                }
                yield ip;
            }
        }
        .boxed()
    }
}

impl TrafficCaptureResolver {
    #[must_use]
    pub fn new(config: &CaptureConfig, window: Duration, private_ranges: PrivateRanges) -> Self {
        Self {
            program: config.program.clone(),
            interface: config.interface.clone(),
            window,
            private_ranges,
        }
    }

    /// Runs the capture program for the window, then kills it.
    ///
    /// If the program exits on its own before the window ends, a failing exit
    /// status is an error carrying whatever it printed to stderr.
    async fn capture(&self, domain: &Domain) -> Result<BTreeSet<Ipv4Addr>> {
        let until = Instant::now() + self.window;
        let mut child = Command::new(&self.program)
            .args(["-l", "-n", "-i", self.interface.as_str(), "host", domain.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("unable to start {}", self.program))?;
        let stdout = child.stdout.take().context("capture stdout not piped")?;
        let stderr = child.stderr.take().context("capture stderr not piped")?;

        let mut observed = BTreeSet::new();
        let mut lines = BufReader::new(stdout).lines();
        let read = async {
            while let Some(line) = lines.next_line().await? {
                observed.extend(extract_ipv4(&line));
            }
            anyhow::Ok(())
        };
        let outcome = tokio::time::timeout_at(until, read).await;

        // Stdout closing means the program is exiting; reap it within the window.
        let status = match outcome {
            Ok(Ok(())) => tokio::time::timeout_at(until, child.wait()).await.ok(),
            Ok(Err(_)) | Err(_) => None,
        };
        let Some(status) = status else {
            child
                .kill()
                .await
                .with_context(|| format!("unable to stop {}", self.program))?;
            debug!(%domain, count = observed.len(), "capture window closed");
            return match outcome {
                Ok(Err(error)) => Err(error.context("unable to read capture output")),
                _ => Ok(observed),
            };
        };

        let status = status.with_context(|| format!("unable to wait for {}", self.program))?;
        if status.success() {
            return Ok(observed);
        }

        let mut message = String::new();
        if let Err(error) = BufReader::new(stderr).read_to_string(&mut message).await {
            debug!(?error, "unable to read capture stderr");
        }
        let message = message.trim();
        if observed.is_empty() {
            bail!("{} exited with {status}: {message}", self.program);
        }
        warn!(%domain, %status, "capture exited early: {message}");
        Ok(observed)
    }
}

/// Extracts every IPv4 literal from a line of packet summary output.
///
/// Port suffixes as printed by tcpdump (`1.2.3.4.443`) are ignored.
#[must_use]
pub fn extract_ipv4(line: &str) -> Vec<Ipv4Addr> {
    IPV4.find_iter(line)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(
        "12:00:01.000000 IP 10.0.0.5.51234 > 93.184.216.34.443: Flags [S], seq 1",
        &["10.0.0.5", "93.184.216.34"]
    )]
    #[case("IP 192.168.1.1.53 > 172.55.1.1.53: 1+ A?", &["192.168.1.1", "172.55.1.1"])]
    #[case("no addresses here", &[])]
    #[case("999.1.1.1 > 1.2.3.4", &["1.2.3.4"])]
    fn extract_ipv4_works(#[case] line: &str, #[case] should: &[&str]) {
        let got: Vec<String> = extract_ipv4(line).iter().map(ToString::to_string).collect();
        assert_eq!(got, should);
    }

    fn resolver(program: &str, window: Duration) -> TrafficCaptureResolver {
        let config = CaptureConfig {
            program: program.to_owned(),
            interface: "any".to_owned(),
        };
        TrafficCaptureResolver::new(&config, window, PrivateRanges::Loose)
    }

    #[tokio::test]
    async fn missing_program_fails() {
        let resolver = resolver("/nonexistent/capture-tool", Duration::from_millis(50));
        let domain = "example.com".parse().unwrap();
        assert!(resolver.capture(&domain).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn applies_private_filter() {
        use crate::resolve::ResolveExt;

        // `echo` prints its arguments, which stand in for captured packet lines.
        let resolver = TrafficCaptureResolver {
            program: "echo".to_owned(),
            interface: "10.0.0.5 192.168.1.1 172.55.1.1 93.184.216.34".to_owned(),
            window: Duration::from_secs(5),
            private_ranges: PrivateRanges::Loose,
        };
        let task = ProbeTask::new("example.com".parse().unwrap(), Technique::TrafficCapture);
        let got = resolver.resolve_set(task).await;
        let should: BTreeSet<Ipv4Addr> = [Ipv4Addr::new(93, 184, 216, 34)].into();
        assert_eq!(got, should);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_is_an_error() {
        let resolver = resolver("false", Duration::from_secs(5));
        let domain = "example.com".parse().unwrap();
        for _ in 0..10 {
            assert!(resolver.capture(&domain).await.is_err());
        }

        let task = ProbeTask::new(domain, Technique::TrafficCapture);
        let results: Vec<_> = resolver.resolve_fallible(task).collect().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failure_carries_stderr() {
        // `ls` rejects the capture arguments as missing files and says so on stderr.
        let resolver = resolver("ls", Duration::from_secs(5));
        let domain = "no-such-file.example".parse().unwrap();
        let error = resolver.capture(&domain).await.unwrap_err();
        assert!(format!("{error:#}").contains("no-such-file.example"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn long_running_program_stops_at_window() {
        // `yes` repeats its arguments until killed.
        let resolver = TrafficCaptureResolver {
            program: "yes".to_owned(),
            interface: "93.184.216.34".to_owned(),
            window: Duration::from_millis(300),
            private_ranges: PrivateRanges::Loose,
        };
        let domain = "example.com".parse().unwrap();

        let start = std::time::Instant::now();
        let got = resolver.capture(&domain).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(got, BTreeSet::from([Ipv4Addr::new(93, 184, 216, 34)]));
    }
}
