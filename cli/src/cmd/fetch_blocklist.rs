use std::io::BufWriter;
use std::io::Write;

use anyhow::Result;
use clap::Args;
use webblock::blocklist::BlocklistFetcher;
use webblock::config::Config;

use crate::cmd::Run;

/// Download a blocklist and print one hostname per line
#[derive(Debug, Args)]
pub struct FetchBlocklistArgs {
    /// Name of a configured blocklist source. See `list-sources`.
    source: String,

    /// Time to allow the download to complete.
    #[clap(long, default_value = "30s")]
    timeout: humantime::Duration,
}

impl Run for FetchBlocklistArgs {
    async fn run(&self, config: Config) -> Result<()> {
        let url = config.blocklist_url(&self.source)?;
        let fetcher = BlocklistFetcher::try_new(self.timeout.into())?;
        let hosts = fetcher.fetch(url).await?;

        let mut stdout = BufWriter::new(std::io::stdout().lock());
        for host in hosts {
            writeln!(stdout, "{host}")?;
        }
        stdout.flush()?;

        Ok(())
    }
}
