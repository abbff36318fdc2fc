use anyhow::Result;
use clap::Args;
use webblock::config::Config;

use crate::cmd::Run;

/// List the configured blocklist sources
#[derive(Debug, Args)]
pub struct ListSourcesArgs {}

impl Run for ListSourcesArgs {
    async fn run(&self, config: Config) -> Result<()> {
        for (name, url) in &config.blocklists {
            println!("{name} {url}");
        }
        Ok(())
    }
}
