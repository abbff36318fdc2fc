use std::collections::BTreeSet;

use anyhow::Result;
use clap::Args;
use tracing::info;
use webblock::config::Config;
use webblock::domain::Domain;
use webblock::engine::Engine;

use crate::args::ResolutionArgs;
use crate::cmd::Run;

/// Resolve the IPs currently serving the given domains
#[derive(Debug, Args)]
pub struct ResolveIpsArgs {
    #[clap(flatten)]
    resolution_args: ResolutionArgs,

    /// Base domains to resolve.
    #[arg(required = true)]
    domains: Vec<Domain>,
}

impl Run for ResolveIpsArgs {
    async fn run(&self, mut config: Config) -> Result<()> {
        self.resolution_args.apply(&mut config);

        let engine = Engine::from_config(&config)?;
        info!(?engine, "Built engine");

        let bases: BTreeSet<Domain> = self.domains.iter().cloned().collect();
        let ips = engine.run(&bases).await?;

        println!("{}", ips.join(" "));

        Ok(())
    }
}
