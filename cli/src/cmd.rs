mod fetch_blocklist;
mod list_sources;
mod resolve_ips;

use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use enum_dispatch::enum_dispatch;
use webblock::config::Config;

use crate::args::GlobalArgs;

/// Resolve the IP addresses serving a set of domains, for blocking at the
/// network level
#[derive(Debug, Parser)]
#[command(version, about, arg_required_else_help = true)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    #[clap(flatten)]
    global_args: GlobalArgs,
}

/// Subcommands must implement [`Run`] to be executed at runtime.
#[enum_dispatch]
pub trait Run {
    async fn run(&self, config: Config) -> Result<()>;
}

#[enum_dispatch(Run)]
#[derive(Debug, Subcommand)]
enum Command {
    ResolveIps(resolve_ips::ResolveIpsArgs),
    FetchBlocklist(fetch_blocklist::FetchBlocklistArgs),
    ListSources(list_sources::ListSourcesArgs),
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.global_args.init_tracing()?;

    let config = cli.global_args.load_config()?;

    cli.command.run(config).await
}
