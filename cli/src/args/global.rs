use std::io::IsTerminal;

use anyhow::Context;
use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Args;
use tracing::debug;
use tracing_glog::Glog;
use tracing_glog::GlogFields;
use tracing_glog::LocalTime;
use tracing_indicatif::filter::hide_indicatif_span_fields;
use tracing_indicatif::filter::IndicatifFilter;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;
use webblock::config::Config;

const HEADING: Option<&str> = Some("Global Options");

/// Global arguments that apply to every subcommand.
#[derive(Debug, Args, Clone)]
pub struct GlobalArgs {
    /// Filter directive for stderr logs
    #[clap(long, env = "RUST_LOG", default_value = "warn", help_heading = HEADING, global = true)]
    pub log_level: String,

    /// Path to a TOML config file. Created with the default values if missing.
    #[clap(long, env = "WEBBLOCK_CONFIG", help_heading = HEADING, global = true)]
    pub config: Option<Utf8PathBuf>,
}

impl GlobalArgs {
    /// Initializes all [`tracing`] config.
    pub fn init_tracing(&self) -> Result<()> {
        let indicatif_layer = IndicatifLayer::new();

        let stderr_filter = EnvFilter::builder().parse_lossy(&self.log_level);
        let stderr_writer = indicatif_layer.get_stderr_writer();
        let stderr_layer = tracing_subscriber::fmt::layer()
            .event_format(Glog::default().with_timer(LocalTime::default()))
            .fmt_fields(hide_indicatif_span_fields(GlogFields::default()))
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(stderr_writer)
            .with_filter(stderr_filter);

        let subscriber = Registry::default()
            .with(stderr_layer)
            .with(indicatif_layer.with_filter(IndicatifFilter::new(false)));
        tracing::subscriber::set_global_default(subscriber)?;

        debug!("Initialized tracing");

        Ok(())
    }

    /// Loads the config file if one was given, otherwise the compiled-in
    /// defaults.
    pub fn load_config(&self) -> Result<Config> {
        let Some(path) = &self.config else {
            return Ok(Config::default());
        };
        let config: Config = confy::load_path(path)
            .with_context(|| format!("unable to load config from {path}"))?;
        debug!(%path, "Loaded config");
        Ok(config)
    }
}
