use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use currency_indicator::core::config::{AppConfig, SinkKind};
use currency_indicator::core::log::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Base currency
    #[arg(long)]
    from: Option<String>,

    /// Target currency
    #[arg(long)]
    to: Option<String>,

    /// Where the label is displayed
    #[arg(long, value_enum)]
    sink: Option<SinkKind>,

    /// Port of the shepherd or HTTP display host
    #[arg(short, long)]
    port: Option<u16>,

    /// Icon shown next to the label by the shepherd
    #[arg(long)]
    icon: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Decimal places shown for the rate
    #[arg(long)]
    decimals: Option<usize>,

    /// Seconds between fetches while they succeed
    #[arg(long)]
    steady_secs: Option<u64>,

    /// Seconds between fetches after a failure
    #[arg(long)]
    retry_secs: Option<u64>,

    /// Path to optional configuration file
    #[arg(short, long)]
    config_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command line flags take precedence over the config file.
    fn apply(self, config: &mut AppConfig) {
        if let Some(from) = self.from {
            config.from = Some(from);
        }
        if let Some(to) = self.to {
            config.to = Some(to);
        }
        if let Some(kind) = self.sink {
            config.sink.kind = kind;
        }
        if let Some(port) = self.port {
            config.sink.port = port;
        }
        if let Some(icon) = self.icon {
            config.sink.icon = Some(icon);
        }
        if let Some(log_file) = self.log_file {
            config.log_file = Some(log_file);
        }
        if let Some(decimals) = self.decimals {
            config.decimals = decimals;
        }
        if let Some(secs) = self.steady_secs {
            config.schedule.steady_secs = secs;
        }
        if let Some(secs) = self.retry_secs {
            config.schedule.retry_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let mut config = match cli.config_path.as_deref() {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    cli.apply(&mut config);

    if !config.has_pair() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "Missing from/to currency. Pass --from and --to or set them in the config file.",
            )
            .exit();
    }

    init_logging(verbose, config.log_file.as_deref())?;

    let result = match config.into_settings() {
        Ok(settings) => currency_indicator::run(settings).await.map(|_| ()),
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
