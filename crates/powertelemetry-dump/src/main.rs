//! powertelemetry-dump
//!
//! Queries the battery once and prints the snapshot as JSON on stdout.
//! Logs go to stderr so the output can be piped straight into other tools.

mod config;

use anyhow::{Context, Result, bail};
use clap::Parser;
use config::{DumpConfig, Source};
use powertelemetry::mock::{MockProfile, MockReader};
use powertelemetry::{IoregReader, JsonFileReader, RecordReader, SysfsReader, derive_snapshot};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Selects the mock profile when neither `--mock` nor the config names one
const MOCK_PROFILE_ENV: &str = "POWERTELEMETRY_MOCK_PROFILE";

#[derive(Debug, Parser)]
#[command(version, about = "Print battery and power telemetry as JSON")]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/powertelemetry/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to read the battery record from
    #[arg(long, value_enum)]
    source: Option<Source>,

    /// Registry class for the ioreg source
    #[arg(long)]
    device_class: Option<String>,

    /// power_supply class directory for the sysfs source
    #[arg(long)]
    sysfs_root: Option<PathBuf>,

    /// Replay a JSON record dump (implies --source file)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Use a canned record: healthy, degraded, nocells, desktop (implies --source mock)
    #[arg(long)]
    mock: Option<String>,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,

    /// Print the raw property record instead of the snapshot
    #[arg(long)]
    raw: bool,
}

impl Cli {
    /// Overlay command-line flags onto the loaded configuration
    fn apply(self, mut config: DumpConfig) -> DumpConfig {
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(class) = self.device_class {
            config.device_class = class;
        }
        if let Some(root) = self.sysfs_root {
            config.sysfs_root = root;
        }
        if let Some(file) = self.file {
            config.record_file = Some(file);
            if self.source.is_none() {
                config.source = Source::File;
            }
        }
        if let Some(profile) = self.mock {
            config.mock_profile = Some(profile);
            if self.source.is_none() {
                config.source = Source::Mock;
            }
        }
        if self.compact {
            config.pretty = false;
        }
        if self.raw {
            config.raw = true;
        }
        config
    }
}

fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => DumpConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DumpConfig::load_default().context("Failed to load default config")?,
    };
    let config = cli.apply(config);
    debug!("Effective configuration: {:?}", config);

    let reader = build_reader(&config)?;
    let record = reader.fetch().context("Failed to read battery record")?;
    info!("Fetched battery record with {} properties", record.len());

    if config.raw {
        print_json(&record, config.pretty)
    } else {
        print_json(&derive_snapshot(&record), config.pretty)
    }
}

fn setup_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Resolve `auto` to the reader native to this platform
fn resolve_source(source: Source) -> Source {
    match source {
        Source::Auto if cfg!(target_os = "macos") => Source::Ioreg,
        Source::Auto => Source::Sysfs,
        other => other,
    }
}

fn build_reader(config: &DumpConfig) -> Result<Box<dyn RecordReader>> {
    let source = resolve_source(config.source);
    debug!("Using {:?} source", source);

    let reader: Box<dyn RecordReader> = match source {
        Source::Ioreg => Box::new(IoregReader::with_class(config.device_class.as_str())),
        Source::Auto | Source::Sysfs => Box::new(SysfsReader::with_root(&config.sysfs_root)),
        Source::File => {
            let path = config
                .record_file
                .as_ref()
                .context("The file source needs --file or record_file in the config")?;
            Box::new(JsonFileReader::new(path))
        }
        Source::Mock => match &config.mock_profile {
            Some(name) => match MockProfile::from_name(name) {
                Some(profile) => Box::new(MockReader::new(profile)),
                None => bail!("Unknown mock profile: {}", name),
            },
            None => Box::new(MockReader::new(env_mock_profile(
                std::env::var(MOCK_PROFILE_ENV).ok(),
            ))),
        },
    };
    Ok(reader)
}

/// Profile named by the environment, or Healthy when unset or unknown
fn env_mock_profile(value: Option<String>) -> MockProfile {
    value
        .as_deref()
        .and_then(MockProfile::from_name)
        .unwrap_or(MockProfile::Healthy)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;

    println!("{}", json);
    Ok(())
}
