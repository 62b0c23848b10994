//! Command-line arguments for the `pagefan` binary.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use pagefan_core::{ConfigError, TrackerConfig};

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47900;

/// Fan-out page tracker: create jobs over HTTP, process pages with local workers.
#[derive(Debug, Parser)]
#[command(name = "pagefan", version, about)]
pub struct Args {
    /// Address to bind.
    #[arg(long, env = "PAGEFAN_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, env = "PAGEFAN_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// TOML file with tracker settings.
    #[arg(short, long, env = "PAGEFAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database for job state. Kept in memory when absent.
    #[arg(long, env = "PAGEFAN_DB")]
    pub db: Option<PathBuf>,

    /// Override `delay_ms` from the config file.
    #[arg(long, env = "PAGEFAN_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Override `randomize_delay` from the config file.
    #[arg(long, env = "PAGEFAN_RANDOMIZE_DELAY")]
    pub randomize_delay: Option<bool>,

    /// Override `workers` from the config file.
    #[arg(long, env = "PAGEFAN_WORKERS")]
    pub workers: Option<usize>,
}

impl Args {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Config file (or defaults) with command-line overrides applied on top.
    pub fn resolve_config(&self) -> Result<TrackerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => TrackerConfig::from_file(path)?,
            None => TrackerConfig::default(),
        };
        if let Some(delay_ms) = self.delay_ms {
            config.delay_ms = delay_ms;
        }
        if let Some(randomize) = self.randomize_delay {
            config.randomize_delay = randomize;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;
        Ok(config)
    }
}
