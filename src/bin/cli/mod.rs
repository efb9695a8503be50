use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use threat_insight_report::{
    config::{self, ResolverConfig},
    input, report,
};

macro_rules! env_prefix {
    () => {
        "THREAT_INSIGHT_"
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the loglevel of the application
    #[arg(
        value_enum,
        short = 'l',
        long,
        default_value_t = Loglevel::Info,
        value_name = "LEVEL",
        env = concat!(env_prefix!(), "LOGLEVEL")
    )]
    pub loglevel: Loglevel,

    /// File containing the addresses to look up, one per line
    #[arg(
        short = 'i',
        long,
        default_value = input::DEFAULT_INPUT_FILE,
        value_name = "FILE",
        env = concat!(env_prefix!(), "INPUT")
    )]
    pub input: PathBuf,

    /// Location of the xlsx report. An existing file is overwritten
    #[arg(
        short = 'o',
        long,
        default_value = report::DEFAULT_OUTPUT_FILE,
        value_name = "FILE",
        env = concat!(env_prefix!(), "OUTPUT")
    )]
    pub output: PathBuf,

    /// URL of the bulk-resolve endpoint
    #[arg(
        long,
        default_value = config::DEFAULT_ENDPOINT,
        value_name = "URL",
        env = concat!(env_prefix!(), "ENDPOINT")
    )]
    pub endpoint: String,

    /// Maximum number of addresses per request
    #[arg(
        short = 'b',
        long,
        default_value_t = NonZeroUsize::new(config::DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
        env = concat!(env_prefix!(), "BATCH_SIZE")
    )]
    pub batch_size: NonZeroUsize,

    /// Total number of attempts per batch before it is skipped
    #[arg(
        long,
        default_value_t = config::DEFAULT_MAX_RETRIES,
        value_parser = clap::value_parser!(u32).range(1..),
        env = concat!(env_prefix!(), "MAX_RETRIES")
    )]
    pub max_retries: u32,

    /// Seconds to wait after the first failed attempt. Doubles with every further failure
    #[arg(
        long,
        default_value_t = config::DEFAULT_INITIAL_BACKOFF.as_secs(),
        value_name = "SECONDS",
        env = concat!(env_prefix!(), "INITIAL_BACKOFF")
    )]
    pub initial_backoff: u64,

    /// Seconds to wait between batches
    #[arg(
        long,
        default_value_t = config::DEFAULT_BATCH_DELAY.as_secs(),
        value_name = "SECONDS",
        env = concat!(env_prefix!(), "BATCH_DELAY")
    )]
    pub batch_delay: u64,

    /// Request timeout in seconds
    #[arg(
        short = 't',
        long,
        default_value_t = config::DEFAULT_TIMEOUT.as_secs(),
        value_name = "SECONDS",
        env = concat!(env_prefix!(), "TIMEOUT")
    )]
    pub timeout: u64,

    /// Verify the TLS certificate of the endpoint. Off by default
    #[arg(long, action, default_value_t = false, env = concat!(env_prefix!(), "VERIFY_TLS"))]
    pub verify_tls: bool,

    /// API key to authenticate with
    #[arg(long, value_name = "API_KEY", env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Tenant context sent with every request
    #[arg(long, value_name = "CONTEXT", env = "CONTEXT")]
    pub context: Option<String>,
}

impl Cli {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            endpoint: self.endpoint.to_owned(),
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            initial_backoff: Duration::from_secs(self.initial_backoff),
            per_batch_delay: Duration::from_secs(self.batch_delay),
            timeout: Duration::from_secs(self.timeout),
            verify_tls: self.verify_tls,
        }
    }
}

/// Used to set the applications loglevel
// This is essentially a re-creation of log:Level. However, that enum doesn't derive ValueEnum, so we have to do it manually here
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, ValueEnum)]
pub enum Loglevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
impl From<Loglevel> for LevelFilter {
    fn from(ll: Loglevel) -> Self {
        match ll {
            Loglevel::Error => LevelFilter::Error,
            Loglevel::Warn => LevelFilter::Warn,
            Loglevel::Info => LevelFilter::Info,
            Loglevel::Debug => LevelFilter::Debug,
            Loglevel::Trace => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn should_have_valid_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_map_flags_to_resolver_config() {
        let cli = Cli::try_parse_from([
            "threat-insight-report",
            "--batch-size",
            "10",
            "--max-retries",
            "2",
            "--initial-backoff",
            "3",
            "--batch-delay",
            "0",
            "--timeout",
            "7",
            "--verify-tls",
            "--endpoint",
            "https://example.test/_bulkResolve",
        ])
        .unwrap();
        let cfg = cli.resolver_config();
        assert_eq!(cfg.batch_size.get(), 10);
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.initial_backoff, Duration::from_secs(3));
        assert_eq!(cfg.per_batch_delay, Duration::ZERO);
        assert_eq!(cfg.timeout, Duration::from_secs(7));
        assert!(cfg.verify_tls);
        assert_eq!(cfg.endpoint, "https://example.test/_bulkResolve");
    }

    #[test]
    fn should_reject_zero_batch_size_and_retries() {
        assert!(Cli::try_parse_from(["threat-insight-report", "--batch-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["threat-insight-report", "--max-retries", "0"]).is_err());
    }
}
