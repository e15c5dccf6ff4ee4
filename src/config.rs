//! Command line flags and the validated run configuration.

use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency must be at least 2 since it is split between the https and http stages (got {0})")]
    ConcurrencyTooLow(usize),
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Raw flags as given on the command line.
#[derive(Debug, Clone)]
pub struct Cli {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub verbose: bool,
}

impl Cli {
    pub fn command() -> Command<'static> {
        Command::new("live_origins")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Finds hostnames that serve a live web endpoint over https or http")
            .arg(
                Arg::new("input")
                    .short('i')
                    .long("input")
                    .value_name("FILE")
                    .help("Input file with one hostname per line")
                    .required(true)
                    .takes_value(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_name("FILE")
                    .help("Output file (default: <input without .txt>-valid.txt)")
                    .takes_value(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("concurrency")
                    .short('c')
                    .long("concurrency")
                    .value_name("N")
                    .help("Concurrency level, split equally between https and http requests")
                    .takes_value(true)
                    .default_value("20")
                    .value_parser(value_parser!(usize)),
            )
            .arg(
                Arg::new("timeout")
                    .short('t')
                    .long("timeout")
                    .value_name("MS")
                    .help("Per-request timeout in milliseconds")
                    .takes_value(true)
                    .default_value("10000")
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Log every probe outcome")
                    .action(ArgAction::SetTrue),
            )
    }

    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            input: matches
                .get_one::<PathBuf>("input")
                .cloned()
                .expect("input is a required argument"),
            output: matches.get_one::<PathBuf>("output").cloned(),
            concurrency: matches
                .get_one::<usize>("concurrency")
                .copied()
                .unwrap_or(DEFAULT_CONCURRENCY),
            timeout_ms: matches
                .get_one::<u64>("timeout")
                .copied()
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            verbose: matches.get_one::<bool>("verbose").copied().unwrap_or(false),
        }
    }

    pub fn into_config(self) -> Result<ProbeConfig, ConfigError> {
        let workers_per_stage = NonZeroUsize::new(self.concurrency / 2)
            .ok_or(ConfigError::ConcurrencyTooLow(self.concurrency))?;
        if self.concurrency % 2 != 0 {
            warn!(
                concurrency = self.concurrency,
                workers_per_stage = workers_per_stage.get(),
                "odd concurrency, one worker is dropped"
            );
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let output = self
            .output
            .unwrap_or_else(|| derive_output_path(&self.input));

        Ok(ProbeConfig {
            input: self.input,
            output,
            workers_per_stage,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

/// Settings fixed for the duration of one run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub workers_per_stage: NonZeroUsize,
    pub timeout: Duration,
}

// hosts.txt -> hosts-valid.txt
pub fn derive_output_path(input: &Path) -> PathBuf {
    let raw = input.to_string_lossy();
    let stem = raw.strip_suffix(".txt").unwrap_or(&raw);
    PathBuf::from(format!("{stem}-valid.txt"))
}
