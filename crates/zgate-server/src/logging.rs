//! Tracing setup.
//!
//! A verbosity level assigns a level to each `zgate::*` target and to
//! `tower_http`. `--log target=level` adjusts single targets on top of that,
//! and a set `RUST_LOG` replaces the whole filter.

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{
    filter::LevelFilter, fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt,
    EnvFilter,
};

const TARGET_PREFIX: &str = "zgate::";

/// Every target the workspace logs under.
const TARGETS: [&str; 6] = ["startup", "api", "session", "protocol", "process", "store"];

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// How much the server says.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    /// Requests, sessions and startup; protocol and pty chatter only on trouble.
    #[default]
    Normal,
    Verbose,
    /// Full conversation logs; pty lifecycle stays at info.
    Debug,
    Trace,
}

impl Verbosity {
    /// The most verbose flag given wins, except `quiet`, which beats them all.
    pub fn from_flags(quiet: bool, verbose: bool, debug: bool, trace: bool) -> Self {
        match (quiet, trace, debug, verbose) {
            (true, ..) => Verbosity::Quiet,
            (_, true, ..) => Verbosity::Trace,
            (_, _, true, _) => Verbosity::Debug,
            (_, _, _, true) => Verbosity::Verbose,
            _ => Verbosity::Normal,
        }
    }

    fn level_for(self, target: &str) -> LevelFilter {
        match (self, target) {
            (Verbosity::Quiet, _) => LevelFilter::WARN,
            (Verbosity::Normal, "protocol" | "process") => LevelFilter::WARN,
            (Verbosity::Normal, _) | (Verbosity::Verbose, _) => LevelFilter::INFO,
            (Verbosity::Debug, "process") => LevelFilter::INFO,
            (Verbosity::Debug, _) => LevelFilter::DEBUG,
            (Verbosity::Trace, _) => LevelFilter::TRACE,
        }
    }

    fn http_level(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::ERROR,
            Verbosity::Normal => LevelFilter::WARN,
            Verbosity::Verbose => LevelFilter::INFO,
            Verbosity::Debug => LevelFilter::DEBUG,
            Verbosity::Trace => LevelFilter::TRACE,
        }
    }
}

/// One `--log target=level` argument. Bare targets get the `zgate::` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOverride {
    pub target: String,
    pub level: LevelFilter,
}

impl FromStr for LogOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (target, level) = s
            .split_once('=')
            .ok_or_else(|| format!("expected TARGET=LEVEL, got '{}'", s))?;
        let target = target.trim();
        if target.is_empty() {
            return Err(format!("missing target in '{}'", s));
        }

        let level = level
            .trim()
            .parse::<LevelFilter>()
            .map_err(|_| format!("unknown level in '{}'", s))?;
        let target = if target.starts_with(TARGET_PREFIX) || target == "tower_http" {
            target.to_string()
        } else {
            format!("{}{}", TARGET_PREFIX, target)
        };

        Ok(Self { target, level })
    }
}

impl fmt::Display for LogOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.target, level_name(self.level))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub verbosity: Verbosity,
    pub overrides: Vec<LogOverride>,
    pub format: LogFormat,
}

impl LogConfig {
    /// Filter directives, later entries taking precedence.
    pub fn directives(&self) -> Vec<String> {
        let mut directives: Vec<String> = TARGETS
            .iter()
            .map(|target| {
                format!("{}{}={}", TARGET_PREFIX, target, level_name(self.verbosity.level_for(target)))
            })
            .collect();
        directives.push(format!("tower_http={}", level_name(self.verbosity.http_level())));
        directives.extend(self.overrides.iter().map(ToString::to_string));
        directives
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::builder().parse_lossy(self.directives().join(",")))
    }
}

/// `LevelFilter` displays levels in upper case; directives use lower case.
fn level_name(level: LevelFilter) -> String {
    level.to_string().to_ascii_lowercase()
}

/// Install the global subscriber.
pub fn init(config: &LogConfig) {
    let registry = tracing_subscriber::registry().with(config.filter());

    match config.format {
        LogFormat::Text => registry.with(fmt_layer::layer().with_target(true)).init(),
        LogFormat::Json => registry
            .with(fmt_layer::layer().json().with_target(true))
            .init(),
    }
}
