//! Logging setup on top of `tracing` and `tracing-subscriber`.
//!
//! - `RUST_LOG` selects what is logged
//! - `PGMVT_LOG_FORMAT` selects the output format (`full`, `compact`, `pretty`, `json`)

use std::str::FromStr;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Log output format, read from `PGMVT_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line logs
    Full,
    /// Full format with shorter lines (default for release builds)
    Compact,
    /// Multi-line logs for local development
    Pretty,
    /// Newline-delimited JSON
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            "pretty" | "verbose" => Ok(Self::Pretty),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid log format '{s}'. Valid options: full, compact, pretty, json"
            )),
        }
    }
}

/// Install the global subscriber. Records of crates using `log` are bridged into `tracing`.
pub fn init_tracing(filter: &str, format: Option<String>) {
    if let Err(e) = tracing_log::LogTracer::builder()
        .with_interest_cache(tracing_log::InterestCacheConfig::default())
        .init()
    {
        eprintln!("Warning: unable to bridge log records into tracing: {e}");
    }

    let env_filter = EnvFilter::from_str(filter).unwrap_or_else(|_| {
        eprintln!("Warning: Invalid filter string '{filter}', falling back to debug");
        EnvFilter::new("debug")
    });

    let format = format
        .and_then(|s| {
            s.parse::<LogFormat>()
                .map_err(|e| eprintln!("Warning: {e}"))
                .ok()
        })
        .unwrap_or_default();

    match format {
        LogFormat::Full => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::NONE)
                .with_filter(env_filter);
            Registry::default().with(fmt_layer).init();
        }
        LogFormat::Compact => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_span_events(FmtSpan::NONE)
                .with_filter(env_filter);
            Registry::default().with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_filter(env_filter);
            Registry::default().with(fmt_layer).init();
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_filter(env_filter);
            Registry::default().with(fmt_layer).init();
        }
    }
}

/// Build the log filter from `RUST_LOG`.
///
/// When `RUST_LOG` sets a level for `pgmvt` but not for `pgmvt_core`, the same level
/// is applied to `pgmvt_core`, so that `RUST_LOG=pgmvt=debug` also shows the tile SQL.
#[must_use]
pub fn ensure_core_log_level_matches(env_filter: Option<String>) -> String {
    const SERVER: &str = "pgmvt=";
    const CORE: &str = "pgmvt_core=";

    let Some(rust_log) = env_filter else {
        return format!("{SERVER}info,{CORE}info");
    };
    if rust_log.contains(CORE) {
        return rust_log;
    }
    match rust_log.split(',').find_map(|s| s.strip_prefix(SERVER)) {
        Some(level) => format!("{rust_log},{CORE}{level}"),
        None => rust_log,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, "pgmvt=info,pgmvt_core=info")]
    #[case(Some("debug"), "debug")]
    #[case(Some("pgmvt=debug"), "pgmvt=debug,pgmvt_core=debug")]
    #[case(Some("warn,pgmvt=trace"), "warn,pgmvt=trace,pgmvt_core=trace")]
    #[case(Some("pgmvt=debug,pgmvt_core=warn"), "pgmvt=debug,pgmvt_core=warn")]
    fn core_level_mirrors_server(#[case] rust_log: Option<&str>, #[case] expected: &str) {
        assert_eq!(
            ensure_core_log_level_matches(rust_log.map(ToString::to_string)),
            expected
        );
    }

    #[test]
    fn log_format() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("verbose".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
