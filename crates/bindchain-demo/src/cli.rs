#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo.
//!
//! Parses args by hand. Supports environment variable overrides via the
//! `BINDCHAIN_DEMO_*` prefix; explicit flags win over the environment.

use std::env;
use std::fmt;
use std::process;

use crate::walkthrough::Script;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
bindchain demo: field chains between two objects

USAGE:
    bindchain-demo [OPTIONS]

OPTIONS:
    --initial=N          Value assigned to source.id before wiring (default: 123)
    --values=A,B,...     Values assigned after wiring (default: 1,1,2,3,5,6,7)
    --jsonl=PATH         Also write each step as a JSON line ('-' for stdout)
    --log=FILTER         tracing filter directive (default: warn)
    --log-json           Emit logs as JSON
    --help, -h           Show this help message
    --version, -V        Show version

CHAINS:
    source.Id % 2, distinct  ->  target.Id  (write, then notify)
    source.Id                ->  target.Age (write only)

ENVIRONMENT VARIABLES:
    BINDCHAIN_DEMO_INITIAL    Override --initial
    BINDCHAIN_DEMO_VALUES     Override --values
    BINDCHAIN_DEMO_JSONL      Override --jsonl
    BINDCHAIN_LOG             Override --log
    BINDCHAIN_LOG_JSON        Override --log-json (1/true to enable)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// Value assigned before the chains are wired.
    pub initial: i32,
    /// Values assigned after wiring.
    pub values: Vec<i32>,
    /// JSONL transcript path; `-` means stdout.
    pub jsonl: Option<String>,
    /// `tracing-subscriber` filter directive.
    pub log_filter: String,
    /// JSON log output instead of the compact format.
    pub log_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseError {
    Help,
    Version,
    InvalidValue { flag: &'static str, value: String },
    UnknownArg(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help => f.write_str("help requested"),
            Self::Version => f.write_str("version requested"),
            Self::InvalidValue { flag, value } => write!(f, "Invalid {flag} value: {value}"),
            Self::UnknownArg(arg) => write!(f, "Unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl Default for Opts {
    fn default() -> Self {
        let script = Script::default();
        Self {
            initial: script.initial,
            values: script.values,
            jsonl: None,
            log_filter: "warn".into(),
            log_json: false,
        }
    }
}

impl Opts {
    /// Parse command-line arguments and environment variables.
    ///
    /// Environment variables take precedence over defaults but are overridden
    /// by explicit command-line flags.
    pub fn parse() -> Self {
        match Self::parse_from_env_and_args(env::args().skip(1), |key| env::var(key).ok()) {
            Ok(opts) => opts,
            Err(ParseError::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Err(ParseError::Version) => {
                println!("bindchain-demo {VERSION}");
                process::exit(0);
            }
            Err(err @ ParseError::InvalidValue { .. }) => {
                eprintln!("{err}");
                process::exit(1);
            }
            Err(err @ ParseError::UnknownArg(_)) => {
                eprintln!("{err}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// The walkthrough script these options describe.
    #[must_use]
    pub fn script(&self) -> Script {
        Script {
            initial: self.initial,
            values: self.values.clone(),
        }
    }

    fn parse_from_env_and_args<I, S, F>(args: I, get_env: F) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        // Apply environment variable defaults first
        if let Some(val) = get_env("BINDCHAIN_DEMO_INITIAL")
            && let Ok(n) = val.trim().parse()
        {
            opts.initial = n;
        }
        if let Some(val) = get_env("BINDCHAIN_DEMO_VALUES")
            && let Some(values) = parse_values(&val)
        {
            opts.values = values;
        }
        if let Some(val) = get_env("BINDCHAIN_DEMO_JSONL")
            && !val.trim().is_empty()
        {
            opts.jsonl = Some(val);
        }
        if let Some(val) = get_env("BINDCHAIN_LOG")
            && !val.trim().is_empty()
        {
            opts.log_filter = val;
        }
        if let Some(val) = get_env("BINDCHAIN_LOG_JSON") {
            opts.log_json = val == "1" || val.eq_ignore_ascii_case("true");
        }

        // Parse command-line args (override env vars)
        for arg in args {
            let arg = arg.as_ref();
            match arg {
                "--help" | "-h" => return Err(ParseError::Help),
                "--version" | "-V" => return Err(ParseError::Version),
                "--log-json" => opts.log_json = true,
                other => {
                    if let Some(val) = other.strip_prefix("--initial=") {
                        opts.initial = val.parse().map_err(|_| ParseError::InvalidValue {
                            flag: "--initial",
                            value: val.to_string(),
                        })?;
                    } else if let Some(val) = other.strip_prefix("--values=") {
                        opts.values = parse_values(val).ok_or_else(|| ParseError::InvalidValue {
                            flag: "--values",
                            value: val.to_string(),
                        })?;
                    } else if let Some(val) = other.strip_prefix("--jsonl=") {
                        if val.is_empty() {
                            return Err(ParseError::InvalidValue {
                                flag: "--jsonl",
                                value: String::new(),
                            });
                        }
                        opts.jsonl = Some(val.to_string());
                    } else if let Some(val) = other.strip_prefix("--log=") {
                        opts.log_filter = val.to_string();
                    } else {
                        return Err(ParseError::UnknownArg(other.to_string()));
                    }
                }
            }
        }

        Ok(opts)
    }
}

/// Comma-separated integers; an empty list is allowed.
fn parse_values(raw: &str) -> Option<Vec<i32>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Vec::new());
    }
    raw.split(',').map(|part| part.trim().parse().ok()).collect()
}
