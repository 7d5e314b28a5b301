//! Provides a means to read, parse and hold configuration options for scans.
use crate::error::{ScanError, ScanResult};
use clap::{Parser, ValueEnum};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::PathBuf;

pub const LOWEST_PORT_NUMBER: u16 = 1;
pub const TOP_PORT_NUMBER: u16 = 65535;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_START_PORT: u16 = 1;
pub const DEFAULT_END_PORT: u16 = 1000;

/// Represents the strategy in which the port scanning will run.
///   - Serial will run from start to end, for example 1 to 1_000.
///   - Random will randomize the order in which ports will be scanned.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Serial,
    Random,
}

/// An inclusive range of TCP ports, always within `1..=65535` and never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Builds a range, rejecting anything outside `1 <= start <= end <= 65535`.
    ///
    /// ```rust
    /// # use bannerscan::input::PortRange;
    /// assert!(PortRange::new(20, 25).is_ok());
    /// assert!(PortRange::new(500, 100).is_err());
    /// assert!(PortRange::new(0, 10).is_err());
    /// ```
    pub fn new(start: u32, end: u32) -> ScanResult<Self> {
        let invalid = ScanError::InvalidPortRange { start, end };
        let (Ok(start), Ok(end)) = (u16::try_from(start), u16::try_from(end)) else {
            return Err(invalid);
        };
        if start < LOWEST_PORT_NUMBER || start > end {
            return Err(invalid);
        }

        Ok(Self { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in the range.
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    /// Always false, a `PortRange` holds at least one port.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_PORT,
            end: DEFAULT_END_PORT,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A correction applied while turning raw user input into a scan target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCorrection {
    /// Start or end port was not a number.
    NonNumericPorts,
    /// Ports were numbers but did not form a valid range.
    InvalidRange,
}

impl fmt::Display for InputCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonNumericPorts => write!(f, "Invalid port numbers. Using defaults."),
            Self::InvalidRange => write!(
                f,
                "Invalid port range. Using {DEFAULT_START_PORT}-{DEFAULT_END_PORT}."
            ),
        }
    }
}

/// Host and port range resolved from loosely typed input, with the defaults
/// filled in. Bad input never fails here: it falls back to `localhost` and
/// ports `1-1000`, and the fallback is listed in `corrections`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInput {
    pub host: String,
    pub range: PortRange,
    pub corrections: Vec<InputCorrection>,
}

impl ScanInput {
    /// ```rust
    /// # use bannerscan::input::{ScanInput, InputCorrection};
    /// let input = ScanInput::resolve(Some("  "), Some("500"), Some("100"));
    /// assert_eq!(input.host, "localhost");
    /// assert_eq!(input.range.to_string(), "1-1000");
    /// assert_eq!(input.corrections, vec![InputCorrection::InvalidRange]);
    /// ```
    pub fn resolve(target: Option<&str>, start: Option<&str>, end: Option<&str>) -> Self {
        let host = match target.map(str::trim) {
            Some(host) if !host.is_empty() => host.to_owned(),
            _ => DEFAULT_HOST.to_owned(),
        };

        let mut corrections = Vec::new();
        let parsed = (
            parse_port_field(start, DEFAULT_START_PORT),
            parse_port_field(end, DEFAULT_END_PORT),
        );
        let range = match parsed {
            (Some(start), Some(end)) => {
                let range = u32::try_from(start)
                    .ok()
                    .zip(u32::try_from(end).ok())
                    .and_then(|(start, end)| PortRange::new(start, end).ok());
                range.unwrap_or_else(|| {
                    corrections.push(InputCorrection::InvalidRange);
                    PortRange::default()
                })
            }
            _ => {
                corrections.push(InputCorrection::NonNumericPorts);
                PortRange::default()
            }
        };

        Self {
            host,
            range,
            corrections,
        }
    }
}

/// Empty input takes the default, anything else must be an integer.
/// Whitespace alone is not empty and fails to parse.
fn parse_port_field(raw: Option<&str>, default: u16) -> Option<i64> {
    match raw {
        None | Some("") => Some(i64::from(default)),
        Some(value) => value.trim().parse().ok(),
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bannerscan",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Concurrent TCP port scanner that grabs a short banner from every open port.
/// WARNING Only scan hosts you are allowed to scan.
pub struct Opts {
    /// IP address or hostname to scan. Defaults to localhost.
    pub target: Option<String>,

    /// First port of the range. Non-numeric input falls back to 1-1000.
    #[arg(short, long, allow_hyphen_values = true)]
    pub start: Option<String>,

    /// Last port of the range. Non-numeric input falls back to 1-1000.
    #[arg(short, long, allow_hyphen_values = true)]
    pub end: Option<String>,

    /// Prompt for target and ports on stdin.
    #[arg(short, long)]
    pub interactive: bool,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. Only output the open ports at the end.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Print the final report as JSON.
    #[arg(long)]
    pub json: bool,

    /// A comma-delimited list or file of DNS resolvers.
    #[arg(long)]
    pub resolver: Option<String>,

    /// How many probes may be in flight at once. Every probe holds one
    /// socket, so this is bounded by the open file limit of your OS.
    #[arg(short, long, default_value = "100")]
    pub batch_size: u16,

    /// The timeout in milliseconds before a port is assumed to be closed.
    #[arg(short, long, default_value = "1000")]
    pub timeout: u32,

    /// The timeout in milliseconds for sending the probe and reading the
    /// banner. Defaults to the connection timeout.
    #[arg(long)]
    pub banner_timeout: Option<u32>,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,

    /// The order of scanning to be performed. The "serial" option will
    /// scan ports in ascending order while the "random" option will scan
    /// ports randomly.
    #[arg(long, value_enum, ignore_case = true, default_value = "serial")]
    pub scan_order: ScanOrder,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        Opts::parse()
    }

    /// Merges values found within the user configuration file into the
    /// command line options.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(
            greppable,
            accessible,
            json,
            batch_size,
            timeout,
            scan_order
        );
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if self.$field.is_none() && config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(target, banner_timeout, resolver, ulimit);
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            target: None,
            start: None,
            end: None,
            interactive: false,
            no_config: true,
            config_path: None,
            greppable: true,
            accessible: false,
            json: false,
            resolver: None,
            batch_size: 0,
            timeout: 0,
            banner_timeout: None,
            ulimit: None,
            scan_order: ScanOrder::Serial,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    target: Option<String>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    json: Option<bool>,
    batch_size: Option<u16>,
    timeout: Option<u32>,
    banner_timeout: Option<u32>,
    ulimit: Option<u64>,
    resolver: Option<String>,
    scan_order: Option<ScanOrder>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing or unreadable file yields an empty config.
    ///
    /// # Format
    ///
    /// target = "127.0.0.1"
    /// batch_size = 200
    /// timeout = 1500
    /// banner_timeout = 500
    /// scan_order = "Serial"
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Result<Self, toml::de::Error> {
        let Some(config_path) = custom_config_path.or_else(default_config_path) else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(config_path).unwrap_or_default();
        toml::from_str(&content)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".bannerscan.toml");
    Some(config_path)
}
