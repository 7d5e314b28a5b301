//! A single connect-and-grab attempt against one port.
use crate::error::{ScanError, ScanResult};
use log::debug;
use serde::Serializer;
use serde_derive::Serialize;
use std::{
    fmt,
    io::ErrorKind,
    net::{IpAddr, SocketAddr},
    str::FromStr,
    time::Duration,
};
use tokio::{
    io::{self, AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time,
};

/// Sent to every open port to coax a response out of it.
pub const PROBE_PAYLOAD: &[u8] = b"HEAD / HTTP/1.0\r\n\r\n";
/// Upper bound on how much of the response is read.
pub const MAX_BANNER_BYTES: usize = 1024;
/// Banners are cut to this many characters.
pub const MAX_BANNER_CHARS: usize = 50;

const NO_BANNER: &str = "No banner";

/// Text captured from an open port, or the lack of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Text(String),
    /// The peer wrote nothing usable before the banner timeout, closed the
    /// connection, or the exchange failed.
    Missing,
}

impl Banner {
    /// Decodes a raw response leniently.
    ///
    /// Bytes that are not valid UTF-8 are dropped, surrounding whitespace is
    /// trimmed and the text is cut to [`MAX_BANNER_CHARS`] characters. An
    /// empty result is [`Banner::Missing`].
    ///
    /// ```rust
    /// # use bannerscan::scanner::Banner;
    /// assert_eq!(
    ///     Banner::from_bytes(b"  SSH-2.0-OpenSSH_9.6\r\n"),
    ///     Banner::Text("SSH-2.0-OpenSSH_9.6".to_owned())
    /// );
    /// assert_eq!(Banner::from_bytes(b"\r\n"), Banner::Missing);
    /// ```
    pub fn from_bytes(raw: &[u8]) -> Self {
        let cleaned = raw
            .utf8_chunks()
            .map(|chunk| chunk.valid())
            .collect::<String>();
        let truncated = cleaned
            .trim()
            .chars()
            .take(MAX_BANNER_CHARS)
            .collect::<String>();

        // the cut may land right after whitespace
        let text = truncated.trim_end();
        if text.is_empty() {
            Banner::Missing
        } else {
            Banner::Text(text.to_owned())
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Banner::Text(text) => Some(text),
            Banner::Missing => None,
        }
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text().unwrap_or(NO_BANNER))
    }
}

impl serde::Serialize for Banner {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// What a probe learned about a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PortStatus {
    /// The handshake completed within the timeout.
    Open { banner: Banner },
    /// The handshake did not complete within the timeout.
    TimedOut,
    /// Refused, unreachable, unresolvable, or any other connect failure.
    Closed { error: String },
}

/// One per attempted port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    pub port: u16,
    #[serde(flatten)]
    pub status: PortStatus,
}

impl ProbeOutcome {
    pub fn is_open(&self) -> bool {
        matches!(self.status, PortStatus::Open { .. })
    }

    /// Only open ports carry a banner.
    pub fn banner(&self) -> Option<&Banner> {
        match &self.status {
            PortStatus::Open { banner } => Some(banner),
            _ => None,
        }
    }

    /// Diagnostic text for non-timeout connect failures.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            PortStatus::Closed { error } => Some(error),
            _ => None,
        }
    }
}

/// Where the probes connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Ip(IpAddr),
    /// A name that is resolved again by every connection attempt.
    Host(String),
}

impl Endpoint {
    pub fn parse(host: &str) -> Self {
        IpAddr::from_str(host).map_or_else(|_| Endpoint::Host(host.to_owned()), Endpoint::Ip)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Ip(ip) => write!(f, "{ip}"),
            Endpoint::Host(host) => f.write_str(host),
        }
    }
}

/// Probes `port` on `host`.
///
/// Every failure is folded into the outcome, this never errors. See
/// [`ProbeConnector::probe`] for the variant the scanner uses, which keeps
/// file descriptor exhaustion apart from per-port failures.
pub async fn probe(
    host: &str,
    port: u16,
    timeout: Duration,
    banner_timeout: Duration,
) -> ProbeOutcome {
    let connector = ProbeConnector::new(Endpoint::parse(host), timeout, banner_timeout);
    match connector.probe(port).await {
        Ok(outcome) => outcome,
        Err(err) => ProbeOutcome {
            port,
            status: PortStatus::Closed {
                error: err.to_string(),
            },
        },
    }
}

#[derive(Debug)]
pub struct ProbeConnector {
    endpoint: Endpoint,
    timeout: Duration,
    banner_timeout: Duration,
}

impl ProbeConnector {
    pub fn new(endpoint: Endpoint, timeout: Duration, banner_timeout: Duration) -> Self {
        Self {
            endpoint,
            timeout,
            banner_timeout,
        }
    }

    /// Connects once, grabs a banner and closes the stream again.
    ///
    /// Returns `Err` only when the OS runs out of file descriptors, since
    /// that says nothing about the port itself.
    pub async fn probe(&self, port: u16) -> ScanResult<ProbeOutcome> {
        let status = match self.connect(port).await {
            Ok(mut stream) => {
                let banner = grab_banner(&mut stream, self.banner_timeout).await;
                debug!("Port {port} is open, shutting down stream");
                if let Err(e) = stream.shutdown().await {
                    debug!("Shutdown stream error {}", &e);
                }
                PortStatus::Open { banner }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => PortStatus::TimedOut,
            Err(e) => {
                if is_fd_exhaustion(&e) {
                    return Err(ScanError::ResourceExhausted(e.to_string()));
                }
                PortStatus::Closed {
                    error: e.to_string(),
                }
            }
        };

        Ok(ProbeOutcome { port, status })
    }

    /// Performs the connection to the socket with timeout
    async fn connect(&self, port: u16) -> io::Result<TcpStream> {
        time::timeout(self.timeout, async move {
            match &self.endpoint {
                Endpoint::Ip(ip) => TcpStream::connect(SocketAddr::new(*ip, port)).await,
                Endpoint::Host(host) => TcpStream::connect((host.as_str(), port)).await,
            }
        })
        .await?
    }
}

/// Writes the probe payload and reads one chunk of whatever comes back.
/// Both steps share `wait`; any failure on the way is [`Banner::Missing`].
async fn grab_banner(stream: &mut TcpStream, wait: Duration) -> Banner {
    let exchange = async {
        stream.write_all(PROBE_PAYLOAD).await?;
        let mut buf = [0u8; MAX_BANNER_BYTES];
        let read = stream.read(&mut buf).await?;
        Ok::<_, io::Error>(Banner::from_bytes(&buf[..read]))
    };

    match time::timeout(wait, exchange).await {
        Ok(Ok(banner)) => banner,
        Ok(Err(e)) => {
            debug!("Banner exchange failed: {e}");
            Banner::Missing
        }
        Err(_) => Banner::Missing,
    }
}

fn is_fd_exhaustion(err: &io::Error) -> bool {
    err.to_string()
        .to_lowercase()
        .contains("too many open files")
}
