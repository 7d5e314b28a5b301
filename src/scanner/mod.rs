//! Core functionality for actual scanning behaviour.
use crate::address;
use crate::error::ScanResult;
use crate::input::{PortRange, ScanOrder};
use crate::port_strategy::PortStrategy;
use log::{debug, warn};

mod probe;
pub use probe::{
    probe, Banner, Endpoint, PortStatus, ProbeConnector, ProbeOutcome, MAX_BANNER_BYTES,
    MAX_BANNER_CHARS, PROBE_PAYLOAD,
};

use futures::{stream, StreamExt};
use serde_derive::Serialize;
use std::{collections::HashSet, num::NonZeroUsize, pin::pin, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Distinct connection errors kept for the debug log, the rest is dropped.
const MAX_DISTINCT_ERRORS: usize = 1_000;

/// The host and the inclusive port range of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub host: String,
    pub range: PortRange,
}

impl ScanTarget {
    pub fn new(host: impl Into<String>, range: PortRange) -> Self {
        Self {
            host: host.into(),
            range,
        }
    }
}

/// The terminal artifact of a scan: open ports in ascending order plus
/// how many ports were attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    host: String,
    range: PortRange,
    open_ports: Vec<ProbeOutcome>,
    attempted: usize,
    requested: usize,
    cancelled: bool,
}

impl ScanReport {
    /// Keeps the open outcomes only, sorted by port and without duplicates.
    pub fn new(
        target: &ScanTarget,
        outcomes: Vec<ProbeOutcome>,
        attempted: usize,
        cancelled: bool,
    ) -> Self {
        let mut open_ports = outcomes
            .into_iter()
            .filter(ProbeOutcome::is_open)
            .collect::<Vec<_>>();
        open_ports.sort_unstable_by_key(|outcome| outcome.port);
        open_ports.dedup_by_key(|outcome| outcome.port);

        Self {
            host: target.host.clone(),
            range: target.range,
            open_ports,
            attempted,
            requested: target.range.len(),
            cancelled,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    pub fn open_ports(&self) -> &[ProbeOutcome] {
        &self.open_ports
    }

    pub fn open_count(&self) -> usize {
        self.open_ports.len()
    }

    /// Ports that produced an outcome.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Ports in the requested range.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// True when a cancellation cut the scan short. The report then only
    /// covers the ports probed before the cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// The class for the scanner
/// target holds the host and the inclusive port range.
/// batch_size is how many probes may be in flight at once; it bounds the number of open sockets.
/// timeout is how long to wait for the handshake before declaring a port closed.
/// banner_timeout bounds sending the probe payload and reading the response.
#[derive(Debug)]
pub struct Scanner {
    target: ScanTarget,
    port_strategy: PortStrategy,
    batch_size: NonZeroUsize,
    timeout: Duration,
    banner_timeout: Duration,
    resolver: Option<String>,
    cancellation: Option<CancellationToken>,
}

impl Scanner {
    pub fn new(
        target: ScanTarget,
        batch_size: usize,
        timeout: Duration,
        banner_timeout: Duration,
        order: ScanOrder,
    ) -> Self {
        Self {
            port_strategy: PortStrategy::pick(target.range, order),
            target,
            batch_size: NonZeroUsize::new(batch_size).unwrap_or(NonZeroUsize::MIN),
            timeout,
            banner_timeout,
            resolver: None,
            cancellation: None,
        }
    }

    /// DNS servers (comma separated, or a file of IPs) used when the
    /// system resolver can't resolve the target.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Option<String>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Stops handing out new ports once `token` is cancelled. Probes already
    /// in flight run until their own timeouts.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Runs the scan and returns the report once every probe has finished.
    pub async fn run(&self) -> ScanResult<ScanReport> {
        self.run_with(|_| {}).await
    }

    /// Like [`Scanner::run`], calling `on_open` for every open port as soon
    /// as it is found. Ports are reported in completion order, not in port
    /// order.
    pub async fn run_with<F>(&self, mut on_open: F) -> ScanResult<ScanReport>
    where
        F: FnMut(&ProbeOutcome),
    {
        let endpoint =
            match address::resolve_host(&self.target.host, self.resolver.as_deref()).await {
                Some(ip) => Endpoint::Ip(ip),
                None => {
                    warn!(
                        "Host {:?} could not be resolved, every probe will retry the lookup",
                        self.target.host
                    );
                    Endpoint::Host(self.target.host.clone())
                }
            };
        let connector = Arc::new(ProbeConnector::new(
            endpoint,
            self.timeout,
            self.banner_timeout,
        ));

        debug!(
            "Start scanning {} ({}).\nBatch size {}\nNumber of ports {}",
            self.target.host,
            self.target.range,
            self.batch_size,
            self.target.range.len()
        );

        let never = CancellationToken::new();
        let cancellation = self.cancellation.as_ref().unwrap_or(&never);

        let outcomes = stream::iter(self.port_strategy.ordered_iter())
            .take_until(cancellation.cancelled())
            .map(|port| {
                let connector = Arc::clone(&connector);
                async move { connector.probe(port).await }
            })
            .buffer_unordered(self.batch_size.get());
        let mut outcomes = pin!(outcomes);

        let mut attempted = 0;
        let mut open = Vec::new();
        let mut errors: HashSet<String> = HashSet::new();

        while let Some(outcome) = outcomes.next().await {
            // fatal: returning drops the stream and every in-flight probe
            let outcome = outcome?;
            attempted += 1;

            match &outcome.status {
                PortStatus::Open { banner } => {
                    debug!("Port {} is open: {banner}", outcome.port);
                    on_open(&outcome);
                    open.push(outcome);
                }
                PortStatus::Closed { error } => {
                    if errors.len() < MAX_DISTINCT_ERRORS {
                        errors.insert(error.clone());
                    }
                }
                PortStatus::TimedOut => {}
            }
        }

        let cancelled = attempted < self.target.range.len();
        if cancelled {
            warn!(
                "Scan of {} cancelled after {attempted} of {} ports",
                self.target.host,
                self.target.range.len()
            );
        }

        debug!("Typical socket connection errors {errors:?}");
        let report = ScanReport::new(&self.target, open, attempted, cancelled);
        debug!(
            "Open ports found: {:?}",
            report.open_ports().iter().map(|o| o.port).collect::<Vec<_>>()
        );
        Ok(report)
    }
}
