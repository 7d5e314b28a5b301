//! This crate exposes the scanning engine of the `bannerscan` port scanner.
//!
//! bannerscan connects to every TCP port of an inclusive range on one host,
//! reports which ports accept a connection and grabs a short identifying
//! response ("banner") from each open port.
//!
//! ## Architecture Overview
//!
//! The core scanning behaviour is managed by
//! [`Scanner`](crate::scanner::Scanner), which hands every port of the range
//! to a [`ProbeConnector`](crate::scanner::ProbeConnector) through a bounded
//! pool of in-flight probes:
//!
//! 1. **Input Processing**: host and port range are resolved, with defaults
//!    for missing or bad input ([`input::ScanInput`])
//! 2. **Port Strategy**: determines the order in which ports are dispatched
//! 3. **Probing**: one full TCP handshake per port, then the probe payload
//!    is sent and up to 1024 bytes are read back
//! 4. **Result Processing**: open ports are reported as they are found and
//!    collected into a [`ScanReport`](crate::scanner::ScanReport) sorted by
//!    port
//!
//! ## Basic Usage Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use bannerscan::input::{PortRange, ScanOrder};
//! use bannerscan::scanner::{ScanTarget, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let target = ScanTarget::new("127.0.0.1", PortRange::new(1, 1_000)?);
//!
//!     let scanner = Scanner::new(
//!         target,
//!         100,                        // Probes in flight at once
//!         Duration::from_millis(500), // Connection timeout
//!         Duration::from_millis(500), // Banner timeout
//!         ScanOrder::Serial,
//!     );
//!
//!     let report = scanner
//!         .run_with(|open| println!("Port {} is open", open.port))
//!         .await?;
//!
//!     println!(
//!         "{} of {} ports open",
//!         report.open_count(),
//!         report.attempted()
//!     );
//!     for outcome in report.open_ports() {
//!         println!("  {}: {}", outcome.port, outcome.banner().unwrap());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Per-port failures (refused, unreachable, timed out, unresolvable) are part
//! of the per-port [`ProbeOutcome`](crate::scanner::ProbeOutcome) and never
//! stop a scan. Only [`ScanError`](crate::error::ScanError) aborts one, for
//! example when the process runs out of file descriptors.
#![allow(clippy::needless_doctest_main)]

pub mod tui;

pub mod input;

pub mod scanner;

pub mod port_strategy;

pub mod address;

pub mod error;
