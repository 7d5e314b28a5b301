//! Lowers the descriptor limit of the whole test process, so this file is
//! kept apart from the other scan tests.
#![cfg(unix)]

use bannerscan::error::ScanError;
use bannerscan::input::{PortRange, ScanOrder};
use bannerscan::scanner::{ScanTarget, Scanner};
use rlimit::Resource;
use std::time::Duration;

#[tokio::test]
async fn running_out_of_descriptors_aborts_the_scan() {
    Resource::NOFILE.set(40, 40).unwrap();

    let scanner = Scanner::new(
        ScanTarget::new("127.0.0.1", PortRange::new(1, 5_000).unwrap()),
        500,
        Duration::from_millis(1_000),
        Duration::from_millis(1_000),
        ScanOrder::Serial,
    );

    match scanner.run().await {
        Err(ScanError::ResourceExhausted(error)) => {
            assert!(error.to_lowercase().contains("too many open files"));
        }
        other => panic!("expected the scan to abort, got {other:?}"),
    }
}
