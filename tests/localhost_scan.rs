//! End-to-end scans against loopback listeners.

use bannerscan::input::{PortRange, ScanOrder};
use bannerscan::scanner::{Banner, ScanReport, ScanTarget, Scanner};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_millis(1_000);
const BANNER_TIMEOUT: Duration = Duration::from_millis(300);

fn bind(port: u16) -> std::io::Result<TcpSocket> {
    let socket = TcpSocket::new_v4()?;
    socket.bind(([127, 0, 0, 1], port).into())?;
    Ok(socket)
}

/// Binds `len` consecutive loopback ports, returning the sockets in port
/// order. A bound socket that never listens refuses connections and keeps
/// the port from being reused by other tests.
fn reserve_block(len: u16) -> Vec<TcpSocket> {
    for _ in 0..100 {
        let first = bind(0).unwrap();
        let base = first.local_addr().unwrap().port();
        if base.checked_add(len).is_none() {
            continue;
        }

        let mut block = vec![first];
        for offset in 1..len {
            match bind(base + offset) {
                Ok(socket) => block.push(socket),
                Err(_) => break,
            }
        }
        if block.len() == usize::from(len) {
            return block;
        }
    }
    panic!("could not reserve {len} consecutive loopback ports");
}

fn block_range(block: &[TcpSocket]) -> PortRange {
    let first = block[0].local_addr().unwrap().port();
    let last = block[block.len() - 1].local_addr().unwrap().port();
    PortRange::new(first.into(), last.into()).unwrap()
}

/// Serves `svc-<port>` on every connection until the test ends.
fn serve_banner(socket: TcpSocket) {
    let listener: TcpListener = socket.listen(1024).unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = stream.write_all(format!("svc-{port}\r\n").as_bytes()).await;
                let mut buf = [0u8; 256];
                while let Ok(n) = stream.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
}

/// Ports `base..base+len` where only the given offsets are listening. The
/// returned sockets hold the closed ports and must outlive the scan.
fn open_offsets(len: u16, offsets: &[u16]) -> (PortRange, Vec<u16>, Vec<TcpSocket>) {
    let block = reserve_block(len);
    let range = block_range(&block);
    let mut open = Vec::new();
    let mut closed = Vec::new();

    for (offset, socket) in (0..len).zip(block) {
        if offsets.contains(&offset) {
            open.push(range.start() + offset);
            serve_banner(socket);
        } else {
            closed.push(socket);
        }
    }

    (range, open, closed)
}

async fn scan(range: PortRange, batch_size: usize, order: ScanOrder) -> ScanReport {
    Scanner::new(
        ScanTarget::new("127.0.0.1", range),
        batch_size,
        TIMEOUT,
        BANNER_TIMEOUT,
        order,
    )
    .run()
    .await
    .unwrap()
}

fn open_ports(report: &ScanReport) -> Vec<u16> {
    report.open_ports().iter().map(|o| o.port).collect()
}

#[tokio::test]
async fn finds_open_ports_in_port_order() {
    let (range, expected, _closed) = open_offsets(10, &[0, 3, 7]);

    let report = scan(range, 4, ScanOrder::Random).await;

    assert_eq!(open_ports(&report), expected);
    assert_eq!(report.attempted(), 10);
    assert_eq!(report.requested(), 10);
    assert_eq!(report.open_count(), 3);
    assert!(!report.is_cancelled());
    for outcome in report.open_ports() {
        assert_eq!(
            outcome.banner(),
            Some(&Banner::Text(format!("svc-{}", outcome.port)))
        );
    }
}

#[tokio::test]
async fn concurrency_does_not_change_the_result() {
    let (range, expected, _closed) = open_offsets(12, &[1, 2, 11]);

    let narrow = scan(range, 1, ScanOrder::Serial).await;
    let wide = scan(range, 64, ScanOrder::Random).await;

    assert_eq!(open_ports(&narrow), expected);
    assert_eq!(open_ports(&wide), expected);
    assert_eq!(narrow.attempted(), wide.attempted());
}

#[tokio::test]
async fn open_ports_are_streamed_as_found() {
    let (range, expected, _closed) = open_offsets(8, &[2, 5]);
    let mut streamed = Vec::new();

    let report = Scanner::new(
        ScanTarget::new("127.0.0.1", range),
        8,
        TIMEOUT,
        BANNER_TIMEOUT,
        ScanOrder::Serial,
    )
    .run_with(|outcome| streamed.push(outcome.port))
    .await
    .unwrap();

    streamed.sort_unstable();
    assert_eq!(streamed, expected);
    assert_eq!(open_ports(&report), expected);
}

#[tokio::test]
async fn closed_ports_stay_closed_across_scans() {
    let (range, expected, _closed) = open_offsets(6, &[]);
    assert!(expected.is_empty());

    for _ in 0..2 {
        let report = scan(range, 3, ScanOrder::Random).await;
        assert_eq!(report.open_count(), 0);
        assert_eq!(report.attempted(), 6);
    }
}

#[tokio::test]
async fn localhost_name_is_resolved_once() {
    let (range, expected, _closed) = open_offsets(4, &[1]);

    let report = Scanner::new(
        ScanTarget::new("localhost", range),
        4,
        TIMEOUT,
        BANNER_TIMEOUT,
        ScanOrder::Serial,
    )
    .run()
    .await
    .unwrap();

    assert_eq!(open_ports(&report), expected);
}

#[tokio::test]
async fn cancelling_mid_scan_finishes_in_flight_probes() {
    let block = reserve_block(10);
    let range = block_range(&block);
    // listening but never accepted, so every probe waits out its banner timeout
    let _silent = block
        .into_iter()
        .map(|socket| socket.listen(1024).unwrap())
        .collect::<Vec<_>>();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let mut streamed = 0;
    let report = Scanner::new(
        ScanTarget::new("127.0.0.1", range),
        2,
        TIMEOUT,
        Duration::from_secs(1),
        ScanOrder::Serial,
    )
    .with_cancellation(token)
    .run_with(|_| streamed += 1)
    .await
    .unwrap();

    assert!(report.is_cancelled());
    assert_eq!(report.attempted(), 2);
    assert_eq!(report.requested(), 10);
    assert_eq!(report.open_count(), 2);
    assert_eq!(streamed, report.open_count());
    for outcome in report.open_ports() {
        assert_eq!(outcome.banner(), Some(&Banner::Missing));
    }
}

#[tokio::test]
#[ignore]
async fn unresolvable_host_closes_every_port() {
    let range = PortRange::new(80, 82).unwrap();

    let report = Scanner::new(
        ScanTarget::new("host.invalid", range),
        3,
        TIMEOUT,
        BANNER_TIMEOUT,
        ScanOrder::Serial,
    )
    .run()
    .await
    .unwrap();

    assert_eq!(report.attempted(), 3);
    assert_eq!(report.open_count(), 0);
}
