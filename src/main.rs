#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown, clippy::if_not_else, clippy::non_ascii_literal)]

use anyhow::Context;
use bannerscan::input::{Config, Opts, ScanInput};
use bannerscan::scanner::{ScanTarget, Scanner};
use bannerscan::{detail, output, tui, warning};
use log::{debug, info};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
const DEFAULT_FILE_DESCRIPTORS_LIMIT: u64 = 1024;
// stdio, the resolver and the runtime need a few descriptors of their own
#[cfg(unix)]
const RESERVED_FILE_DESCRIPTORS: u64 = 100;

#[cfg(not(tarpaulin_include))]
/// Concurrent TCP port scanner with banner grabbing.
/// If you're looking for the actual scanning, check out the module Scanner
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts: Opts = Opts::read();
    let config = Config::read(opts.config_path.clone())
        .context("Found an error in the configuration file. Aborting scan")?;
    opts.merge(&config);

    debug!("Main() `opts` arguments are {opts:?}");

    let quiet = opts.greppable || opts.json;
    if opts.interactive {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        opts.target = ask(
            &mut lines,
            "Enter target IP or hostname (default: localhost): ",
            quiet,
        )
        .await?;
        opts.start = ask(&mut lines, "Enter start port (default: 1): ", quiet).await?;
        opts.end = ask(&mut lines, "Enter end port (default: 1000): ", quiet).await?;
    }

    let input = ScanInput::resolve(
        opts.target.as_deref(),
        opts.start.as_deref(),
        opts.end.as_deref(),
    );
    for correction in &input.corrections {
        warning!(correction.to_string(), quiet, opts.accessible);
    }

    #[cfg(unix)]
    let batch_size = infer_batch_size(&opts, adjust_ulimit_size(&opts));

    #[cfg(not(unix))]
    let batch_size = opts.batch_size;

    let timeout = Duration::from_millis(opts.timeout.into());
    let banner_timeout = opts
        .banner_timeout
        .map_or(timeout, |ms| Duration::from_millis(ms.into()));

    detail!(
        format!(
            "Scanning {} from port {} to {}...",
            input.host,
            input.range.start(),
            input.range.end()
        ),
        quiet,
        opts.accessible
    );

    let cancellation = CancellationToken::new();
    let on_ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, waiting for in-flight probes");
            on_ctrl_c.cancel();
        }
    });

    let scanner = Scanner::new(
        ScanTarget::new(input.host, input.range),
        batch_size.into(),
        timeout,
        banner_timeout,
        opts.scan_order,
    )
    .with_resolver(opts.resolver.clone())
    .with_cancellation(cancellation);

    let report = scanner
        .run_with(|outcome| {
            if !quiet {
                println!("{}", tui::open_port_line(outcome, opts.accessible));
            }
        })
        .await?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if opts.greppable {
        println!("{}", tui::greppable_line(&report));
    } else {
        println!();
        for line in tui::summary_lines(&report) {
            println!("{line}");
        }
        println!();
        output!("Scan complete!", quiet, opts.accessible);
    }

    Ok(())
}

/// Prints `question` and reads one line of stdin. `None` at end of input.
/// In quiet mode the prompt goes to stderr, leaving stdout to the report.
async fn ask<R>(
    lines: &mut Lines<R>,
    question: &str,
    quiet: bool,
) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    if quiet {
        eprint!("{question}");
        std::io::stderr().flush()?;
    } else {
        print!("{question}");
        std::io::stdout().flush()?;
    }
    Ok(lines.next_line().await?)
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.greppable || opts.json,
                opts.accessible
            );
        } else {
            warning!(
                "ERROR. Failed to set ulimit value.",
                opts.greppable || opts.json,
                opts.accessible
            );
        }
    }

    Resource::NOFILE
        .get()
        .map_or(DEFAULT_FILE_DESCRIPTORS_LIMIT, |(soft, _)| soft)
}

/// Keeps the number of simultaneously open sockets inside the file
/// descriptor budget.
#[cfg(unix)]
fn infer_batch_size(opts: &Opts, ulimit: u64) -> u16 {
    let mut batch_size: u64 = opts.batch_size.into();

    if ulimit < batch_size + RESERVED_FILE_DESCRIPTORS {
        warning!(
            "File limit is lower than the batch size. Consider upping it with --ulimit.",
            opts.greppable || opts.json,
            opts.accessible
        );

        if ulimit < 2 * RESERVED_FILE_DESCRIPTORS {
            info!("Halving batch_size because ulimit is very small");
            batch_size = ulimit / 2;
        } else {
            batch_size = ulimit - RESERVED_FILE_DESCRIPTORS;
        }
    }

    u16::try_from(batch_size.max(1)).unwrap_or(u16::MAX)
}
