//! Utilities for terminal output during scanning.
use crate::scanner::{ProbeOutcome, ScanReport};
use colored::Colorize;

/// Terminal User Interface Module for bannerscan
/// Defines macros to use
#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        println!("{} {}", colored::Colorize::bold(colored::Colorize::red("[!]")), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", colored::Colorize::bold(colored::Colorize::red("[!]")), $name);
            }
        }
    };
}

#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        println!("{} {}", colored::Colorize::bold(colored::Colorize::blue("[~]")), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", colored::Colorize::bold(colored::Colorize::blue("[~]")), $name);
            }
        }
    };
}

#[macro_export]
macro_rules! output {
    ($name:expr) => {
        println!("{} {}", colored::Colorize::bold(colored::Colorize::green("[>]")), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", colored::Colorize::bold(colored::Colorize::green("[>]")), $name);
            }
        }
    };
}

/// Well-known services suggested when a scan finds nothing open.
pub const SERVICE_HINTS: [(&str, &[u16]); 4] = [
    ("Web servers", &[80, 443, 8080]),
    ("SSH", &[22]),
    ("MySQL", &[3306]),
    ("PostgreSQL", &[5432]),
];

/// One line per hint, e.g. `- SSH typically runs on port 22`.
pub fn service_hint_lines() -> Vec<String> {
    SERVICE_HINTS
        .iter()
        .map(|(service, ports)| {
            let ports = ports.iter().map(u16::to_string).collect::<Vec<_>>();
            let noun = if ports.len() == 1 { "port" } else { "ports" };
            let verb = if service.ends_with('s') { "run" } else { "runs" };
            format!("- {service} typically {verb} on {noun} {}", ports.join(", "))
        })
        .collect()
}

/// Printed the moment an open port is found.
pub fn open_port_line(outcome: &ProbeOutcome, accessible: bool) -> String {
    let banner = outcome
        .banner()
        .map(ToString::to_string)
        .unwrap_or_default();
    if accessible {
        format!("Port {} is OPEN - {banner}", outcome.port)
    } else {
        format!(
            "{} Port {} is OPEN - {}",
            "[+]".green().bold(),
            outcome.port.to_string().purple(),
            banner
        )
    }
}

/// Greppable form of a report: `host -> [22,80]`.
pub fn greppable_line(report: &ScanReport) -> String {
    let ports = report
        .open_ports()
        .iter()
        .map(|outcome| outcome.port.to_string())
        .collect::<Vec<_>>();
    format!("{} -> [{}]", report.host(), ports.join(","))
}

/// The end-of-scan summary, sorted by port.
pub fn summary_lines(report: &ScanReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.is_cancelled() {
        lines.push(format!(
            "Scan cancelled, results cover {} of {} ports.",
            report.attempted(),
            report.requested()
        ));
    }

    if report.open_ports().is_empty() {
        lines.push("No open ports found in the specified range.".to_owned());
        lines.push(String::new());
        lines.push("Common services to check:".to_owned());
        lines.extend(service_hint_lines());
    } else {
        lines.push(format!("Found {} open port(s):", report.open_count()));
        lines.extend(report.open_ports().iter().map(|outcome| {
            format!(
                "  Port {}: {}",
                outcome.port,
                outcome
                    .banner()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            )
        }));
    }
    lines
}
