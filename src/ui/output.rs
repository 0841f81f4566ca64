use crate::analyser::core::TrafficReport;
use crate::analyser::error::AnalyserError;
use ansi_term::Colour;
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::{fs, path::Path};

/// How many rows of each distribution table to print.
const TABLE_ROWS: usize = 10;

pub fn print_results(report: &TrafficReport) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} Results");
    print_summary(report);
    print_anomalies(report);
    print_distribution("Protocols", &report.protocols, |protocol| protocol.to_string());
    print_distribution("Addresses", &report.addresses, describe_address);
    print_distribution("Ports", &report.ports, |port| port.to_string());
    print_conversations(report);
    print_application(report);
}

pub fn print_summary(report: &TrafficReport) {
    let total_bytes: u64 = report.flows.iter().map(|flow| flow.state.byte_count).sum();

    println!("\u{2503}");
    println!("\u{2503} Packets analysed : {}", Colour::Fixed(226).paint(report.total_packets.to_string()));
    println!("\u{2503} Unique flows     : {}", Colour::Fixed(226).paint(report.flows.len().to_string()));
    println!("\u{2503} Flow bytes       : {}", Colour::Fixed(226).paint(format_bytes(total_bytes)));
    println!("\u{2503} ");
}

pub fn print_anomalies(report: &TrafficReport) {
    let anomalies = &report.anomalies;

    println!("\u{2523}\u{2501}\u{2501} Anomalies");
    if anomalies.is_empty() {
        println!("\u{2503} {}", Colour::Green.paint("None detected"));
    }

    if !anomalies.high_volume_flows.is_empty() {
        println!("\u{2503} High volume flows (> {} packets):", report.packet_threshold);
        for flow in &anomalies.high_volume_flows {
            println!(
                "\u{2503}   {} : {} packets, {}, {:.3}s",
                Colour::Red.paint(flow.flow.to_string()),
                flow.packet_count,
                format_bytes(flow.byte_count),
                flow.duration_micros as f64 / 1_000_000.0
            );
        }
    }

    if !anomalies.port_scan_sources.is_empty() {
        println!("\u{2503} Possible port scans (> {} ports):", report.scan_port_threshold);
        for (src, ports) in &anomalies.port_scan_sources {
            println!("\u{2503}   {} scanned {} ports", Colour::Red.paint(src.to_string()), ports);
        }
    }
    println!("\u{2503} ");
}

/// Prints the busiest entries of a counter map, highest first.
fn print_distribution<K, F>(title: &str, counts: &HashMap<K, u64>, label: F)
where
    K: Ord + Hash,
    F: Fn(&K) -> String,
{
    println!("\u{2523}\u{2501}\u{2501} {title}");
    for (key, count) in top_entries(counts, TABLE_ROWS) {
        println!("\u{2503}   {:<40} {}", label(key), Colour::Fixed(226).paint(count.to_string()));
    }
    println!("\u{2503} ");
}

pub fn print_conversations(report: &TrafficReport) {
    println!("\u{2523}\u{2501}\u{2501} Top {} conversations", report.top_conversations.len());
    for entry in &report.top_conversations {
        println!("\u{2503}   {:<40} {}", entry.conversation.to_string(), Colour::Fixed(226).paint(entry.packets.to_string()));
    }
    println!("\u{2503} ");
}

pub fn print_application(report: &TrafficReport) {
    if !report.http_requests.is_empty() {
        println!("\u{2523}\u{2501}\u{2501} HTTP requests");
        for logged in &report.http_requests {
            let request = &logged.entry;
            println!("\u{2503}   {} {} {}{} ({})", logged.timestamp.to_rfc3339(), Colour::Cyan.paint(&request.method), request.host, request.uri, request.user_agent);
        }
        println!("\u{2503} ");
    }

    if !report.dns_queries.is_empty() {
        println!("\u{2523}\u{2501}\u{2501} DNS queries");
        for logged in &report.dns_queries {
            let query = &logged.entry;
            let kind = if query.response { "response" } else { "query" };
            let qtype = query.query_type.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string());
            println!("\u{2503}   {} {} type {} ({kind})", logged.timestamp.to_rfc3339(), Colour::Cyan.paint(&query.name), qtype);
        }
        println!("\u{2503} ");
    }
    println!("\u{2517}\u{2501}\u{2501}\u{2501}\u{2501}");
}

pub fn data_as_json(report: &TrafficReport) -> Result<String, AnalyserError> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn data_to_file(json: String, path: &Path) -> Result<(), AnalyserError> {
    log::info!("Writing report to {}", path.display());
    fs::write(path, json)?;
    Ok(())
}

/// Highest counts first, ties broken by key so output is stable.
fn top_entries<K: Ord + Hash>(counts: &HashMap<K, u64>, n: usize) -> Vec<(&K, u64)> {
    let mut entries: Vec<(&K, u64)> = counts.iter().map(|(key, count)| (key, *count)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    entries.truncate(n);
    entries
}

fn describe_address(addr: &IpAddr) -> String {
    let scope = match addr {
        IpAddr::V4(v4) if v4.is_private() => "private",
        IpAddr::V4(v4) if v4.is_loopback() => "loopback",
        IpAddr::V4(v4) if v4.is_link_local() => "link-local",
        IpAddr::V6(v6) if v6.is_loopback() => "loopback",
        // fc00::/7
        IpAddr::V6(v6) if v6.segments()[0] & 0xfe00 == 0xfc00 => "private",
        // fe80::/10
        IpAddr::V6(v6) if v6.segments()[0] & 0xffc0 == 0xfe80 => "link-local",
        _ => "public",
    };
    format!("{addr} ({scope})")
}

/// Human-readable byte count, 1024 based.
pub fn format_bytes(size: u64) -> String {
    let mut size = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}
