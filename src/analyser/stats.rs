//! Running distributions over protocols, addresses and ports, plus the
//! application-layer logs (HTTP requests, DNS queries).
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use super::containers::{AppRecord, DnsQuery, HttpRequest, PacketRecord, TransportKind};

/// The fields a registry update may carry. Absent fields are not counted.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatEvent {
    pub protocol: Option<TransportKind>,
    pub src_addr: Option<IpAddr>,
    pub dst_addr: Option<IpAddr>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

impl From<&PacketRecord> for StatEvent {
    fn from(record: &PacketRecord) -> Self {
        Self {
            protocol: record.transport,
            src_addr: record.src_addr,
            dst_addr: record.dst_addr,
            src_port: record.src_port,
            dst_port: record.dst_port,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Logged<T> {
    pub timestamp: DateTime<Utc>,
    pub entry: T,
}

/// Counters only grow. Build a new registry to start over.
#[derive(Debug, Default)]
pub struct StatisticsRegistry {
    protocols: HashMap<TransportKind, u64>,
    addresses: HashMap<IpAddr, u64>,
    ports: HashMap<u16, u64>,
    http_requests: Vec<Logged<HttpRequest>>,
    dns_queries: Vec<Logged<DnsQuery>>,
}

impl StatisticsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: StatEvent) {
        if let Some(protocol) = event.protocol {
            *self.protocols.entry(protocol).or_insert(0) += 1;
        }
        for addr in [event.src_addr, event.dst_addr].into_iter().flatten() {
            *self.addresses.entry(addr).or_insert(0) += 1;
        }
        for port in [event.src_port, event.dst_port].into_iter().flatten() {
            *self.ports.entry(port).or_insert(0) += 1;
        }
    }

    /// Counts the record and keeps any HTTP request or DNS query it carries.
    pub fn record_packet(&mut self, record: &PacketRecord) {
        self.record(StatEvent::from(record));

        match &record.app {
            Some(AppRecord::Http(request)) => self.http_requests.push(Logged {
                timestamp: record.timestamp,
                entry: request.clone(),
            }),
            Some(AppRecord::Dns(query)) if !query.name.is_empty() => self.dns_queries.push(Logged {
                timestamp: record.timestamp,
                entry: query.clone(),
            }),
            _ => {}
        }
    }

    pub fn protocol_distribution(&self) -> HashMap<TransportKind, u64> {
        self.protocols.clone()
    }

    pub fn address_distribution(&self) -> HashMap<IpAddr, u64> {
        self.addresses.clone()
    }

    pub fn port_distribution(&self) -> HashMap<u16, u64> {
        self.ports.clone()
    }

    pub fn http_requests(&self) -> &[Logged<HttpRequest>] {
        &self.http_requests
    }

    pub fn dns_queries(&self) -> &[Logged<DnsQuery>] {
        &self.dns_queries
    }
}
