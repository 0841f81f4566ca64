use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;

/// Transport layer a packet was dissected with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TransportKind {
    Tcp,
    Udp,
    Sctp,
    Dccp,
}

impl TransportKind {
    /// Maps a tshark layer name onto a transport, if it is one.
    pub fn from_layer(name: &str) -> Option<Self> {
        match name {
            "tcp" => Some(TransportKind::Tcp),
            "udp" => Some(TransportKind::Udp),
            "sctp" => Some(TransportKind::Sctp),
            "dccp" => Some(TransportKind::Dccp),
            _ => None,
        }
    }

    pub fn layer_name(&self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Udp => "udp",
            TransportKind::Sctp => "sctp",
            TransportKind::Dccp => "dccp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.layer_name().to_uppercase())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HttpRequest {
    pub method: String,
    pub uri: String,
    pub host: String,
    pub user_agent: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DnsQuery {
    pub name: String,
    pub query_type: Option<u16>,
    pub response: bool,
}

/// Application layer payload we know how to read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AppRecord {
    Http(HttpRequest),
    Dns(DnsQuery),
}

/// A decoded packet as handed over by the capture source.
///
/// Every layer is optional. A record with no addresses is still a valid record,
/// it just cannot be keyed into a flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PacketRecord {
    pub timestamp: DateTime<Utc>,
    pub src_addr: Option<IpAddr>,
    pub dst_addr: Option<IpAddr>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub transport: Option<TransportKind>,
    pub length: u64,
    pub app: Option<AppRecord>,
}

impl PacketRecord {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            src_addr: None,
            dst_addr: None,
            src_port: None,
            dst_port: None,
            transport: None,
            length: 0,
            app: None,
        }
    }

    pub fn with_addrs(mut self, src: IpAddr, dst: IpAddr) -> Self {
        self.src_addr = Some(src);
        self.dst_addr = Some(dst);
        self
    }

    pub fn with_transport(mut self, kind: TransportKind, src_port: Option<u16>, dst_port: Option<u16>) -> Self {
        self.transport = Some(kind);
        self.src_port = src_port;
        self.dst_port = dst_port;
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = length;
        self
    }

    pub fn with_app(mut self, app: AppRecord) -> Self {
        self.app = Some(app);
        self
    }

    /// Directional key of this record, if both addresses are known.
    pub fn flow_key(&self) -> Option<FlowKey> {
        Some(FlowKey::new(self.src_addr?, self.dst_addr?))
    }
}

/// Directional (src, dst) pair. Use [FlowKey::normalized] for conversation-level keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FlowKey {
    pub src: IpAddr,
    pub dst: IpAddr,
}

impl FlowKey {
    pub fn new(src: IpAddr, dst: IpAddr) -> Self {
        Self { src, dst }
    }

    /// Same key with the endpoints sorted by address value, so both directions compare equal.
    pub fn normalized(&self) -> Self {
        if self.src <= self.dst {
            *self
        } else {
            Self { src: self.dst, dst: self.src }
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// Key used by the port scan heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScanKey {
    pub src: IpAddr,
    pub dst_port: u16,
}

/// Running aggregate for one flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FlowState {
    pub packet_count: u64,
    pub byte_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub protocols: BTreeSet<TransportKind>,
}

impl FlowState {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            packet_count: 0,
            byte_count: 0,
            first_seen: timestamp,
            last_seen: timestamp,
            protocols: BTreeSet::new(),
        }
    }

    pub fn update(&mut self, record: &PacketRecord) {
        self.packet_count += 1;
        self.byte_count += record.length;
        // Input may arrive out of order.
        self.first_seen = self.first_seen.min(record.timestamp);
        self.last_seen = self.last_seen.max(record.timestamp);
        if let Some(transport) = record.transport {
            self.protocols.insert(transport);
        }
    }

    pub fn duration(&self) -> Duration {
        self.last_seen - self.first_seen
    }
}

/// A flow over the packet threshold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HighVolumeFlow {
    pub flow: FlowKey,
    pub packet_count: u64,
    pub byte_count: u64,
    pub duration_micros: i64,
}

/// Result of a single detection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AnomalyReport {
    pub high_volume_flows: Vec<HighVolumeFlow>,
    pub port_scan_sources: BTreeMap<IpAddr, usize>,
}

impl AnomalyReport {
    pub fn is_empty(&self) -> bool {
        self.high_volume_flows.is_empty() && self.port_scan_sources.is_empty()
    }
}

/// Unordered endpoint pair. Construction sorts the endpoints by address value
/// (`IpAddr` ordering), not by their text, so 10.0.0.9 comes before 10.0.0.10.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Conversation {
    pub a: IpAddr,
    pub b: IpAddr,
}

impl Conversation {
    pub fn new(x: IpAddr, y: IpAddr) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversationCount {
    pub conversation: Conversation,
    pub packets: u64,
}
