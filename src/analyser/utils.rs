//! Contains utilities and helper functions that aid in Packet processing.
use chrono::{DateTime, Utc};
use rtshark::Packet;
use std::net::IpAddr;
use std::str::FromStr;
use super::containers::{AppRecord, DnsQuery, HttpRequest, PacketRecord, TransportKind};

/// Transport layers in the order we look for them.
const TRANSPORT_LAYERS: [&str; 4] = ["tcp", "udp", "sctp", "dccp"];

/// UDP reports its length including the 8 byte header.
const UDP_HEADER_LEN: u64 = 8;

/// Read access to a dissected packet, layer by layer.
trait FieldLookup {
    fn timestamp_micros(&self) -> Option<i64>;
    fn has_layer(&self, layer: &str) -> bool;
    fn field(&self, layer: &str, name: &str) -> Option<&str>;

    /// Like [FieldLookup::field], but parsed. Values that do not parse count as missing.
    fn parse_field<T: FromStr>(&self, layer: &str, name: &str) -> Option<T> {
        self.field(layer, name).and_then(parse_value)
    }
}

impl FieldLookup for Packet {
    fn timestamp_micros(&self) -> Option<i64> {
        Packet::timestamp_micros(self)
    }

    fn has_layer(&self, layer: &str) -> bool {
        self.layer_name(layer).is_some()
    }

    /// Unpacks the rtshark layer to return the raw value of `layer`.`name`, if both exist.
    fn field(&self, layer: &str, name: &str) -> Option<&str> {
        self.layer_name(layer)?
            .metadata(name)
            .map(|metadata| metadata.value())
    }
}

pub fn parse_value<T: FromStr>(value: &str) -> Option<T> {
    value.trim().parse::<T>().ok()
}

/// tshark prints booleans as `1`/`0` or `True`/`False` depending on version.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "True" | "true")
}

/// Transform an rtshark packet into a [PacketRecord].
///
/// Layers are looked up explicitly; anything missing is left as `None`.
/// Returns `None` only when the packet has no sniff time.
pub fn record_from_packet(packet: &Packet) -> Option<PacketRecord> {
    record_from_fields(packet)
}

fn record_from_fields<P: FieldLookup>(packet: &P) -> Option<PacketRecord> {
    let timestamp = packet.timestamp_micros().and_then(DateTime::<Utc>::from_timestamp_micros)?;
    let mut record = PacketRecord::new(timestamp);

    let ip_layer = if packet.has_layer("ip") { "ip" } else { "ipv6" };
    let src = packet.parse_field::<IpAddr>(ip_layer, &format!("{ip_layer}.src"));
    let dst = packet.parse_field::<IpAddr>(ip_layer, &format!("{ip_layer}.dst"));
    match (src, dst) {
        (Some(src), Some(dst)) => record = record.with_addrs(src, dst),
        (src, dst) => {
            record.src_addr = src;
            record.dst_addr = dst;
        }
    }

    let transport = TRANSPORT_LAYERS
        .iter()
        .find(|layer| packet.has_layer(layer))
        .and_then(|layer| TransportKind::from_layer(layer));

    let transport_length = match transport {
        Some(kind) => {
            let layer = kind.layer_name();
            record = record.with_transport(
                kind,
                packet.parse_field(layer, &format!("{layer}.srcport")),
                packet.parse_field(layer, &format!("{layer}.dstport")),
            );
            match kind {
                TransportKind::Tcp => packet.parse_field::<u64>("tcp", "tcp.len"),
                TransportKind::Udp => packet.parse_field::<u64>("udp", "udp.length")
                    .map(|length| length.saturating_sub(UDP_HEADER_LEN)),
                _ => None,
            }
        }
        None => None,
    };
    let length = transport_length
        .or_else(|| packet.parse_field("frame", "frame.len"))
        .unwrap_or(0);
    record = record.with_length(length);

    match app_record(packet) {
        Some(app) => Some(record.with_app(app)),
        None => Some(record),
    }
}

/// HTTP takes precedence over DNS; a packet carrying both is not expected.
fn app_record<P: FieldLookup>(packet: &P) -> Option<AppRecord> {
    if packet.has_layer("http") {
        let text = |name: &str| packet.field("http", name).unwrap_or_default().to_string();
        return Some(AppRecord::Http(HttpRequest {
            method: text("http.request.method"),
            uri: text("http.request.uri"),
            host: text("http.host"),
            user_agent: text("http.user_agent"),
        }));
    }

    if packet.has_layer("dns") {
        return Some(AppRecord::Dns(DnsQuery {
            name: packet.field("dns", "dns.qry.name").unwrap_or_default().to_string(),
            query_type: packet.parse_field("dns", "dns.qry.type"),
            response: packet.field("dns", "dns.flags.response").map(parse_flag).unwrap_or(false),
        }));
    }

    None
}
