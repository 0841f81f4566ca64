use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use super::anomaly::AnomalyDetector;
use super::containers::{AnomalyReport, ConversationCount, DnsQuery, FlowKey, FlowState, HttpRequest, TransportKind};
use super::conversation::ConversationTracker;
use super::error::AnalyserError;
use super::flow::FlowAggregator;
use super::source::PacketSource;
use super::stats::{Logged, StatisticsRegistry};

pub const DEFAULT_TOP_CONVERSATIONS: usize = 5;

/// Knobs for one analysis session.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisConfig {
    pub detector: AnomalyDetector,
    pub top_conversations: usize,
    pub bidirectional: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            detector: AnomalyDetector::default(),
            top_conversations: DEFAULT_TOP_CONVERSATIONS,
            bidirectional: false,
        }
    }
}

impl AnalysisConfig {
    pub fn new(packet_threshold: i64, scan_port_threshold: i64, top_conversations: usize, bidirectional: bool) -> Result<Self, AnalyserError> {
        Ok(Self {
            detector: AnomalyDetector::new(packet_threshold, scan_port_threshold)?,
            top_conversations,
            bidirectional,
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FlowSummary {
    pub flow: FlowKey,
    #[serde(flatten)]
    pub state: FlowState,
}

/// Everything one session produces, ready for printing or serializing.
#[derive(Clone, Debug, Serialize)]
pub struct TrafficReport {
    pub total_packets: u64,
    pub packet_threshold: u64,
    pub scan_port_threshold: usize,
    pub flows: Vec<FlowSummary>,
    pub anomalies: AnomalyReport,
    pub protocols: HashMap<TransportKind, u64>,
    pub addresses: HashMap<IpAddr, u64>,
    pub ports: HashMap<u16, u64>,
    pub top_conversations: Vec<ConversationCount>,
    pub http_requests: Vec<Logged<HttpRequest>>,
    pub dns_queries: Vec<Logged<DnsQuery>>,
}

/// Drains `source` and runs a full analysis pass over what it produced.
pub fn analyse<S: PacketSource>(source: &mut S, config: &AnalysisConfig) -> Result<TrafficReport, AnalyserError> {
    log::info!("Starting analysis.");

    let mut aggregator = if config.bidirectional {
        FlowAggregator::bidirectional()
    } else {
        FlowAggregator::new()
    };
    let mut registry = StatisticsRegistry::new();
    let mut conversations = ConversationTracker::new();
    let mut records = Vec::new();

    while let Some(record) = source.next_record()? {
        aggregator.ingest(&record);
        registry.record_packet(&record);
        if let (Some(src), Some(dst)) = (record.src_addr, record.dst_addr) {
            conversations.record(src, dst);
        }
        records.push(record);
    }
    if aggregator.is_empty() {
        log::warn!("No packet carried both addresses, no flows to report.");
    }
    log::info!("Read {} packets into {} flows.", records.len(), aggregator.len());

    let anomalies = config.detector.detect(aggregator.flows(), &records);

    let mut flows: Vec<FlowSummary> = aggregator
        .snapshot()
        .into_iter()
        .map(|(flow, state)| FlowSummary { flow, state })
        .collect();
    flows.sort_by(|a, b| b.state.packet_count.cmp(&a.state.packet_count).then(a.flow.cmp(&b.flow)));

    Ok(TrafficReport {
        total_packets: records.len() as u64,
        packet_threshold: config.detector.packet_threshold(),
        scan_port_threshold: config.detector.scan_port_threshold(),
        flows,
        anomalies,
        protocols: registry.protocol_distribution(),
        addresses: registry.address_distribution(),
        ports: registry.port_distribution(),
        top_conversations: conversations.top(config.top_conversations),
        http_requests: registry.http_requests().to_vec(),
        dns_queries: registry.dns_queries().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyser::containers::{AppRecord, PacketRecord};
    use chrono::DateTime;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn record(secs: i64, src: &str, dst: &str, dst_port: u16) -> PacketRecord {
        PacketRecord::new(DateTime::from_timestamp(secs, 0).unwrap())
            .with_addrs(ip(src), ip(dst))
            .with_transport(TransportKind::Tcp, Some(50000), Some(dst_port))
            .with_length(100)
    }

    #[test]
    fn test_empty_source() {
        let mut source = Vec::<PacketRecord>::new().into_iter();
        let report = analyse(&mut source, &AnalysisConfig::default()).unwrap();

        assert_eq!(report.total_packets, 0);
        assert!(report.flows.is_empty());
        assert!(report.anomalies.is_empty());
        assert!(report.top_conversations.is_empty());
    }

    #[test]
    fn test_full_session() {
        let mut records: Vec<PacketRecord> = (0..12).map(|i| record(i, "10.0.0.5", "10.0.0.9", 20 + i as u16)).collect();
        records.push(record(20, "10.0.0.9", "10.0.0.5", 50000));
        records.push(PacketRecord::new(DateTime::from_timestamp(21, 0).unwrap()).with_app(AppRecord::Dns(DnsQuery {
            name: "example.com".to_string(),
            query_type: Some(1),
            response: false,
        })));

        let config = AnalysisConfig::new(10, 10, 5, false).unwrap();
        let report = analyse(&mut records.into_iter(), &config).unwrap();

        assert_eq!(report.total_packets, 14);
        assert_eq!(report.flows.len(), 2);
        assert_eq!(report.flows[0].state.packet_count, 12);
        assert_eq!(report.anomalies.high_volume_flows.len(), 1);
        assert_eq!(report.anomalies.port_scan_sources.get(&ip("10.0.0.5")), Some(&12));
        assert_eq!(report.protocols[&TransportKind::Tcp], 13);
        assert_eq!(report.top_conversations.len(), 1);
        assert_eq!(report.top_conversations[0].packets, 13);
        assert_eq!(report.dns_queries.len(), 1);
    }

    #[test]
    fn test_bidirectional_session() {
        let records = vec![record(0, "10.0.0.1", "10.0.0.2", 80), record(1, "10.0.0.2", "10.0.0.1", 50000)];
        let config = AnalysisConfig::new(100, 10, 5, true).unwrap();
        let report = analyse(&mut records.into_iter(), &config).unwrap();

        assert_eq!(report.flows.len(), 1);
        assert_eq!(report.flows[0].state.byte_count, 200);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(AnalysisConfig::new(-10, 10, 5, false), Err(AnalyserError::InvalidArgument(_))));
    }

    #[test]
    fn test_report_serializes() {
        let records = vec![record(0, "10.0.0.1", "10.0.0.2", 80)];
        let report = analyse(&mut records.into_iter(), &AnalysisConfig::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["total_packets"], 1);
        assert_eq!(json["flows"][0]["flow"]["src"], "10.0.0.1");
        assert_eq!(json["flows"][0]["packet_count"], 1);
        assert_eq!(json["addresses"]["10.0.0.2"], 1);
        assert_eq!(json["ports"]["80"], 1);
        assert_eq!(json["protocols"]["Tcp"], 1);
    }
}
