//! Volume and port scan heuristics over aggregated flows.
//!
//! The port scan check is approximate: any client that legitimately talks to many
//! ports on the capture (browsers, service monitors) will be flagged as well.
use std::collections::{BTreeMap, HashMap, HashSet};
use super::containers::{AnomalyReport, FlowKey, FlowState, HighVolumeFlow, PacketRecord, ScanKey};
use super::error::AnalyserError;

pub const DEFAULT_PACKET_THRESHOLD: u64 = 100;
pub const DEFAULT_SCAN_PORT_THRESHOLD: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnomalyDetector {
    packet_threshold: u64,
    scan_port_threshold: usize,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self {
            packet_threshold: DEFAULT_PACKET_THRESHOLD,
            scan_port_threshold: DEFAULT_SCAN_PORT_THRESHOLD,
        }
    }
}

impl AnomalyDetector {
    /// Flows with more than `packet_threshold` packets and sources touching more than
    /// `scan_port_threshold` distinct destination ports are reported.
    pub fn new(packet_threshold: i64, scan_port_threshold: i64) -> Result<Self, AnalyserError> {
        let packet_threshold = u64::try_from(packet_threshold).map_err(|_| {
            AnalyserError::InvalidArgument(format!("packet threshold must be non-negative, got {packet_threshold}"))
        })?;
        let scan_port_threshold = usize::try_from(scan_port_threshold).map_err(|_| {
            AnalyserError::InvalidArgument(format!("scan port threshold must be non-negative, got {scan_port_threshold}"))
        })?;

        Ok(Self {
            packet_threshold,
            scan_port_threshold,
        })
    }

    pub fn packet_threshold(&self) -> u64 {
        self.packet_threshold
    }

    pub fn scan_port_threshold(&self) -> usize {
        self.scan_port_threshold
    }

    /// Runs one detection pass. Holds no state between calls.
    pub fn detect(&self, flows: &HashMap<FlowKey, FlowState>, records: &[PacketRecord]) -> AnomalyReport {
        log::info!("Running anomaly detection over {} flows.", flows.len());

        AnomalyReport {
            high_volume_flows: self.high_volume_flows(flows),
            port_scan_sources: self.port_scan_sources(records),
        }
    }

    /// Strictly greater than the threshold, largest first.
    fn high_volume_flows(&self, flows: &HashMap<FlowKey, FlowState>) -> Vec<HighVolumeFlow> {
        let mut high_volume: Vec<HighVolumeFlow> = flows
            .iter()
            .filter(|(_, state)| state.packet_count > self.packet_threshold)
            .map(|(key, state)| HighVolumeFlow {
                flow: *key,
                packet_count: state.packet_count,
                byte_count: state.byte_count,
                duration_micros: state.duration().num_microseconds().unwrap_or(i64::MAX),
            })
            .collect();

        high_volume.sort_by(|a, b| b.packet_count.cmp(&a.packet_count).then(a.flow.cmp(&b.flow)));
        for flow in &high_volume {
            log::warn!("High volume flow {}: {} packets", flow.flow, flow.packet_count);
        }

        high_volume
    }

    fn port_scan_sources(&self, records: &[PacketRecord]) -> BTreeMap<std::net::IpAddr, usize> {
        let probes: HashSet<ScanKey> = records
            .iter()
            .filter_map(|record| {
                Some(ScanKey {
                    src: record.src_addr?,
                    dst_port: record.dst_port?,
                })
            })
            .collect();

        let mut distinct_ports: BTreeMap<std::net::IpAddr, usize> = BTreeMap::new();
        for probe in probes {
            *distinct_ports.entry(probe.src).or_insert(0) += 1;
        }

        distinct_ports.retain(|src, count| {
            let flagged = *count > self.scan_port_threshold;
            if flagged {
                log::warn!("Possible port scan from {src}: {count} distinct ports");
            }
            flagged
        });

        distinct_ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyser::containers::TransportKind;
    use crate::analyser::flow::FlowAggregator;
    use chrono::{DateTime, Utc};
    use std::net::IpAddr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn probe(secs: i64, src: &str, dst_port: u16) -> PacketRecord {
        PacketRecord::new(ts(secs))
            .with_addrs(ip(src), ip("10.0.0.99"))
            .with_transport(TransportKind::Tcp, Some(51000), Some(dst_port))
            .with_length(0)
    }

    fn flows_of(records: &[PacketRecord]) -> HashMap<FlowKey, FlowState> {
        let mut aggregator = FlowAggregator::new();
        records.iter().for_each(|r| aggregator.ingest(r));
        aggregator.snapshot()
    }

    #[test]
    fn test_empty_input_gives_empty_report() {
        let report = AnomalyDetector::default().detect(&HashMap::new(), &[]);
        assert!(report.is_empty());
    }

    #[test]
    fn test_high_volume_threshold_is_strict() {
        let detector = AnomalyDetector::new(100, 10).unwrap();

        let at_threshold: Vec<PacketRecord> = (0..100).map(|i| probe(i, "10.0.0.1", 443)).collect();
        let report = detector.detect(&flows_of(&at_threshold), &at_threshold);
        assert!(report.high_volume_flows.is_empty());

        let over_threshold: Vec<PacketRecord> = (0..101).map(|i| probe(i, "10.0.0.1", 443)).collect();
        let report = detector.detect(&flows_of(&over_threshold), &over_threshold);
        assert_eq!(report.high_volume_flows.len(), 1);

        let flow = &report.high_volume_flows[0];
        assert_eq!(flow.flow, FlowKey::new(ip("10.0.0.1"), ip("10.0.0.99")));
        assert_eq!(flow.packet_count, 101);
        assert_eq!(flow.duration_micros, 100_000_000);
    }

    #[test]
    fn test_port_scan_flagged_above_default() {
        let records: Vec<PacketRecord> = (0..11).map(|i| probe(i, "10.0.0.7", 1000 + i as u16)).collect();
        let report = AnomalyDetector::new(100, 10).unwrap().detect(&flows_of(&records), &records);

        assert_eq!(report.port_scan_sources.get(&ip("10.0.0.7")), Some(&11));
        assert!(report.high_volume_flows.is_empty());
    }

    #[test]
    fn test_port_scan_counts_distinct_ports_only() {
        // Ten distinct ports, repeated, never exceeds the default.
        let records: Vec<PacketRecord> = (0..40).map(|i| probe(i, "10.0.0.7", 2000 + (i % 10) as u16)).collect();
        let report = AnomalyDetector::default().detect(&flows_of(&records), &records);

        assert!(report.port_scan_sources.is_empty());
    }

    #[test]
    fn test_records_without_ports_are_ignored() {
        let records = vec![
            PacketRecord::new(ts(0)).with_addrs(ip("10.0.0.1"), ip("10.0.0.2")),
            PacketRecord::new(ts(1)),
        ];
        let report = AnomalyDetector::new(0, 0).unwrap().detect(&HashMap::new(), &records);

        assert!(report.port_scan_sources.is_empty());
    }

    #[test]
    fn test_negative_thresholds_rejected() {
        assert!(matches!(AnomalyDetector::new(-1, 10), Err(AnalyserError::InvalidArgument(_))));
        assert!(matches!(AnomalyDetector::new(100, -5), Err(AnalyserError::InvalidArgument(_))));
        assert_eq!(AnomalyDetector::new(100, 10).unwrap(), AnomalyDetector::default());
    }

    #[test]
    fn test_detect_is_stateless() {
        let detector = AnomalyDetector::new(1, 1).unwrap();
        let records: Vec<PacketRecord> = (0..3).map(|i| probe(i, "10.0.0.3", 22 + i as u16)).collect();
        let flows = flows_of(&records);

        assert_eq!(detector.detect(&flows, &records), detector.detect(&flows, &records));
        assert!(detector.detect(&HashMap::new(), &[]).is_empty());
    }
}
