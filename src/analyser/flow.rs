//! Groups packet records into flows keyed by address pair.
use std::collections::HashMap;
use super::containers::{FlowKey, FlowState, PacketRecord};

/// Owns every [FlowState] of one analysis session.
///
/// Construct a fresh aggregator per session; dropping it releases all state.
#[derive(Debug, Default)]
pub struct FlowAggregator {
    flows: HashMap<FlowKey, FlowState>,
    bidirectional: bool,
}

impl FlowAggregator {
    /// Directional aggregation, A -> B and B -> A are separate flows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversation-level aggregation, both directions share one flow.
    pub fn bidirectional() -> Self {
        Self {
            flows: HashMap::new(),
            bidirectional: true,
        }
    }

    /// Adds one record. Records without both addresses are skipped.
    pub fn ingest(&mut self, record: &PacketRecord) {
        let key = match record.flow_key() {
            Some(key) if self.bidirectional => key.normalized(),
            Some(key) => key,
            None => {
                log::debug!("Skipping record without addresses at {}", record.timestamp);
                return;
            }
        };

        self.flows
            .entry(key)
            .or_insert_with(|| FlowState::new(record.timestamp))
            .update(record);
    }

    pub fn snapshot(&self) -> HashMap<FlowKey, FlowState> {
        self.flows.clone()
    }

    pub fn flows(&self) -> &HashMap<FlowKey, FlowState> {
        &self.flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
