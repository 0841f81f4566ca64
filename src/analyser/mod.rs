//! The core of traffic analysis.
//! Aggregate dissected packets into flows, distributions and conversations, then flag anomalies.
pub mod anomaly;
pub mod containers;
pub mod conversation;
pub mod core;
pub mod error;
pub mod flow;
pub mod source;
pub mod stats;
pub mod utils;
