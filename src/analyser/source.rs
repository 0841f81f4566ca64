//! Packet record sources. tshark does the capture and dissection; we only read its output.
use rtshark::{RTShark, RTSharkBuilder};
use super::containers::PacketRecord;
use super::error::AnalyserError;
use super::utils::record_from_packet;

/// Anything that hands out decoded [PacketRecord]s, one at a time.
pub trait PacketSource {
    /// `Ok(None)` once the source is exhausted.
    fn next_record(&mut self) -> Result<Option<PacketRecord>, AnalyserError>;
}

/// Replays records that were decoded earlier.
impl PacketSource for std::vec::IntoIter<PacketRecord> {
    fn next_record(&mut self) -> Result<Option<PacketRecord>, AnalyserError> {
        Ok(self.next())
    }
}

/// Reads packets from a running tshark process via rtshark.
pub struct TsharkSource {
    rtshark: RTShark,
    // Packets still allowed to be read, for live captures.
    remaining: Option<usize>,
}

impl TsharkSource {
    /// Loads a PCAP/PCAPNG file.
    pub fn from_file(filepath: &str, display_filter: Option<&str>) -> Result<Self, AnalyserError> {
        log::info!("Loading capture file.");

        let mut builder = RTSharkBuilder::builder().input_path(filepath);
        if let Some(filter) = display_filter {
            builder = builder.display_filter(filter);
        }

        let rtshark = builder.spawn().map_err(|err| {
            log::error!("Error spawning tshark: {err}");
            err
        })?;
        log::info!("Reading from {}", filepath);

        Ok(Self { rtshark, remaining: None })
    }

    /// Captures `count` packets live from `interface`, optionally writing them to `output_path`.
    pub fn live(interface: &str, display_filter: Option<&str>, output_path: Option<&str>, count: usize) -> Result<Self, AnalyserError> {
        if count == 0 {
            return Err(AnalyserError::InvalidArgument("live capture needs a packet count above zero".to_string()));
        }

        let mut builder = RTSharkBuilder::builder().input_path(interface).live_capture();
        if let Some(filter) = display_filter {
            builder = builder.display_filter(filter);
        }
        if let Some(path) = output_path {
            builder = builder.output_path(path);
        }

        let rtshark = builder.spawn().map_err(|err| {
            log::error!("Error spawning tshark on {interface}: {err}");
            err
        })?;
        log::info!("Starting capture on interface {interface}...");

        Ok(Self { rtshark, remaining: Some(count) })
    }

    /// Kills the tshark process.
    pub fn stop(&mut self) {
        self.rtshark.kill();
    }
}

impl PacketSource for TsharkSource {
    fn next_record(&mut self) -> Result<Option<PacketRecord>, AnalyserError> {
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }

            // A broken tshark stream ends the capture, it does not fail the analysis.
            let packet = match self.rtshark.read() {
                Ok(Some(packet)) => packet,
                Ok(None) => return Ok(None),
                Err(e) => {
                    log::error!("Error parsing TShark output: {e}");
                    return Ok(None);
                }
            };

            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }

            match record_from_packet(&packet) {
                Some(record) => return Ok(Some(record)),
                None => log::debug!("Skipping packet without sniff time"),
            }
        }
    }
}
