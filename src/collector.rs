use crate::parser::{is_command_line, parse_packet_id};
use crate::record::PacketRecord;
use crate::rssi::RssiSampler;
use crate::session::{Session, StopSignal};

/// Listens to free-running telemetry and tags every packet with an RSSI
/// reading.
///
/// Sampling RSSI takes the modem through command mode for every packet, so
/// this role trades reply latency for instrumentation. It is never combined
/// with [`EchoResponder`](crate::responder::EchoResponder) in one run.
pub struct PassiveCollector {
    expected: Option<usize>,
}

impl PassiveCollector {
    /// `expected` ends the run once that many packets were recorded.
    pub fn new(expected: Option<usize>) -> Self {
        Self { expected }
    }

    pub fn run(&self, session: &mut Session, stop: &StopSignal) -> Vec<PacketRecord> {
        let mut records = Vec::new();
        tracing::info!(expected = ?self.expected, "Collecting telemetry");

        while !stop.is_triggered() && !self.is_complete(&records) {
            let line = match session.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Read failed");
                    session.sleep(session.timing().read_error_backoff);
                    continue;
                }
            };

            if is_command_line(&line) {
                tracing::trace!(line = %line, "Skipping command-mode line");
                continue;
            }

            tracing::info!(message = %line, "[RX]");
            let rssi = RssiSampler::new(session).sample_rssi();

            let id = parse_packet_id(&line).unwrap_or(records.len() as u32 + 1);
            tracing::info!(id, rssi = ?rssi, "Packet recorded");
            records.push(PacketRecord::received(id, line, rssi));

            if let Err(e) = session.flush_input().and_then(|()| session.flush_output()) {
                tracing::warn!(error = %e, "Failed to flush after RSSI sample");
            }
        }

        tracing::info!(received = records.len(), "Collection finished");
        records
    }

    fn is_complete(&self, records: &[PacketRecord]) -> bool {
        self.expected.is_some_and(|n| records.len() >= n)
    }
}
