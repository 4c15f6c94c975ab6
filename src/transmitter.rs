use std::time::Duration;

use crate::protocol;
use crate::session::{Session, StopSignal};

/// Free-running telemetry source, the peer of the passive collector.
pub struct TelemetrySender {
    prefix: String,
    count: u32,
    interval: Duration,
}

impl TelemetrySender {
    pub fn new(prefix: impl Into<String>, count: u32, interval: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            count,
            interval,
        }
    }

    /// Send `"<prefix> #1"` through `"<prefix> #count"`. Returns how many went out.
    pub fn run(&self, session: &mut Session, stop: &StopSignal) -> u32 {
        let mut sent = 0;

        for seq in 1..=self.count {
            if stop.is_triggered() {
                tracing::info!(sent, "Transmission cancelled");
                break;
            }

            let message = protocol::telemetry(&self.prefix, seq);
            match session.send_line(&message) {
                Ok(()) => {
                    sent += 1;
                    tracing::info!("[{seq}/{}] Sent: {message}", self.count);
                }
                Err(e) => tracing::warn!(seq, error = %e, "Failed to send telemetry"),
            }

            if seq < self.count {
                session.sleep(self.interval);
            }
        }

        sent
    }
}
