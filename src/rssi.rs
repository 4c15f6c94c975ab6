use crate::parser::parse_rssi;
use crate::protocol::RSSI_QUERY;
use crate::session::Session;

/// Reads the modem's signal strength through a command-mode round trip.
pub struct RssiSampler<'s> {
    session: &'s mut Session,
}

impl<'s> RssiSampler<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Latest RSSI in dBm, or `None` when the modem could not be queried.
    ///
    /// Payload traffic must not be in flight while this runs: the channel
    /// passes through command mode and back.
    pub fn sample_rssi(&mut self) -> Option<i32> {
        let mut mode = self.session.mode();

        match mode.enter_command_mode() {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("RSSI unavailable: modem did not enter command mode");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "RSSI unavailable");
                return None;
            }
        }

        let reply = mode.run_command(RSSI_QUERY);

        if let Err(e) = mode.exit_command_mode() {
            tracing::warn!(error = %e, "Failed to leave command mode after RSSI query");
        }

        match reply {
            Ok(text) => {
                let rssi = parse_rssi(&text);
                if rssi.is_none() {
                    tracing::warn!(reply = %text, "No RSSI value in modem reply");
                }
                rssi
            }
            Err(e) => {
                tracing::warn!(error = %e, "RSSI query failed");
                None
            }
        }
    }
}
