use crate::config::SpreadingFactor;
use crate::protocol;
use crate::session::Session;

/// Pushes radio parameters to the modem.
///
/// The modem's reply is logged and handed back, never checked: a
/// spreading factor the modem rejected looks the same as one it accepted.
pub struct LinkConfigurator<'s> {
    session: &'s mut Session,
}

impl<'s> LinkConfigurator<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Returns the raw reply, or `None` when command mode could not be entered.
    pub fn set_spreading_factor(&mut self, sf: SpreadingFactor) -> Option<String> {
        tracing::info!(sf = sf.get(), "Configuring spreading factor");
        let mut mode = self.session.mode();

        match mode.enter_command_mode() {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    sf = sf.get(),
                    "Failed to enter command mode, spreading factor may be wrong"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    sf = sf.get(),
                    error = %e,
                    "Failed to enter command mode, spreading factor may be wrong"
                );
                return None;
            }
        }

        let reply = match mode.run_command(&protocol::set_spreading_factor(sf.get())) {
            Ok(text) => {
                tracing::info!(sf = sf.get(), reply = %text, "Spreading factor reply");
                Some(text)
            }
            Err(e) => {
                tracing::warn!(sf = sf.get(), error = %e, "Spreading factor command failed");
                None
            }
        };

        if let Err(e) = mode.exit_command_mode() {
            tracing::warn!(error = %e, "Failed to leave command mode after configuration");
        }

        reply
    }
}
