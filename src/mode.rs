use crate::config::{ESCAPE_SEQUENCE, MODE_ENTRY_ATTEMPTS};
use crate::error::{Error, Result};
use crate::parser::{ModeAck, parse_mode_ack};
use crate::session::Session;

/// Which side of the escape handshake the modem is believed to be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    /// Payload bytes pass through to the radio.
    Data,
    /// Escape sent, acknowledgment not yet classified.
    AwaitingModeAck,
    /// The modem interprets text as AT commands.
    Command,
}

/// Drives the data/command state machine over a session's channel.
///
/// The same escape sequence toggles the modem in both directions, so entry
/// is only trusted once the modem's own acknowledgment text says so.
pub struct ModeController<'s> {
    session: &'s mut Session,
}

impl<'s> ModeController<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    pub fn state(&self) -> ModeState {
        self.session.mode_state()
    }

    /// Put the modem in command mode.
    ///
    /// Returns `Ok(false)` when no entry acknowledgment was seen within
    /// [`MODE_ENTRY_ATTEMPTS`]; the state is then left at `Data`. An I/O error
    /// also resets the state to `Data` before it is returned.
    pub fn enter_command_mode(&mut self) -> Result<bool> {
        let result = self.try_enter();
        if !matches!(result, Ok(true)) {
            self.session.set_mode_state(ModeState::Data);
        }
        result
    }

    fn try_enter(&mut self) -> Result<bool> {
        let timing = *self.session.timing();

        for attempt in 1..=MODE_ENTRY_ATTEMPTS {
            self.session.flush_input()?;
            self.session.flush_output()?;

            self.session.send_raw(ESCAPE_SEQUENCE)?;
            self.session.set_mode_state(ModeState::AwaitingModeAck);
            self.session.sleep(timing.guard_interval);

            let reply = self.session.drain_text()?;
            tracing::debug!(attempt, reply = %reply.trim(), "Escape sequence reply");

            match parse_mode_ack(&reply) {
                Some(ModeAck::Entry) => {
                    self.session.set_mode_state(ModeState::Command);
                    tracing::debug!(attempt, "Entered command mode");
                    return Ok(true);
                }
                Some(ModeAck::Exit) => {
                    // The escape took an already-configuring modem back to data mode
                    self.session.set_mode_state(ModeState::Data);
                    tracing::debug!(attempt, "Modem was already in command mode, retrying");
                    if attempt < MODE_ENTRY_ATTEMPTS {
                        self.session.sleep(timing.exit_settle);
                    }
                }
                None => {
                    self.session.set_mode_state(ModeState::Data);
                    tracing::debug!(attempt, "No mode acknowledgment");
                }
            }
        }

        tracing::warn!(
            attempts = MODE_ENTRY_ATTEMPTS,
            "Failed to enter command mode"
        );
        Ok(false)
    }

    /// Send one AT command and return whatever came back, trailing whitespace trimmed.
    ///
    /// An empty or unrelated reply is not an error; the caller decides what
    /// it means.
    pub fn run_command(&mut self, command: &str) -> Result<String> {
        if self.state() != ModeState::Command {
            return Err(Error::NotInCommandMode);
        }

        tracing::debug!(command, "Sending AT command");
        self.session.send_line(command)?;
        self.session.sleep(self.session.timing().response_settle);

        let reply = self.session.drain_text()?;
        let reply = reply.trim_end().to_string();
        tracing::debug!(command, reply = %reply, "AT command reply");
        Ok(reply)
    }

    /// Return the modem to data mode.
    ///
    /// The exit acknowledgment is not checked. The state becomes `Data` even
    /// when writing the escape fails.
    pub fn exit_command_mode(&mut self) -> Result<()> {
        let result = self.try_exit();
        self.session.set_mode_state(ModeState::Data);
        result
    }

    fn try_exit(&mut self) -> Result<()> {
        self.session.send_raw(ESCAPE_SEQUENCE)?;
        self.session.sleep(self.session.timing().guard_interval);
        self.session.flush_input()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::config::Timing;
    use crate::sim::{SimClock, SimModem};
    use std::time::Duration;

    fn session_with(modem: &SimModem, clock: &SimClock) -> Session {
        Session::new(
            Box::new(modem.channel()),
            Box::new(clock.clone()),
            Timing::default(),
        )
    }

    #[test]
    fn enters_command_mode_from_data_mode() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock);
        let mut session = session_with(&modem, &clock);

        assert!(session.mode().enter_command_mode().unwrap());
        assert_eq!(session.mode_state(), ModeState::Command);
        assert!(modem.in_command_mode());
        assert_eq!(modem.escape_count(), 1);
    }

    #[test]
    fn retries_when_modem_was_already_in_command_mode() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock).starting_in_command_mode();
        let mut session = session_with(&modem, &clock);

        let start = clock.now();
        assert!(session.mode().enter_command_mode().unwrap());
        let elapsed = clock.now() - start;

        assert_eq!(session.mode_state(), ModeState::Command);
        assert!(modem.in_command_mode());
        assert_eq!(modem.escape_count(), 2);

        let timing = Timing::default();
        let expected = timing.guard_interval * 2 + timing.exit_settle;
        assert!(elapsed >= expected);
        assert!(elapsed < expected + Duration::from_millis(50));
    }

    #[test]
    fn gives_up_after_two_silent_attempts() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock).silent_escape();
        let mut session = session_with(&modem, &clock);

        let start = clock.now();
        assert!(!session.mode().enter_command_mode().unwrap());
        let elapsed = clock.now() - start;

        assert_eq!(session.mode_state(), ModeState::Data);
        assert_eq!(modem.escape_count(), 2);
        let guard = Timing::default().guard_interval;
        assert!(elapsed <= guard * 2 + Duration::from_millis(10));
    }

    #[test]
    fn run_command_requires_command_mode() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock);
        let mut session = session_with(&modem, &clock);

        let err = session.mode().run_command("AT+RSSI").unwrap_err();
        assert!(matches!(err, Error::NotInCommandMode));
        assert!(modem.written_lines().is_empty());
    }

    #[test]
    fn run_command_returns_trimmed_reply() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock).with_rssi(Some(-101));
        let mut session = session_with(&modem, &clock);

        let mut mode = session.mode();
        assert!(mode.enter_command_mode().unwrap());
        let reply = mode.run_command("AT+RSSI").unwrap();
        assert_eq!(reply, "RSSI: -101 dBm\r\nOK");
    }

    #[test]
    fn exit_returns_to_data_mode() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock);
        let mut session = session_with(&modem, &clock);

        let mut mode = session.mode();
        assert!(mode.enter_command_mode().unwrap());
        mode.exit_command_mode().unwrap();
        assert_eq!(mode.state(), ModeState::Data);
        assert!(!modem.in_command_mode());
    }

    #[test]
    fn exit_sets_data_mode_even_when_channel_fails() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock);
        let mut session = session_with(&modem, &clock);

        assert!(session.mode().enter_command_mode().unwrap());
        session.close().unwrap();
        assert!(session.mode().exit_command_mode().is_err());
        assert_eq!(session.mode_state(), ModeState::Data);
    }

    #[test]
    fn io_failure_during_entry_leaves_data_mode() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock);
        let mut session = session_with(&modem, &clock);

        session.close().unwrap();
        assert!(session.mode().enter_command_mode().is_err());
        assert_eq!(session.mode_state(), ModeState::Data);
    }
}
