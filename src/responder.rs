use crate::parser::parse_ping;
use crate::protocol;
use crate::session::{Session, StopSignal};

/// Answers every `PING#<id>` with `PONG#<id>` as fast as the loop allows.
///
/// The reply is written before anything else happens for that line;
/// logging comes after.
#[derive(Debug, Default)]
pub struct EchoResponder {
    replies: u64,
}

impl EchoResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replies(&self) -> u64 {
        self.replies
    }

    /// Loop until `stop` is triggered. Read and write faults are logged and
    /// the loop keeps going.
    pub fn run(&mut self, session: &mut Session, stop: &StopSignal) {
        tracing::info!("Echo responder active, waiting for pings");

        while !stop.is_triggered() {
            let line = match session.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Read failed");
                    session.sleep(session.timing().read_error_backoff);
                    continue;
                }
            };

            let Some(id) = parse_ping(&line) else {
                continue;
            };

            let reply = protocol::pong(id);
            let sent = session.send_line(&reply);

            match sent {
                Ok(()) => {
                    self.replies += 1;
                    tracing::info!(id, "[RX] {line} -> [TX] {reply}");
                }
                Err(e) => tracing::warn!(id, error = %e, "Failed to send PONG"),
            }
        }

        tracing::info!(replies = self.replies, "Echo responder stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn echoes_each_ping() {
        let clock = SimClock::new();
        let stop = StopSignal::new();
        let modem = SimModem::new(&clock).stop_when_drained(stop.clone());
        modem.inject(Duration::from_millis(10), "PING#7\r\n");
        modem.inject(Duration::from_millis(500), "PING#8\r\n");
        let mut session = session_with(&modem, &clock);

        let mut responder = EchoResponder::new();
        responder.run(&mut session, &stop);

        assert_eq!(responder.replies(), 2);
        assert_eq!(modem.written_lines(), vec!["PONG#7", "PONG#8"]);
    }

    #[test]
    fn reply_is_written_on_the_poll_that_saw_the_ping() {
        let clock = SimClock::new();
        let stop = StopSignal::new();
        let modem = SimModem::new(&clock).stop_when_drained(stop.clone());
        modem.inject(Duration::from_millis(25), "PING#3\r\n");
        let mut session = session_with(&modem, &clock);

        EchoResponder::new().run(&mut session, &stop);

        let writes = modem.timed_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, "PONG#3");
        assert_eq!(writes[0].0, Duration::from_millis(25));
    }

    #[test]
    fn ignores_malformed_and_unrelated_lines() {
        let clock = SimClock::new();
        let stop = StopSignal::new();
        let modem = SimModem::new(&clock).stop_when_drained(stop.clone());
        modem.inject_bytes(Duration::from_millis(10), b"PI\xffNG#1\r\n");
        modem.inject(Duration::from_millis(20), "PING#\r\n");
        modem.inject(Duration::from_millis(30), "hello\r\n");
        modem.inject(Duration::from_millis(40), "PING#9\r\n");
        let mut session = session_with(&modem, &clock);

        let mut responder = EchoResponder::new();
        responder.run(&mut session, &stop);

        assert_eq!(modem.written_lines(), vec!["PONG#9"]);
    }

    #[test]
    fn survives_write_failures() {
        let clock = SimClock::new();
        let stop = StopSignal::new();
        let modem = SimModem::new(&clock)
            .failing_writes(1)
            .stop_when_drained(stop.clone());
        modem.inject(Duration::from_millis(10), "PING#1\r\n");
        modem.inject(Duration::from_millis(20), "PING#2\r\n");
        let mut session = session_with(&modem, &clock);

        let mut responder = EchoResponder::new();
        responder.run(&mut session, &stop);

        assert_eq!(responder.replies(), 1);
        assert_eq!(modem.written_lines(), vec!["PONG#2"]);
    }

    #[test]
    fn backs_off_after_read_failures() {
        let clock = SimClock::new();
        let stop = StopSignal::new();
        let modem = SimModem::new(&clock)
            .failing_reads(3)
            .stop_when_drained(stop.clone());
        modem.inject(Duration::from_millis(10), "PING#1\r\n");
        let mut session = session_with(&modem, &clock);

        let mut responder = EchoResponder::new();
        responder.run(&mut session, &stop);

        let backoff = Timing::default().read_error_backoff;
        let writes = modem.timed_writes();
        assert_eq!(responder.replies(), 1);
        assert_eq!(writes[0].1, "PONG#1");
        assert!(writes[0].0 >= backoff * 3);
        assert!(writes[0].0 < backoff * 3 + Duration::from_millis(10));
    }
}
