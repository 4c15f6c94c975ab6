use std::time::Duration;

use crate::parser::is_pong_for;
use crate::protocol;
use crate::record::PacketRecord;
use crate::session::{Session, StopSignal};

/// Sends `PING#1..=count` and times each matching `PONG`.
pub struct PingPongInitiator {
    count: u32,
}

impl PingPongInitiator {
    pub fn new(count: u32) -> Self {
        Self { count }
    }

    /// Run the probe loop. Stops early, keeping what was measured, once
    /// `stop` is triggered. A probe still waiting for its `PONG` when that
    /// happens is abandoned and leaves no record.
    pub fn run(&self, session: &mut Session, stop: &StopSignal) -> Vec<PacketRecord> {
        let mut records = Vec::with_capacity(self.count as usize);
        tracing::info!(count = self.count, "Starting ping-pong run");

        for id in 1..=self.count {
            if stop.is_triggered() {
                break;
            }

            let record = match self.probe(session, id, stop) {
                Wait::Acked(rtt) => PacketRecord::success(id, rtt),
                Wait::TimedOut => PacketRecord::loss(id),
                Wait::Cancelled => {
                    tracing::debug!(id, "Probe abandoned");
                    break;
                }
            };
            match (record.rtt(), record.toa_estimate()) {
                (Some(rtt), Some(toa)) => tracing::info!(
                    id,
                    rtt_s = rtt.as_secs_f64(),
                    toa_s = toa.as_secs_f64(),
                    "PONG received"
                ),
                _ => tracing::info!(id, "Probe lost (timeout)"),
            }
            records.push(record);

            if stop.is_triggered() {
                break;
            }
            session.sleep(session.timing().probe_interval);
        }

        if stop.is_triggered() {
            tracing::info!(completed = records.len(), "Run interrupted");
        }
        records
    }

    fn probe(&self, session: &mut Session, id: u32, stop: &StopSignal) -> Wait {
        if let Err(e) = session.flush_input() {
            tracing::warn!(id, error = %e, "Failed to flush input before probe");
        }

        let t0 = session.now();
        if let Err(e) = session.send_line(&protocol::ping(id)) {
            tracing::warn!(id, error = %e, "Failed to send probe");
        }

        self.await_pong(session, id, t0, stop)
    }

    /// Tight poll for the matching acknowledgment; no sleeping, so the
    /// timestamp is taken as close to arrival as possible.
    fn await_pong(&self, session: &mut Session, id: u32, t0: Duration, stop: &StopSignal) -> Wait {
        let timeout = session.timing().response_timeout;

        loop {
            if stop.is_triggered() {
                return Wait::Cancelled;
            }
            if session.now().saturating_sub(t0) > timeout {
                return Wait::TimedOut;
            }

            match session.read_line() {
                Ok(Some(line)) if is_pong_for(&line, id) => {
                    return Wait::Acked(session.now().saturating_sub(t0));
                }
                Ok(Some(line)) => tracing::trace!(id, line = %line, "Discarding unrelated line"),
                Ok(None) => {}
                Err(e) => tracing::debug!(id, error = %e, "Read failed while waiting for PONG"),
            }
        }
    }
}

enum Wait {
    Acked(Duration),
    TimedOut,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::config::Timing;
    use crate::record::Outcome;
    use crate::sim::{SimClock, SimModem};

    fn session_with(modem: &SimModem, clock: &SimClock) -> Session {
        Session::new(
            Box::new(modem.channel()),
            Box::new(clock.clone()),
            Timing::default(),
        )
    }

    #[test]
    fn one_record_per_id_in_order() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock).with_echo_peer(Duration::from_millis(15));
        let mut session = session_with(&modem, &clock);

        let records = PingPongInitiator::new(4).run(&mut session, &StopSignal::new());
        let ids: Vec<u32> = records.iter().map(PacketRecord::id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(records.iter().all(|r| !r.is_loss()));
    }

    #[test]
    fn rtt_tracks_link_delay() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock).with_echo_peer(Duration::from_millis(20));
        let mut session = session_with(&modem, &clock);

        let records = PingPongInitiator::new(1).run(&mut session, &StopSignal::new());
        let rtt = records[0].rtt().unwrap();
        assert!(rtt >= Duration::from_millis(40));
        assert!(rtt <= Duration::from_millis(42));
        match records[0].outcome() {
            Outcome::Success { rtt, toa_estimate } => assert_eq!(toa_estimate, rtt / 2),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn timeout_records_loss_and_moves_on() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock)
            .with_echo_peer(Duration::from_millis(10))
            .with_offline_ids([1]);
        let mut session = session_with(&modem, &clock);

        let start = clock.now();
        let records = PingPongInitiator::new(2).run(&mut session, &StopSignal::new());
        let elapsed = clock.now() - start;

        assert!(records[0].is_loss());
        assert!(!records[1].is_loss());
        let timing = Timing::default();
        // timeout + two probe intervals + the second round trip
        assert!(elapsed > timing.response_timeout + timing.probe_interval * 2);
        let slack = Duration::from_millis(50);
        assert!(elapsed < timing.response_timeout + timing.probe_interval * 2 + slack);
    }

    #[test]
    fn longer_id_does_not_acknowledge_shorter_one() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock)
            .with_echo_peer(Duration::from_millis(10))
            .with_offline_ids([1]);
        modem.inject(Duration::from_millis(5), "PONG#12\r\n");
        let mut session = session_with(&modem, &clock);

        let records = PingPongInitiator::new(1).run(&mut session, &StopSignal::new());
        assert!(records[0].is_loss());
    }

    #[test]
    fn duplicate_acknowledgments_are_ignored() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock).with_echo_peer(Duration::from_millis(10));
        // late duplicate of PONG#1, arrives during the probe interval
        modem.inject(Duration::from_millis(300), "PONG#1\r\n");
        let mut session = session_with(&modem, &clock);

        let records = PingPongInitiator::new(2).run(&mut session, &StopSignal::new());
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().filter(|r| r.id() == 1).count(), 1);
        assert!(records.iter().all(|r| !r.is_loss()));
    }

    #[test]
    fn stop_keeps_completed_records() {
        let clock = SimClock::new();
        let stop = StopSignal::new();
        let modem = SimModem::new(&clock)
            .with_echo_peer(Duration::from_millis(10))
            .stop_after_pings(3, stop.clone());
        let mut session = session_with(&modem, &clock);

        let records = PingPongInitiator::new(5).run(&mut session, &stop);
        let ids: Vec<u32> = records.iter().map(PacketRecord::id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(records.iter().all(|r| !r.is_loss()));
        assert_eq!(modem.ping_count(), 3);
    }

    #[test]
    fn stop_while_waiting_abandons_probe_without_pause() {
        let clock = SimClock::new();
        let stop = StopSignal::new();
        let modem = SimModem::new(&clock)
            .with_echo_peer(Duration::from_millis(10))
            .with_offline_ids([1])
            .stop_after_pings(1, stop.clone());
        let mut session = session_with(&modem, &clock);

        let start = clock.now();
        let records = PingPongInitiator::new(5).run(&mut session, &stop);
        let elapsed = clock.now() - start;

        assert!(records.is_empty());
        assert_eq!(modem.ping_count(), 1);
        assert!(elapsed < Duration::from_millis(10));
    }

    #[test]
    fn garbled_line_does_not_end_the_wait() {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock)
            .with_echo_peer(Duration::from_millis(10))
            .with_offline_ids([1]);
        modem.inject_bytes(Duration::from_millis(5), b"PONG#\xff1\r\n");
        modem.inject(Duration::from_millis(30), "PONG#1\r\n");
        let mut session = session_with(&modem, &clock);

        let records = PingPongInitiator::new(1).run(&mut session, &StopSignal::new());
        let rtt = records[0].rtt().unwrap();
        assert!(rtt >= Duration::from_millis(30));
        assert!(rtt <= Duration::from_millis(31));
    }
}
