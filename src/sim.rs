//! Simulated modem, peer and clock.
//!
//! [`SimModem`] stands in for the serial-attached modem and whatever sits at
//! the far end of the radio link. It shares a [`SimClock`] with the session,
//! so guard intervals, response timeouts and probe pacing cost no real time:
//! every `sleep` advances the clock and every poll of the channel advances it
//! by a small fixed step.
//!
//! Modelled behavior:
//! - `+++` toggles command mode and answers `Entry AT` or `Exit AT`
//!   (or nothing at all with [`SimModem::silent_escape`]).
//! - In command mode, `AT+RSSI` and `AT+SF<n>` are answered; anything else
//!   gets `ERROR`.
//! - In data mode, an optional echo peer answers `PING#<id>` with
//!   `PONG#<id>` after twice the one-way link delay, unless the id is offline.
//! - Lines can be injected to arrive at a given simulated time.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crate::channel::Channel;
use crate::clock::Clock;
use crate::config::ESCAPE_SEQUENCE;
use crate::error::{Error, Result};
use crate::parser::parse_ping;
use crate::protocol::{self, RSSI_QUERY, SPREADING_FACTOR_COMMAND};
use crate::session::StopSignal;

const ACK_DELAY: Duration = Duration::from_millis(5);
const COMMAND_REPLY_DELAY: Duration = Duration::from_millis(50);
const POLL_COST: Duration = Duration::from_millis(1);
const DEFAULT_RSSI: i32 = -98;

/// Manually advanced clock shared by clones.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<Duration>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

struct ModemState {
    clock: SimClock,
    command_mode: bool,
    acknowledge_escape: bool,
    accept_commands: bool,
    rssi: Option<i32>,
    peer_delay: Option<Duration>,
    offline_ids: HashSet<u32>,
    // kept sorted by arrival time
    inbound: Vec<(Duration, Vec<u8>)>,
    tx_pending: Vec<u8>,
    writes: Vec<(Duration, String)>,
    raw: Vec<u8>,
    escapes: usize,
    pings: usize,
    spreading_factor: Option<u8>,
    failing_writes: usize,
    failing_reads: usize,
    stop_after_pings: Option<(usize, StopSignal)>,
    stop_when_drained: Option<StopSignal>,
    read_timeout: Option<Duration>,
    close_count: usize,
}

impl ModemState {
    fn schedule(&mut self, due: Duration, bytes: Vec<u8>) {
        let pos = self.inbound.partition_point(|(d, _)| *d <= due);
        self.inbound.insert(pos, (due, bytes));
    }

    fn escape(&mut self) {
        self.escapes += 1;
        if !self.acknowledge_escape {
            return;
        }
        let ack = if self.command_mode { "Exit AT" } else { "Entry AT" };
        self.command_mode = !self.command_mode;
        let due = self.clock.now() + ACK_DELAY;
        self.schedule(due, format!("{ack}\r\n").into_bytes());
    }

    fn handle_line(&mut self, line: String) {
        let now = self.clock.now();
        self.writes.push((now, line.clone()));

        if self.command_mode {
            let reply = self.command_reply(&line);
            self.schedule(now + COMMAND_REPLY_DELAY, reply.into_bytes());
            return;
        }

        let Some(id) = parse_ping(&line) else {
            return;
        };
        self.pings += 1;
        if let Some((after, stop)) = &self.stop_after_pings
            && self.pings >= *after
        {
            stop.trigger();
        }
        if let Some(delay) = self.peer_delay
            && !self.offline_ids.contains(&id)
        {
            let reply = format!("{}\r\n", protocol::pong(id));
            self.schedule(now + delay * 2, reply.into_bytes());
        }
    }

    fn command_reply(&mut self, line: &str) -> String {
        if !self.accept_commands {
            return "ERROR\r\n".to_string();
        }
        if line == RSSI_QUERY {
            return match self.rssi {
                Some(rssi) => format!("RSSI: {rssi} dBm\r\nOK\r\n"),
                None => "ERROR\r\n".to_string(),
            };
        }
        match line
            .strip_prefix(SPREADING_FACTOR_COMMAND)
            .and_then(|n| n.parse::<u8>().ok())
        {
            Some(sf) => {
                self.spreading_factor = Some(sf);
                "OK\r\n".to_string()
            }
            None => "ERROR\r\n".to_string(),
        }
    }

    fn is_closed(&self) -> bool {
        self.close_count > 0
    }
}

/// Handle for configuring and inspecting a simulated modem.
#[derive(Clone)]
pub struct SimModem {
    state: Rc<RefCell<ModemState>>,
}

impl SimModem {
    /// A modem in data mode that acknowledges escapes, reports -98 dBm and
    /// has no echo peer.
    pub fn new(clock: &SimClock) -> Self {
        let state = ModemState {
            clock: clock.clone(),
            command_mode: false,
            acknowledge_escape: true,
            accept_commands: true,
            rssi: Some(DEFAULT_RSSI),
            peer_delay: None,
            offline_ids: HashSet::new(),
            inbound: Vec::new(),
            tx_pending: Vec::new(),
            writes: Vec::new(),
            raw: Vec::new(),
            escapes: 0,
            pings: 0,
            spreading_factor: None,
            failing_writes: 0,
            failing_reads: 0,
            stop_after_pings: None,
            stop_when_drained: None,
            read_timeout: None,
            close_count: 0,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// A [`Channel`] attached to this modem.
    pub fn channel(&self) -> SimChannel {
        SimChannel {
            state: Rc::clone(&self.state),
        }
    }

    pub fn starting_in_command_mode(self) -> Self {
        self.state.borrow_mut().command_mode = true;
        self
    }

    /// Escapes are neither acknowledged nor acted on.
    pub fn silent_escape(self) -> Self {
        self.state.borrow_mut().acknowledge_escape = false;
        self
    }

    /// Every AT command is answered with `ERROR`.
    pub fn rejecting_commands(self) -> Self {
        self.state.borrow_mut().accept_commands = false;
        self
    }

    pub fn with_rssi(self, rssi: Option<i32>) -> Self {
        self.state.borrow_mut().rssi = rssi;
        self
    }

    /// Attach a responder that echoes pings after `2 * link_delay`.
    pub fn with_echo_peer(self, link_delay: Duration) -> Self {
        self.state.borrow_mut().peer_delay = Some(link_delay);
        self
    }

    /// Probe ids the echo peer never answers.
    pub fn with_offline_ids(self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.state.borrow_mut().offline_ids.extend(ids);
        self
    }

    /// The next `n` writes fail with an I/O error.
    pub fn failing_writes(self, n: usize) -> Self {
        self.state.borrow_mut().failing_writes = n;
        self
    }

    /// Fail the next `n` reads, as an unplugged adapter would.
    pub fn failing_reads(self, n: usize) -> Self {
        self.state.borrow_mut().failing_reads = n;
        self
    }

    /// Trigger `stop` once `n` pings have been written.
    pub fn stop_after_pings(self, n: usize, stop: StopSignal) -> Self {
        self.state.borrow_mut().stop_after_pings = Some((n, stop));
        self
    }

    /// Trigger `stop` when a read leaves nothing scheduled.
    pub fn stop_when_drained(self, stop: StopSignal) -> Self {
        self.state.borrow_mut().stop_when_drained = Some(stop);
        self
    }

    /// Deliver `text` once the clock reaches `at`.
    pub fn inject(&self, at: Duration, text: &str) {
        self.inject_bytes(at, text.as_bytes());
    }

    pub fn inject_bytes(&self, at: Duration, bytes: &[u8]) {
        self.state.borrow_mut().schedule(at, bytes.to_vec());
    }

    /// Lines written in data or command mode, in order. Escapes are not included.
    pub fn written_lines(&self) -> Vec<String> {
        self.timed_writes().into_iter().map(|(_, line)| line).collect()
    }

    /// Written lines with the simulated time of the write.
    pub fn timed_writes(&self) -> Vec<(Duration, String)> {
        self.state.borrow().writes.clone()
    }

    /// Every byte written, escapes included.
    pub fn raw_written(&self) -> Vec<u8> {
        self.state.borrow().raw.clone()
    }

    pub fn escape_count(&self) -> usize {
        self.state.borrow().escapes
    }

    pub fn ping_count(&self) -> usize {
        self.state.borrow().pings
    }

    pub fn spreading_factor(&self) -> Option<u8> {
        self.state.borrow().spreading_factor
    }

    pub fn in_command_mode(&self) -> bool {
        self.state.borrow().command_mode
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.state.borrow().read_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().is_closed()
    }

    pub fn close_count(&self) -> usize {
        self.state.borrow().close_count
    }
}

/// The session-facing side of a [`SimModem`].
pub struct SimChannel {
    state: Rc<RefCell<ModemState>>,
}

impl Channel for SimChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.is_closed() {
            return Err(Error::Closed);
        }
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated write failure").into());
        }

        state.raw.extend_from_slice(bytes);
        if bytes == ESCAPE_SEQUENCE {
            state.escape();
            return Ok(());
        }

        state.tx_pending.extend_from_slice(bytes);
        while let Some(pos) = state.tx_pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = state.tx_pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line).trim().to_string();
            state.handle_line(line);
        }
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        if state.is_closed() {
            return Err(Error::Closed);
        }

        state.clock.advance(POLL_COST);
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated read failure").into());
        }
        let now = state.clock.now();
        let arrived = state.inbound.partition_point(|(due, _)| *due <= now);
        let bytes: Vec<u8> = state
            .inbound
            .drain(..arrived)
            .flat_map(|(_, bytes)| bytes)
            .collect();

        if state.inbound.is_empty()
            && let Some(stop) = &state.stop_when_drained
        {
            stop.trigger();
        }
        Ok(bytes)
    }

    fn flush_input(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.is_closed() {
            return Err(Error::Closed);
        }
        let now = state.clock.now();
        state.inbound.retain(|(due, _)| *due > now);
        Ok(())
    }

    fn flush_output(&mut self) -> Result<()> {
        if self.state.borrow().is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.state.borrow_mut().read_timeout = Some(timeout);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.is_closed() {
            return Err(Error::Closed);
        }
        state.close_count += 1;
        Ok(())
    }
}
