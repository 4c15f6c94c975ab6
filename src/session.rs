//! Per-run ownership of the link.
//!
//! A [`Session`] owns the channel, the clock and the mode state for one run.
//! Every component borrows the session; nothing about the link lives outside
//! it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::channel::Channel;
use crate::clock::Clock;
use crate::config::{LINE_TERMINATOR, Timing};
use crate::error::Result;
use crate::framing::LineBuffer;
use crate::mode::{ModeController, ModeState};

/// Cooperative stop request shared between a role loop and whoever cancels it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Session {
    channel: Box<dyn Channel>,
    clock: Box<dyn Clock>,
    timing: Timing,
    mode: ModeState,
    lines: LineBuffer,
    closed: bool,
}

impl Session {
    pub fn new(channel: Box<dyn Channel>, clock: Box<dyn Clock>, timing: Timing) -> Self {
        Self {
            channel,
            clock,
            timing,
            mode: ModeState::Data,
            lines: LineBuffer::new(),
            closed: false,
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn mode_state(&self) -> ModeState {
        self.mode
    }

    pub(crate) fn set_mode_state(&mut self, state: ModeState) {
        if self.mode != state {
            tracing::trace!(from = ?self.mode, to = ?state, "Mode transition");
        }
        self.mode = state;
    }

    /// Command-mode controller borrowing this session.
    pub fn mode(&mut self) -> ModeController<'_> {
        ModeController::new(self)
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn sleep(&self, duration: Duration) {
        self.clock.sleep(duration);
    }

    /// Write raw bytes with no terminator (used for the escape sequence).
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.channel.write(bytes)
    }

    /// Write one text message followed by CR/LF.
    pub fn send_line(&mut self, text: &str) -> Result<()> {
        let mut frame = String::with_capacity(text.len() + LINE_TERMINATOR.len());
        frame.push_str(text);
        frame.push_str(LINE_TERMINATOR);
        self.channel.write(frame.as_bytes())
    }

    /// Next complete inbound line, if one has arrived. Never blocks.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.lines.pop_line() {
            return Ok(Some(line));
        }
        let bytes = self.channel.read_available()?;
        self.lines.push(&bytes);
        Ok(self.lines.pop_line())
    }

    /// Everything received so far, including partial lines, decoded leniently.
    pub fn drain_text(&mut self) -> Result<String> {
        let bytes = self.channel.read_available()?;
        self.lines.push(&bytes);
        Ok(self.lines.take_all())
    }

    pub fn flush_input(&mut self) -> Result<()> {
        self.lines.clear();
        self.channel.flush_input()
    }

    pub fn flush_output(&mut self) -> Result<()> {
        self.channel.flush_output()
    }

    /// Close the channel. Only the first call reaches the channel.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.channel.close()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Failed to close channel");
        }
    }
}
