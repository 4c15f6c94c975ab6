use std::time::Duration;

// Escape handshake
pub const ESCAPE_SEQUENCE: &[u8] = b"+++";
pub const LINE_TERMINATOR: &str = "\r\n";
pub const MODE_ENTRY_ATTEMPTS: usize = 2;

// Timing constants, shared with the peer implementation
pub const GUARD_INTERVAL_MS: u64 = 1_000;
pub const RESPONSE_SETTLE_MS: u64 = 500;
pub const EXIT_SETTLE_MS: u64 = 500;
pub const RESPONSE_TIMEOUT_MS: u64 = 4_000;
pub const PROBE_INTERVAL_MS: u64 = 1_000;
pub const READ_ERROR_BACKOFF_MS: u64 = 100;

// Serial port configuration
pub const DEFAULT_BAUD_RATE: u32 = 9_600;
pub const SERIAL_TIMEOUT_MS: u64 = 1_000;
// Longest unterminated line kept while waiting for its newline
pub const MAX_LINE_BYTES: usize = 1_024;

// Radio parameters
pub const MIN_SPREADING_FACTOR: u8 = 7;
pub const MAX_SPREADING_FACTOR: u8 = 12;

// Telemetry payload prefix ("Pkt #12")
pub const TELEMETRY_PREFIX: &str = "Pkt";

/// Fixed delays used by every component of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub guard_interval: Duration,
    pub response_settle: Duration,
    pub exit_settle: Duration,
    pub response_timeout: Duration,
    pub probe_interval: Duration,
    /// Pause after a failed read in the listening loops.
    pub read_error_backoff: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            guard_interval: Duration::from_millis(GUARD_INTERVAL_MS),
            response_settle: Duration::from_millis(RESPONSE_SETTLE_MS),
            exit_settle: Duration::from_millis(EXIT_SETTLE_MS),
            response_timeout: Duration::from_millis(RESPONSE_TIMEOUT_MS),
            probe_interval: Duration::from_millis(PROBE_INTERVAL_MS),
            read_error_backoff: Duration::from_millis(READ_ERROR_BACKOFF_MS),
        }
    }
}

/// LoRa spreading factor, 7 through 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpreadingFactor(u8);

impl SpreadingFactor {
    pub fn new(value: u8) -> Option<Self> {
        (MIN_SPREADING_FACTOR..=MAX_SPREADING_FACTOR)
            .contains(&value)
            .then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for SpreadingFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SF{}", self.0)
    }
}
