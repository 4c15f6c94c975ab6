//! Point-to-point LoRa link tester over a serial-attached modem.
//!
//! An initiator times `PING#<id>`/`PONG#<id>` round trips against an echo
//! responder on the far end; a passive collector tags free-running telemetry
//! with RSSI readings. Both sides share one escape-sequence command-mode
//! controller for reconfiguring the modem.

pub mod channel;
pub mod clock;
pub mod collector;
pub mod config;
pub mod configure;
pub mod error;
pub mod framing;
pub mod initiator;
pub mod mode;
pub mod parser;
pub mod protocol;
pub mod record;
pub mod report;
pub mod responder;
pub mod rssi;
pub mod session;
pub mod settings;
pub mod sim;
pub mod transmitter;

pub use error::{Error, Result};
