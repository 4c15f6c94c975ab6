// Wire tokens exchanged with the modem and with the peer

pub const PING_TOKEN: &str = "PING#";
pub const PONG_TOKEN: &str = "PONG#";

pub const ENTRY_ACK: &str = "entry at";
pub const EXIT_ACK: &str = "exit at";

pub const RSSI_QUERY: &str = "AT+RSSI";
pub const SPREADING_FACTOR_COMMAND: &str = "AT+SF";

pub fn ping(id: u32) -> String {
    format!("{PING_TOKEN}{id}")
}

pub fn pong(id: u32) -> String {
    format!("{PONG_TOKEN}{id}")
}

pub fn set_spreading_factor(sf: u8) -> String {
    format!("{SPREADING_FACTOR_COMMAND}{sf}")
}

/// Payload sent by the free-running telemetry transmitter.
pub fn telemetry(prefix: &str, seq: u32) -> String {
    format!("{prefix} #{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_builders() {
        assert_eq!(ping(1), "PING#1");
        assert_eq!(pong(42), "PONG#42");
        assert_eq!(set_spreading_factor(9), "AT+SF9");
        assert_eq!(telemetry("Pkt", 3), "Pkt #3");
    }
}
