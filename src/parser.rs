use crate::protocol::{ENTRY_ACK, EXIT_ACK, PING_TOKEN, PONG_TOKEN};

/// Acknowledgment text the modem prints after an escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeAck {
    /// The modem switched into command mode.
    Entry,
    /// The modem was in command mode and switched back to data mode.
    Exit,
}

/// Classify the text read after an escape sequence (case-insensitive).
pub fn parse_mode_ack(text: &str) -> Option<ModeAck> {
    let lower = text.to_lowercase();
    if lower.contains(ENTRY_ACK) {
        Some(ModeAck::Entry)
    } else if lower.contains(EXIT_ACK) {
        Some(ModeAck::Exit)
    } else {
        None
    }
}

/// First `-` followed by two or three digits, as a dBm reading.
///
/// "RSSI: -98 dBm" gives -98. Longer digit runs are cut to three digits.
pub fn parse_rssi(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    for (pos, _) in text.match_indices('-') {
        let digits = bytes[pos + 1..]
            .iter()
            .take(3)
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits >= 2 {
            let value: i32 = text[pos + 1..pos + 1 + digits].parse().ok()?;
            return Some(-value);
        }
    }
    None
}

/// Id of a `PING#<id>` probe anywhere in the line.
pub fn parse_ping(line: &str) -> Option<u32> {
    let (_, rest) = line.split_once(PING_TOKEN)?;
    leading_number(rest)
}

/// True when the line carries `PONG#<id>` for exactly this id.
///
/// `PONG#12` does not acknowledge probe 1.
pub fn is_pong_for(line: &str, id: u32) -> bool {
    line.match_indices(PONG_TOKEN)
        .any(|(pos, token)| leading_number(&line[pos + token.len()..]) == Some(id))
}

/// Payload id following the first `#`, e.g. "Pkt #17" gives 17. Ids start
/// at 1, so "Pkt #0" has none.
pub fn parse_packet_id(message: &str) -> Option<u32> {
    let (_, rest) = message.split_once('#')?;
    leading_number(rest).filter(|&id| id > 0)
}

/// Lines the passive collector must not treat as payload.
pub fn is_command_line(line: &str) -> bool {
    line.is_empty() || line == "OK" || line == "ERROR" || line.contains("AT")
}

fn leading_number(text: &str) -> Option<u32> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end].parse().ok()
}
