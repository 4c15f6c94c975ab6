use std::time::Duration;

/// What happened to one probe or observed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The matching acknowledgment arrived in time.
    Success { rtt: Duration, toa_estimate: Duration },
    /// No matching acknowledgment before the response timeout.
    Loss,
    /// A packet seen by the passive collector, which has no timing.
    Received,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Loss => "lost",
            Outcome::Received => "received",
        }
    }
}

/// One observation handed to the reporting side. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    id: u32,
    outcome: Outcome,
    rssi: Option<i32>,
    message: Option<String>,
}

impl PacketRecord {
    /// Answered probe; the time-on-air estimate is half the round trip.
    pub fn success(id: u32, rtt: Duration) -> Self {
        Self {
            id,
            outcome: Outcome::Success {
                rtt,
                toa_estimate: rtt / 2,
            },
            rssi: None,
            message: None,
        }
    }

    pub fn loss(id: u32) -> Self {
        Self {
            id,
            outcome: Outcome::Loss,
            rssi: None,
            message: None,
        }
    }

    /// Packet observed by the passive collector.
    pub fn received(id: u32, message: String, rssi: Option<i32>) -> Self {
        Self {
            id,
            outcome: Outcome::Received,
            rssi,
            message: Some(message),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn rssi(&self) -> Option<i32> {
        self.rssi
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn rtt(&self) -> Option<Duration> {
        match self.outcome {
            Outcome::Success { rtt, .. } => Some(rtt),
            _ => None,
        }
    }

    pub fn toa_estimate(&self) -> Option<Duration> {
        match self.outcome {
            Outcome::Success { toa_estimate, .. } => Some(toa_estimate),
            _ => None,
        }
    }

    pub fn is_loss(&self) -> bool {
        self.outcome == Outcome::Loss
    }
}
