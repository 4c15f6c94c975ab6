use chrono::Local;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::record::PacketRecord;

/// Role whose records a summary covers. Decides how losses are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Every sent probe has a record; losses are the `Loss` records.
    Ping,
    /// Only heard packets have records; losses are the expected total minus
    /// what arrived.
    Collect,
}

/// End-of-run statistics over the records a role produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub requested: u32,
    pub received: usize,
    pub lost: usize,
    pub loss_rate_pct: f64,
    pub mean_rtt_s: Option<f64>,
    pub mean_toa_s: Option<f64>,
    pub mean_rssi_dbm: Option<f64>,
}

impl RunSummary {
    /// Summarise `records`. For a ping run cut short, probes that were never
    /// sent are not losses and the rate is taken over the probes sent.
    pub fn from_records(role: Role, records: &[PacketRecord], requested: u32) -> Self {
        let received = records.iter().filter(|r| !r.is_loss()).count();
        let (lost, attempted) = match role {
            Role::Ping => (records.iter().filter(|r| r.is_loss()).count(), records.len()),
            Role::Collect => (
                (requested as usize).saturating_sub(received),
                requested as usize,
            ),
        };
        let loss_rate_pct = if attempted > 0 {
            lost as f64 / attempted as f64 * 100.0
        } else {
            0.0
        };

        Self {
            requested,
            received,
            lost,
            loss_rate_pct,
            mean_rtt_s: mean(records.iter().filter_map(PacketRecord::rtt).map(secs)),
            mean_toa_s: mean(records.iter().filter_map(PacketRecord::toa_estimate).map(secs)),
            mean_rssi_dbm: mean(records.iter().filter_map(PacketRecord::rssi).map(f64::from)),
        }
    }
}

fn secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(40);
        writeln!(f, "{rule}")?;
        writeln!(f, "RUN SUMMARY")?;
        writeln!(f, "Requested:        {}", self.requested)?;
        writeln!(f, "Received:         {}", self.received)?;
        writeln!(f, "Lost:             {}", self.lost)?;
        writeln!(f, "Loss rate:        {:.2}%", self.loss_rate_pct)?;
        if let Some(rtt) = self.mean_rtt_s {
            writeln!(f, "Mean RTT:         {rtt:.4} s")?;
        }
        if let Some(toa) = self.mean_toa_s {
            writeln!(f, "Mean ToA (est.):  {toa:.4} s")?;
        }
        if let Some(rssi) = self.mean_rssi_dbm {
            writeln!(f, "Mean RSSI:        {rssi:.2} dBm")?;
        }
        write!(f, "{rule}")
    }
}

/// One table row per record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordRow {
    pub id: u32,
    pub status: &'static str,
    pub rtt_s: Option<f64>,
    pub toa_s: Option<f64>,
    pub rssi_dbm: Option<i32>,
    pub message: Option<String>,
}

impl From<&PacketRecord> for RecordRow {
    fn from(record: &PacketRecord) -> Self {
        Self {
            id: record.id(),
            status: record.outcome().label(),
            rtt_s: record.rtt().map(secs),
            toa_s: record.toa_estimate().map(secs),
            rssi_dbm: record.rssi(),
            message: record.message().map(str::to_string),
        }
    }
}

/// Everything handed to the user after a run, exportable as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub role: Role,
    pub spreading_factor: Option<u8>,
    pub records: Vec<RecordRow>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(
        role: Role,
        spreading_factor: Option<u8>,
        requested: u32,
        records: &[PacketRecord],
    ) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            role,
            spreading_factor,
            records: records.iter().map(RecordRow::from).collect(),
            summary: RunSummary::from_records(role, records, requested),
        }
    }

    /// Save the report as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
