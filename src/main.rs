// lora_pingpong -- latency and signal-strength tester for a point-to-point
// LoRa link behind a serial AT modem.
//
// Usage:
//   lora_pingpong --port /dev/ttyUSB0 --sf 9 ping --count 20
//   lora_pingpong --port /dev/ttyUSB1 --sf 9 echo
//   lora_pingpong --port COM4 collect --expected 50 --report run.json
//   lora_pingpong --port COM3 transmit --count 50 --interval 3
//   lora_pingpong --simulate ping --count 5

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lora_pingpong::channel::{Channel, SerialChannel};
use lora_pingpong::clock::{Clock, SystemClock};
use lora_pingpong::collector::PassiveCollector;
use lora_pingpong::config::{SpreadingFactor, TELEMETRY_PREFIX, Timing};
use lora_pingpong::configure::LinkConfigurator;
use lora_pingpong::initiator::PingPongInitiator;
use lora_pingpong::protocol;
use lora_pingpong::report::{Role, RunReport};
use lora_pingpong::responder::EchoResponder;
use lora_pingpong::rssi::RssiSampler;
use lora_pingpong::session::{Session, StopSignal};
use lora_pingpong::settings::LinkSettings;
use lora_pingpong::sim::{SimClock, SimModem};
use lora_pingpong::transmitter::TelemetrySender;

// One-way link delay of the simulated echo peer
const SIM_LINK_DELAY_MS: u64 = 40;
const SIM_ECHO_PINGS: u64 = 5;
const SIM_TELEMETRY_SPACING_S: u64 = 4;

/// Latency and RSSI tester for a serial-attached LoRa modem pair.
#[derive(Parser)]
#[command(name = "lora_pingpong", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3). Overrides the config file.
    #[arg(long)]
    port: Option<String>,

    /// Baud rate. Overrides the config file.
    #[arg(long)]
    baud: Option<u32>,

    /// JSON settings file (port, baud_rate, read_timeout_ms, spreading_factor).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Spreading factor to configure before the run starts.
    #[arg(long, value_parser = clap::value_parser!(u8).range(7..=12))]
    sf: Option<u8>,

    /// Run against a simulated modem and peer instead of a serial port.
    #[arg(long)]
    simulate: bool,

    /// Write the run report to this JSON file.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Send timed pings and measure round-trip latency.
    Ping {
        #[arg(long, default_value_t = 10)]
        count: u32,
    },
    /// Answer every ping with a pong until interrupted.
    Echo,
    /// Record incoming telemetry with an RSSI reading per packet.
    Collect {
        /// Packets the transmitter will send; used for the loss rate.
        #[arg(long)]
        expected: u32,
    },
    /// Send numbered telemetry packets at a fixed interval.
    Transmit {
        #[arg(long, default_value_t = 10)]
        count: u32,
        /// Seconds between packets.
        #[arg(long, default_value_t = 1.0)]
        interval: f64,
    },
    /// Take a single RSSI reading.
    Rssi,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = match &cli.config {
        Some(path) => LinkSettings::load_from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => LinkSettings::default(),
    };
    if cli.port.is_some() {
        settings.port = cli.port.clone();
    }
    if let Some(baud) = cli.baud {
        settings.baud_rate = baud;
    }
    if cli.sf.is_some() {
        settings.spreading_factor = cli.sf;
    }
    let sf = settings.spreading_factor()?;

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.trigger())
        .context("failed to set Ctrl+C handler")?;

    let (mut session, simulation) = if cli.simulate {
        let clock = SimClock::new();
        let modem = SimModem::new(&clock);
        let session = Session::new(
            Box::new(modem.channel()),
            Box::new(clock.clone()),
            Timing::default(),
        );
        (session, Some((modem, clock)))
    } else {
        (open_serial_session(&settings)?, None)
    };

    if let Some(sf) = sf {
        LinkConfigurator::new(&mut session).set_spreading_factor(sf);
    }

    if let Some((modem, clock)) = simulation {
        seed_simulation(cli.command, modem, &clock, &stop);
    }

    let report = run_role(cli.command, &mut session, &stop, sf)?;

    if let Err(e) = session.close() {
        tracing::warn!(error = %e, "Failed to close channel");
    }

    if let Some(report) = report {
        println!("{}", report.summary);
        if let Some(path) = &cli.report {
            report
                .save_to_file(path)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn open_serial_session(settings: &LinkSettings) -> Result<Session> {
    let Some(port) = settings.port.as_deref() else {
        bail!("no serial port given (use --port or a settings file)");
    };

    let mut channel = SerialChannel::open(port, settings.baud_rate)?;
    channel.set_read_timeout(settings.read_timeout())?;

    Ok(Session::new(
        Box::new(channel),
        Box::new(SystemClock::new()),
        Timing::default(),
    ))
}

/// Give the simulated far end something to do for the chosen role.
fn seed_simulation(command: Command, modem: SimModem, clock: &SimClock, stop: &StopSignal) {
    let start = clock.now();
    let modem = match command {
        Command::Ping { .. } => modem.with_echo_peer(Duration::from_millis(SIM_LINK_DELAY_MS)),
        Command::Echo => modem.stop_when_drained(stop.clone()),
        _ => modem,
    };

    match command {
        Command::Echo => {
            for id in 1..=SIM_ECHO_PINGS {
                let line = format!("{}\r\n", protocol::ping(id as u32));
                modem.inject(start + Duration::from_secs(id), &line);
            }
        }
        Command::Collect { expected } => {
            for seq in 1..=expected {
                let line = format!("{}\r\n", protocol::telemetry(TELEMETRY_PREFIX, seq));
                let at = Duration::from_secs(SIM_TELEMETRY_SPACING_S * u64::from(seq));
                modem.inject(start + at, &line);
            }
        }
        Command::Ping { .. } | Command::Transmit { .. } | Command::Rssi => {}
    }
}

fn run_role(
    command: Command,
    session: &mut Session,
    stop: &StopSignal,
    sf: Option<SpreadingFactor>,
) -> Result<Option<RunReport>> {
    let sf_value = sf.map(SpreadingFactor::get);

    let report = match command {
        Command::Ping { count } => {
            let records = PingPongInitiator::new(count).run(session, stop);
            Some(RunReport::new(Role::Ping, sf_value, count, &records))
        }
        Command::Echo => {
            let mut responder = EchoResponder::new();
            responder.run(session, stop);
            println!("Replied to {} pings", responder.replies());
            None
        }
        Command::Collect { expected } => {
            let records = PassiveCollector::new(Some(expected as usize)).run(session, stop);
            Some(RunReport::new(Role::Collect, sf_value, expected, &records))
        }
        Command::Transmit { count, interval } => {
            let interval = Duration::try_from_secs_f64(interval)
                .with_context(|| format!("invalid interval: {interval}"))?;
            let sent = TelemetrySender::new(TELEMETRY_PREFIX, count, interval).run(session, stop);
            println!("Sent {sent} of {count} packets");
            None
        }
        Command::Rssi => {
            match RssiSampler::new(session).sample_rssi() {
                Some(rssi) => println!("RSSI: {rssi} dBm"),
                None => println!("RSSI unavailable"),
            }
            None
        }
    };

    Ok(report)
}
