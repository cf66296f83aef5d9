use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{Connection, MeterActor};
use domain::{ExchangeError, Reading, Transport};
use infrastructure::{MonitorConfig, OutputFormat, PollMode, SerialConfig, SerialLine};
use pf_monitor::output::ReadingPrinter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Override serial port
    #[arg(long)]
    port: Option<String>,

    /// Override poll mode
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Stop after this many readings
    #[arg(long)]
    count: Option<u64>,

    /// Print one JSON object per reading
    #[arg(long)]
    json: bool,

    /// Talk to a simulated meter on a pseudo-terminal
    #[arg(long)]
    simulate: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Sync,
    Async,
}

impl From<ModeArg> for PollMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sync => PollMode::Sync,
            ModeArg::Async => PollMode::Async,
        }
    }
}

fn list_ports() -> Result<()> {
    let ports = tokio_serial::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }

    for port in ports {
        match port.port_type {
            tokio_serial::SerialPortType::UsbPort(usb) => println!(
                "{}  USB {:04x}:{:04x} {}",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product.unwrap_or_default()
            ),
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn start_simulator(config: &mut MonitorConfig) -> Result<()> {
    let instrument = infrastructure::drivers::PtyInstrument::open(config.simulator.clone())?;
    config.serial.port = instrument.path().to_string();
    info!(port = %config.serial.port, "Using simulated meter");
    instrument.spawn()?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn start_simulator(_config: &mut MonitorConfig) -> Result<()> {
    bail!("--simulate needs pseudo-terminal support, only available on Linux")
}

/// Opens the meter line and drops anything left over from a previous session
fn open_line(serial: &SerialConfig) -> Result<Connection<SerialLine>> {
    let mut conn = Connection::open_with(serial)?;
    conn.transport_mut().discard_pending()?;
    Ok(conn)
}

fn limit_reached(limit: Option<u64>, taken: u64) -> bool {
    limit.is_some_and(|max| taken >= max)
}

/// Blocking loop: one exchange per interval on a dedicated thread
///
/// The line is opened on that thread; a connection with a handler slot is not `Send`.
async fn run_sync(config: &MonitorConfig) -> Result<()> {
    let printer = ReadingPrinter::new(config.output);
    let interval = Duration::from_millis(config.interval_ms);
    let limit = config.max_readings;
    let serial = config.serial.clone();

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    std::thread::Builder::new()
        .name("pf9802-sync".to_string())
        .spawn(move || {
            let result = (|| -> Result<()> {
                let mut conn = open_line(&serial)?;
                let mut taken = 0;
                while !limit_reached(limit, taken) {
                    if taken > 0 {
                        std::thread::sleep(interval);
                    }
                    match conn.read_measurement() {
                        Ok(m) => printer.print(&Reading::now(m))?,
                        Err(e) => {
                            error!(
                                error = %e,
                                code = e.code(),
                                errno = ?e.raw_os_error(),
                                "Reading failed"
                            );
                            bail!(e);
                        }
                    }
                    taken += 1;
                }
                conn.close();
                Ok(())
            })();
            let _ = done_tx.send(result);
        })?;

    tokio::select! {
        result = done_rx => result?,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("🛑 Shutting down..."),
                Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
            }
            Ok(())
        }
    }
}

/// Event-driven loop: exchanges back to back on the tokio reactor
async fn run_async(config: &MonitorConfig) -> Result<()> {
    let mut conn = open_line(&config.serial)?;
    let printer = ReadingPrinter::new(config.output);
    let limit = config.max_readings;
    if limit == Some(0) {
        conn.close();
        return Ok(());
    }

    let failure: Rc<RefCell<Option<ExchangeError>>> = Rc::new(RefCell::new(None));
    let failure_slot = Rc::clone(&failure);
    let mut taken = 0u64;

    conn.init_async(move |outcome, control| match outcome {
        Ok(m) => {
            if let Err(e) = printer.print(&Reading::now(m)) {
                warn!(error = %e, "Failed to write reading");
                control.stop();
                return;
            }
            taken += 1;
            if limit_reached(limit, taken) {
                control.stop();
            }
        }
        Err(e) => {
            error!(
                error = %e,
                code = e.code(),
                errno = ?e.raw_os_error(),
                "Reading failed"
            );
            *failure_slot.borrow_mut() = Some(e);
        }
    })?;

    let actor = MeterActor::new(conn);
    let token = actor.cancel_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("🛑 Shutting down..."),
            Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
        }
        token.cancel();
    });

    let conn = actor.run().await?;
    conn.close();

    if let Some(e) = failure.borrow_mut().take() {
        bail!(e);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,pf_monitor=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if args.list_ports {
        return list_ports();
    }

    // 1. Load Configuration
    let mut config = MonitorConfig::load(&args.config_dir)?;

    // Override with CLI args if present
    if let Some(port) = args.port {
        config.serial.port = port;
    }
    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }
    if let Some(count) = args.count {
        config.max_readings = Some(count);
    }
    if args.json {
        config.output = OutputFormat::Json;
    }

    // 2. Simulated meter replaces the configured port
    if args.simulate {
        start_simulator(&mut config)?;
    }

    info!(
        port = %config.serial.port,
        baud_rate = config.serial.baud_rate,
        mode = ?config.mode,
        "📟 PF9802 Monitor Starting..."
    );

    // 3. Poll
    match config.mode {
        PollMode::Sync => run_sync(&config).await?,
        PollMode::Async => run_async(&config).await?,
    }

    info!("👋 Good bye!");
    Ok(())
}

fn main() {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run()) {
        eprintln!("\n❌ CRITICAL ERROR: {:?}", e);
        std::process::exit(1);
    }
}
