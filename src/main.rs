use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ultrasonic_locator::api::{configure_pins, release_pins};
use ultrasonic_locator::core::Point2D;
use ultrasonic_locator::hardware::{EchoProfile, GpioInterface, MockGpio, SysfsGpio};
use ultrasonic_locator::{
    BlockingLocator, ConfigurationManager, DisplaySink, DotCanvas, JsonLinesStore, LocatorError,
    LogDisplay, SystemConfig,
};

/// Locate an object in a plane with two ultrasonic range sensors
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (JSON); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the active configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Log positions instead of drawing them
    #[arg(long)]
    headless: bool,

    /// Stop after this many rounds
    #[arg(short, long)]
    rounds: Option<u64>,

    /// Use a simulated sensor pair instead of real pins
    #[arg(long)]
    simulate: bool,

    /// Simulated target x in the sensor frame (cm)
    #[arg(long, default_value_t = 13.54, requires = "simulate")]
    target_x: f64,

    /// Simulated target y in the sensor frame (cm)
    #[arg(long, default_value_t = 13.54, requires = "simulate")]
    target_y: f64,

    /// Write the canvas as a PGM image on exit
    #[arg(long)]
    canvas_out: Option<PathBuf>,

    /// Root of the sysfs GPIO tree
    #[arg(long, default_value = "/sys/class/gpio")]
    gpio_root: PathBuf,
}

/// Display selected on the command line
enum Display {
    Canvas(DotCanvas),
    Log(LogDisplay),
}

impl DisplaySink for Display {
    fn show(&mut self, point: &Point2D) {
        match self {
            Display::Canvas(canvas) => canvas.show(point),
            Display::Log(log) => log.show(point),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), LocatorError> {
    let mut manager = match &args.config {
        Some(path) => ConfigurationManager::from_file(path)?,
        None => ConfigurationManager::new(),
    };

    if let Some(path) = &args.write_config {
        manager.save_to_file(path)?;
        log::info!("configuration written to {}", path.display());
        return Ok(());
    }

    let config = manager.config().clone();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        log::warn!("Ctrl-C handler not installed: {}", e);
    }

    if args.simulate {
        let target = Point2D::new(args.target_x, args.target_y);
        log::info!("simulating target at ({:.2}, {:.2}) cm", target.x, target.y);

        let mut gpio = MockGpio::realtime();
        for sensor in &config.sensors {
            let distance = target.distance_to(&sensor.geometry().position());
            gpio.attach_sensor(
                sensor.trigger_pin,
                sensor.echo_pin,
                EchoProfile::for_distance(distance, config.timing.speed_of_sound_cm_s),
            );
        }
        drive(gpio, &config, args, &running)
    } else {
        drive(SysfsGpio::with_root(&args.gpio_root), &config, args, &running)
    }
}

fn drive<G: GpioInterface>(
    mut io: G,
    config: &SystemConfig,
    args: &Args,
    running: &AtomicBool,
) -> Result<(), LocatorError> {
    // Reject coincident sensors before touching any pin
    config.trilaterator()?;

    if let Err(e) = configure_pins(&mut io, config) {
        // Pins exported before the failure still need unexporting
        let _ = release_pins(&mut io, config);
        return Err(e);
    }

    let store = match JsonLinesStore::open(&config.storage_path) {
        Ok(store) => store,
        Err(e) => {
            let _ = release_pins(&mut io, config);
            return Err(e.into());
        }
    };

    let display = if args.headless {
        Display::Log(LogDisplay::new())
    } else {
        Display::Canvas(DotCanvas::from_config(&config.canvas))
    };

    let mut locator = BlockingLocator::new(config, io, store, display)?;

    log::info!(
        "locating with baseline {:.2} cm, logging to {}",
        locator.trilaterator().baseline(),
        config.storage_path.display()
    );
    let outcome = locator.run(running, args.rounds);

    let stats = locator.stats().clone();
    let (mut io, _store, display) = locator.into_parts();
    let released = release_pins(&mut io, config);

    log::info!(
        "{} rounds, {} substituted readings, {} faults",
        stats.rounds,
        stats.substituted_readings,
        stats.faults
    );

    if let (Display::Canvas(canvas), Some(path)) = (&display, &args.canvas_out) {
        match canvas.save_pgm(path) {
            Ok(()) => log::info!("canvas written to {}", path.display()),
            Err(e) => log::error!("failed to write canvas to {}: {}", path.display(), e),
        }
    }

    outcome?;
    released
}
