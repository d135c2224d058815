//! Simulated locator demonstration
//!
//! Drives the blocking locator over the mock GPIO backend: a clean round,
//! a round with an out-of-range echo, and a round with a silent sensor.

use ultrasonic_locator::api::{configure_pins, release_pins};
use ultrasonic_locator::hardware::{EchoProfile, MockGpio};
use ultrasonic_locator::{BlockingLocator, DotCanvas, MemoryStore, Point2D, SystemConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Ultrasonic Locator - Simulated Rounds ===\n");

    let config = SystemConfig::default();
    let speed = config.timing.speed_of_sound_cm_s;
    let target = Point2D::new(13.54, 13.54);

    let mut gpio = MockGpio::new();
    configure_pins(&mut gpio, &config)?;
    for sensor in &config.sensors {
        let distance = target.distance_to(&sensor.geometry().position());
        println!("{} sees the target at {:.2} cm", sensor.name, distance);
        gpio.attach_sensor(
            sensor.trigger_pin,
            sensor.echo_pin,
            EchoProfile::for_distance(distance, speed),
        );
    }

    let trigger_one = config.sensors[0].trigger_pin;
    let trigger_two = config.sensors[1].trigger_pin;
    gpio.queue_profile(trigger_one, EchoProfile::for_distance(15.0, speed));
    gpio.queue_profile(trigger_one, EchoProfile::for_distance(150.0, speed));
    gpio.queue_profile(trigger_two, EchoProfile::for_distance(15.0, speed));
    gpio.queue_profile(trigger_two, EchoProfile::for_distance(15.0, speed));
    gpio.queue_profile(trigger_two, EchoProfile::silent());

    let mut locator = BlockingLocator::new(
        &config,
        gpio,
        MemoryStore::new(),
        DotCanvas::from_config(&config.canvas),
    )?;

    for _ in 0..3 {
        let report = locator.run_round()?;
        let [first, second] = &report.readings;
        print!(
            "round {}: {:.2} cm ({:?}), {:.2} cm ({:?})",
            report.round,
            first.gated.distance_cm,
            first.gated.status,
            second.gated.distance_cm,
            second.gated.status
        );
        match report.intersection.point() {
            Some(point) => println!(" -> ({:.2}, {:.2})", point.x, point.y),
            None => println!(" -> no position"),
        }
    }

    println!("\nstats: {:?}", locator.stats());

    let (mut gpio, store, canvas) = locator.into_parts();
    release_pins(&mut gpio, &config)?;
    println!("{} records stored, {} dots drawn", store.records().len(), canvas.dots().len());

    Ok(())
}
