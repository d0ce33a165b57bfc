//! Vibration test simulation
//!
//! Runs the vibration test module against a synthetic accelerometer:
//! gravity on z plus a sinusoidal vibration on x and y. Usage:
//!
//! ```text
//! vibration-sim [settings.toml] [vibration_hz]
//! ```

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;
use vibration_analysis::spectrum::Axis;
use vibration_analysis::{
    MemorySpectrumStore, ModuleState, Settings, SettingsSource, SharedSettings, VibrationTest,
};

/// Driver sample interval (1 kHz accelerometer)
const DRIVER_INTERVAL: Duration = Duration::from_millis(1);

/// How long the simulation runs
const RUN_TIME: Duration = Duration::from_secs(5);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let mut settings = match args.next() {
        Some(path) => Settings::load(path)?,
        None => {
            let mut s = Settings::default();
            s.module.vibration_test = ModuleState::Enabled;
            s
        }
    };
    let vibration_hz: f32 = match args.next() {
        Some(hz) => hz.parse()?,
        None => 12.5,
    };
    if settings.module.vibration_test != ModuleState::Enabled {
        tracing::warn!("Module disabled in settings, enabling it for the simulation");
        settings.module.vibration_test = ModuleState::Enabled;
    }

    let shared = SharedSettings::new(settings.vibration.clone());
    let store = MemorySpectrumStore::new();
    let reader = store.clone();

    let (mut module, mut producer) = VibrationTest::start(&settings.module, shared.clone(), store)?;

    let driving = Arc::new(AtomicBool::new(true));
    let driver_flag = Arc::clone(&driving);
    let driver = std::thread::spawn(move || {
        let start = Instant::now();
        while driver_flag.load(Ordering::Relaxed) {
            let t = start.elapsed().as_secs_f32();
            let v = 0.5 * (2.0 * PI * vibration_hz * t).sin();
            producer.add_sample(v, 0.5 * v, 9.81);
            std::thread::sleep(DRIVER_INTERVAL);
        }
    });

    std::thread::sleep(RUN_TIME);
    driving.store(false, Ordering::Relaxed);
    if driver.join().is_err() {
        tracing::error!("Driver thread panicked");
    }
    module.stop();

    tracing::info!(
        "{} ticks ({} idle), {} windows, {} samples dropped",
        module.ticks(),
        module.idle_ticks(),
        module.completed_windows(),
        module.dropped_samples()
    );

    let window = module.window_size();
    let period_ms = shared.sample_period_ms();
    let spectrum = reader.snapshot();
    for axis in Axis::ALL {
        let peak = spectrum
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|(_, a), (_, b)| a.get(axis).total_cmp(&b.get(axis)));
        if let Some((bin, value)) = peak {
            tracing::info!(
                "{:?}: peak bin {} ({:.2} Hz), magnitude {:.3}",
                axis,
                bin,
                window.bin_frequency_hz(bin, period_ms),
                value.get(axis)
            );
        }
    }

    Ok(())
}
