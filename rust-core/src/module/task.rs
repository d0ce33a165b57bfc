//! Vibration test module lifecycle
//!
//! Resolves settings, allocates the accumulator and analysis buffers, and
//! runs the periodic analysis task on its own thread until stopped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use thiserror::Error;

use super::pipeline::{TickOutcome, VibrationAnalyzer};
use crate::config::{ConfigError, ModuleSettings, ModuleState, SettingsSource, WindowSize};
use crate::sensor::{SampleAccumulator, SampleConsumer, SampleProducer};
use crate::spectrum::SpectrumStore;

/// Name of the task thread
pub const TASK_NAME: &str = "VibrationTest";

/// Stack budget left unused in the worst case
pub const STACK_HEADROOM_BYTES: usize = 200;

/// Fixed task frame size
pub const STACK_FRAME_BYTES: usize = 460;

/// Stack cost per window sample
pub const STACK_BYTES_PER_SAMPLE: usize = 26;

/// Minimum stack for a hosted thread running the task
pub const HOST_STACK_FLOOR_BYTES: usize = 256 * 1024;

/// Stack size of the task thread for a given window size
pub fn task_stack_bytes(size: WindowSize) -> usize {
    HOST_STACK_FLOOR_BYTES
        + STACK_HEADROOM_BYTES
        + STACK_FRAME_BYTES
        + STACK_BYTES_PER_SAMPLE * size.samples()
}

#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Vibration test disabled: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn vibration test task: {0}")]
    Spawn(std::io::Error),
}

/// Counters the host can poll while the task runs
#[derive(Debug, Default)]
struct TaskStats {
    ticks: AtomicU64,
    idle_ticks: AtomicU64,
    completed_windows: AtomicU64,
}

/// Running vibration test module
pub struct VibrationTest {
    window_size: WindowSize,
    running: Arc<AtomicBool>,
    stats: Arc<TaskStats>,
    dropped: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl VibrationTest {
    /// Check the module is enabled and resolve its window size
    ///
    /// An error means the module must report itself disabled and must not
    /// start its task.
    pub fn initialize(
        module: &ModuleSettings,
        settings: &dyn SettingsSource,
    ) -> Result<WindowSize, ConfigError> {
        if module.vibration_test != ModuleState::Enabled {
            return Err(ConfigError::ModuleDisabled);
        }
        settings.resolve_window_size()
    }

    /// Initialise and start the module
    ///
    /// # Arguments
    /// * `module` - Module enable switches
    /// * `settings` - Settings source, re-read for the period on every tick
    /// * `store` - Spectrum store the task publishes into
    ///
    /// # Returns
    /// The module handle and the producer the sensor driver feeds with
    /// accelerometer readings
    pub fn start<C, S>(
        module: &ModuleSettings,
        settings: C,
        store: S,
    ) -> Result<(Self, SampleProducer), ModuleError>
    where
        C: SettingsSource + 'static,
        S: SpectrumStore + 'static,
    {
        let window_size = match Self::initialize(module, &settings) {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!("Vibration test not started: {}", e);
                return Err(e.into());
            }
        };

        let (producer, consumer) =
            SampleAccumulator::new(settings.max_samples_per_tick())?.split();

        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(TaskStats::default());
        let dropped = consumer.dropped_counter();
        let stack_bytes = task_stack_bytes(window_size);

        // The store is only touched once the task runs, so a failed spawn
        // leaves it without extra instances
        let task = AnalysisTask {
            settings,
            consumer,
            store,
            window_size,
            running: Arc::clone(&running),
            stats: Arc::clone(&stats),
        };

        let handle = std::thread::Builder::new()
            .name(TASK_NAME.to_string())
            .stack_size(stack_bytes)
            .spawn(move || task.run())
            .map_err(ModuleError::Spawn)?;

        tracing::info!(
            "Vibration test started (window {} samples, stack {} bytes)",
            window_size.samples(),
            stack_bytes
        );

        Ok((
            Self {
                window_size,
                running,
                stats,
                dropped,
                handle: Some(handle),
            },
            producer,
        ))
    }

    /// Stop the task and wait for it to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::error!("Vibration test task panicked");
            }
            tracing::info!(
                "Vibration test stopped after {} windows",
                self.completed_windows()
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn window_size(&self) -> WindowSize {
        self.window_size
    }

    /// Ticks executed, idle ones included
    pub fn ticks(&self) -> u64 {
        self.stats.ticks.load(Ordering::Relaxed)
    }

    /// Ticks skipped because no samples arrived
    pub fn idle_ticks(&self) -> u64 {
        self.stats.idle_ticks.load(Ordering::Relaxed)
    }

    /// Windows transformed and published
    pub fn completed_windows(&self) -> u64 {
        self.stats.completed_windows.load(Ordering::Relaxed)
    }

    /// Readings dropped because the accumulator was full
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for VibrationTest {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State handed to the task thread
struct AnalysisTask<C, S: SpectrumStore> {
    settings: C,
    consumer: SampleConsumer,
    store: S,
    window_size: WindowSize,
    running: Arc<AtomicBool>,
    stats: Arc<TaskStats>,
}

impl<C: SettingsSource, S: SpectrumStore> AnalysisTask<C, S> {
    fn run(self) {
        let AnalysisTask {
            settings,
            mut consumer,
            store,
            window_size,
            running,
            stats,
        } = self;

        // Output instances are created here, on the task thread
        let mut analyzer = VibrationAnalyzer::new(window_size, store);
        let mut last_wake = Instant::now();
        let mut reported_drops = 0u64;

        loop {
            // Period is re-read every tick so it can change at runtime
            let deadline = last_wake + settings.sample_period();
            if !delay_until(deadline, &running) {
                break;
            }
            last_wake = deadline;

            let snapshot = consumer.drain();

            let dropped = consumer.dropped();
            if dropped > reported_drops {
                tracing::warn!(
                    "Dropped {} accelerometer samples (accumulator bound {})",
                    dropped - reported_drops,
                    consumer.capacity()
                );
                reported_drops = dropped;
            }

            stats.ticks.fetch_add(1, Ordering::Relaxed);
            match analyzer.tick(&snapshot) {
                TickOutcome::Idle => {
                    stats.idle_ticks.fetch_add(1, Ordering::Relaxed);
                }
                TickOutcome::Sampled => {}
                TickOutcome::Published { .. } => {
                    stats.completed_windows.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

/// Sleep until `deadline`; returns false if asked to stop meanwhile
fn delay_until(deadline: Instant, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::park_timeout(deadline - now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SharedSettings, VibrationSettings};
    use crate::spectrum::MemorySpectrumStore;
    use std::time::Duration;

    fn enabled() -> ModuleSettings {
        ModuleSettings {
            vibration_test: ModuleState::Enabled,
        }
    }

    fn settings(period_ms: u16, window: u16) -> VibrationSettings {
        VibrationSettings {
            sample_period_ms: period_ms,
            fft_window_size: window,
            ..Default::default()
        }
    }

    #[test]
    fn test_stack_size_scales_with_window() {
        assert_eq!(
            task_stack_bytes(WindowSize::W16) - HOST_STACK_FLOOR_BYTES,
            200 + 460 + 26 * 16
        );
        assert_eq!(
            task_stack_bytes(WindowSize::W1024) - HOST_STACK_FLOOR_BYTES,
            200 + 460 + 26 * 1024
        );
    }

    #[test]
    fn test_disabled_module_does_not_start() {
        let result = VibrationTest::start(
            &ModuleSettings::default(),
            settings(1, 64),
            MemorySpectrumStore::new(),
        );
        assert!(matches!(
            result,
            Err(ModuleError::Config(ConfigError::ModuleDisabled))
        ));
    }

    #[test]
    fn test_bad_window_size_does_not_start() {
        let store = MemorySpectrumStore::new();
        let reader = store.clone();

        let result = VibrationTest::start(&enabled(), settings(1, 100), store);

        assert!(matches!(
            result,
            Err(ModuleError::Config(ConfigError::UnsupportedWindowSize(100)))
        ));
        // No output instances were created
        assert_eq!(reader.snapshot().len(), 1);
    }

    #[test]
    fn test_zero_sample_bound_does_not_start() {
        let bad = VibrationSettings {
            max_samples_per_tick: 0,
            ..settings(1, 16)
        };
        let result = VibrationTest::start(&enabled(), bad, MemorySpectrumStore::new());
        assert!(matches!(
            result,
            Err(ModuleError::Config(ConfigError::ZeroSampleBound))
        ));
    }

    #[test]
    fn test_huge_sample_bound_does_not_start() {
        let store = MemorySpectrumStore::new();
        let reader = store.clone();
        let huge = VibrationSettings {
            max_samples_per_tick: usize::MAX,
            ..settings(1, 16)
        };

        let result = VibrationTest::start(&enabled(), huge, store);

        assert!(matches!(
            result,
            Err(ModuleError::Config(ConfigError::SampleBoundTooLarge(usize::MAX)))
        ));
        assert_eq!(reader.snapshot().len(), 1);
    }

    #[test]
    fn test_task_creates_output_instances() {
        let store = MemorySpectrumStore::new();
        let reader = store.clone();

        let (_module, _producer) =
            VibrationTest::start(&enabled(), settings(1, 64), store).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while reader.snapshot().len() < 32 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(reader.snapshot().len(), 32);
    }

    #[test]
    fn test_task_runs_and_stops() {
        let store = MemorySpectrumStore::new();
        let reader = store.clone();

        let (mut module, mut producer) =
            VibrationTest::start(&enabled(), settings(1, 16), store).unwrap();
        assert!(module.is_running());
        assert_eq!(module.window_size(), WindowSize::W16);

        let deadline = Instant::now() + Duration::from_secs(10);
        while module.completed_windows() < 2 && Instant::now() < deadline {
            producer.add_sample(0.0, 0.0, 9.81);
            std::thread::sleep(Duration::from_micros(200));
        }

        assert!(module.completed_windows() >= 2);
        assert!(reader.revision() >= 16);

        module.stop();
        assert!(!module.is_running());

        let ticks = module.ticks();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(module.ticks(), ticks);
    }

    #[test]
    fn test_idle_task_counts_idle_ticks() {
        let (module, _producer) =
            VibrationTest::start(&enabled(), settings(1, 16), MemorySpectrumStore::new()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while module.idle_ticks() < 5 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }

        assert!(module.idle_ticks() >= 5);
        assert_eq!(module.completed_windows(), 0);
    }

    #[test]
    fn test_stop_is_prompt_with_long_period() {
        let shared = SharedSettings::new(settings(1, 16));
        let (mut module, _producer) =
            VibrationTest::start(&enabled(), shared.clone(), MemorySpectrumStore::new()).unwrap();

        // Hot reload to a very long period, then stop mid-sleep
        shared.set_sample_period_ms(60_000);
        std::thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        module.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_flooding_producer_drops_samples() {
        let bounded = VibrationSettings {
            max_samples_per_tick: 8,
            ..settings(50, 16)
        };
        let (module, mut producer) =
            VibrationTest::start(&enabled(), bounded, MemorySpectrumStore::new()).unwrap();

        for _ in 0..1000 {
            producer.add_sample(0.0, 0.0, 9.81);
        }

        assert!(module.dropped_samples() > 0);
        assert_eq!(module.dropped_samples(), producer.dropped());
    }
}
