//! Vibration test settings
//!
//! Settings are read from a key-value store owned by the host. The window
//! size is resolved once at startup; the sample period is re-read on every
//! tick so it can be changed while the task runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Default task period in milliseconds
pub const DEFAULT_SAMPLE_PERIOD_MS: u16 = 10;

/// Default FFT window size in samples
pub const DEFAULT_FFT_WINDOW_SIZE: u16 = 64;

/// Default bound on raw samples buffered between two ticks
pub const DEFAULT_MAX_SAMPLES_PER_TICK: usize = 1024;

/// Upper limit for `max_samples_per_tick`; keeps the per-tick count well
/// inside `u32`
pub const MAX_SAMPLES_PER_TICK: usize = 65_536;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Vibration test module is disabled in module settings")]
    ModuleDisabled,

    #[error("Unsupported FFT window size {0} (expected one of 16, 64, 256, 1024)")]
    UnsupportedWindowSize(u16),

    #[error("Sample buffer bound must be non-zero")]
    ZeroSampleBound,

    #[error("Sample buffer bound {0} exceeds the limit of 65536")]
    SampleBoundTooLarge(usize),

    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// FFT window sizes supported by the transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowSize {
    W16,
    W64,
    W256,
    W1024,
}

impl WindowSize {
    pub const ALL: [WindowSize; 4] = [
        WindowSize::W16,
        WindowSize::W64,
        WindowSize::W256,
        WindowSize::W1024,
    ];

    /// Number of samples per window
    pub fn samples(self) -> usize {
        match self {
            WindowSize::W16 => 16,
            WindowSize::W64 => 64,
            WindowSize::W256 => 256,
            WindowSize::W1024 => 1024,
        }
    }

    /// Number of published frequency bins (the lower half of the transform)
    pub fn num_bins(self) -> usize {
        self.samples() >> 1
    }

    /// Look up a window size by sample count
    pub fn from_samples(samples: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.samples() == samples)
    }

    /// Centre frequency of a bin in Hz for a given task period
    ///
    /// The sample rate is one averaged sample per tick, so bin `k` sits at
    /// `k * f_s / N` and the last published bin sits just below Nyquist.
    pub fn bin_frequency_hz(self, bin: usize, sample_period_ms: u16) -> f64 {
        let period_s = f64::from(sample_period_ms.max(1)) / 1000.0;
        bin as f64 / (period_s * self.samples() as f64)
    }
}

impl TryFrom<u16> for WindowSize {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_samples(usize::from(value)).ok_or(ConfigError::UnsupportedWindowSize(value))
    }
}

/// Enable state of an optional flight module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Enabled,
    #[default]
    Disabled,
}

/// Which optional modules the host should start
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    pub vibration_test: ModuleState,
}

/// Settings of the vibration test module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VibrationSettings {
    /// Task period in milliseconds (0 is treated as 1)
    pub sample_period_ms: u16,

    /// FFT window size, one of 16, 64, 256 or 1024
    pub fft_window_size: u16,

    /// Raw samples held between two ticks before new ones are dropped
    pub max_samples_per_tick: usize,
}

impl Default for VibrationSettings {
    fn default() -> Self {
        Self {
            sample_period_ms: DEFAULT_SAMPLE_PERIOD_MS,
            fft_window_size: DEFAULT_FFT_WINDOW_SIZE,
            max_samples_per_tick: DEFAULT_MAX_SAMPLES_PER_TICK,
        }
    }
}

/// Complete settings document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub module: ModuleSettings,
    pub vibration: VibrationSettings,
}

impl Settings {
    /// Parse settings from a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// Read access to the settings store
///
/// The task calls `sample_period_ms` on every tick, so implementations must
/// be cheap and must not block for long.
pub trait SettingsSource: Send + Sync {
    fn sample_period_ms(&self) -> u16;

    /// Raw window size value, validated by [`SettingsSource::resolve_window_size`]
    fn fft_window_size(&self) -> u16;

    fn max_samples_per_tick(&self) -> usize {
        DEFAULT_MAX_SAMPLES_PER_TICK
    }

    /// Task period, clamped so it is never zero
    fn sample_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.sample_period_ms().max(1)))
    }

    fn resolve_window_size(&self) -> Result<WindowSize, ConfigError> {
        WindowSize::try_from(self.fft_window_size())
    }
}

impl SettingsSource for VibrationSettings {
    fn sample_period_ms(&self) -> u16 {
        self.sample_period_ms
    }

    fn fft_window_size(&self) -> u16 {
        self.fft_window_size
    }

    fn max_samples_per_tick(&self) -> usize {
        self.max_samples_per_tick
    }
}

/// Settings handle shared between the host and the running task
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<VibrationSettings>>,
}

impl SharedSettings {
    pub fn new(settings: VibrationSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings
    pub fn get(&self) -> VibrationSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Modify the settings in place
    pub fn update(&self, f: impl FnOnce(&mut VibrationSettings)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    pub fn set_sample_period_ms(&self, period_ms: u16) {
        self.update(|s| s.sample_period_ms = period_ms);
    }
}

impl SettingsSource for SharedSettings {
    fn sample_period_ms(&self) -> u16 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sample_period_ms
    }

    fn fft_window_size(&self) -> u16 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fft_window_size
    }

    fn max_samples_per_tick(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .max_samples_per_tick
    }
}
