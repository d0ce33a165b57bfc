//! Vibration Analysis Core - Accelerometer Spectrum Engine
//! 
//! Periodic vibration analysis for a flight controller: raw accelerometer
//! samples are averaged per tick, stripped of their static (gravity) bias,
//! collected into fixed-size windows and turned into per-axis magnitude
//! spectra that are published to an external object store.

pub mod config;
pub mod sensor;
pub mod spectrum;
pub mod module;


pub use config::{ModuleSettings, ModuleState, Settings, SettingsSource, SharedSettings, VibrationSettings, WindowSize};
pub use module::{ModuleError, TickOutcome, VibrationAnalyzer, VibrationTest};
pub use sensor::{RawSample, SampleProducer};
pub use spectrum::{MemorySpectrumStore, SpectrumBin, SpectrumStore};
