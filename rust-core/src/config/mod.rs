//! Module settings and startup configuration resolution

pub mod settings;

pub use settings::{
    ConfigError, ModuleSettings, ModuleState, Settings, SettingsSource, SharedSettings,
    VibrationSettings, WindowSize, MAX_SAMPLES_PER_TICK,
};
