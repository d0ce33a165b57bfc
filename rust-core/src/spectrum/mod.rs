//! Windowing, spectral transform and spectrum publication

pub mod fft;
pub mod window;
pub mod publisher;

pub use fft::{SpectralTransform, TransformError};
pub use window::{Axis, WindowAssembler};
pub use publisher::{MemorySpectrumStore, SpectrumBin, SpectrumPublisher, SpectrumStore};
