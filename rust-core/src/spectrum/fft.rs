//! In-place complex FFT with magnitude reduction
//!
//! Each axis window is transformed where it lies, then reduced to the
//! magnitude of its lower half. The input of a real-valued signal gives a
//! symmetric spectrum, so the upper half is never read.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use thiserror::Error;

use crate::config::WindowSize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Unsupported transform size {0}")]
    UnsupportedSize(usize),

    #[error("Window holds {actual} samples, transform expects {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("Magnitude buffer holds {actual} bins, transform produces {expected}")]
    OutputLength { expected: usize, actual: usize },
}

/// Forward FFT context sized to one window
pub struct SpectralTransform {
    /// Window size
    size: WindowSize,

    /// Forward FFT plan
    fft: Arc<dyn Fft<f32>>,

    /// Reusable scratch so the task never allocates per window
    scratch: Vec<Complex<f32>>,
}

impl SpectralTransform {
    /// Build a transform context for `samples` points
    ///
    /// Only the enumerated window sizes are accepted.
    ///
    /// # Arguments
    /// * `samples` - Points per window (16, 64, 256 or 1024)
    ///
    /// # Returns
    /// The planned context, or `TransformError::UnsupportedSize`
    pub fn new(samples: usize) -> Result<Self, TransformError> {
        let size = WindowSize::from_samples(samples).ok_or(TransformError::UnsupportedSize(samples))?;
        Ok(Self::for_window(size))
    }

    /// Build a transform context for a resolved window size
    ///
    /// # Arguments
    /// * `size` - Window size from the settings
    pub fn for_window(size: WindowSize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size.samples());
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self { size, fft, scratch }
    }

    /// Transform `buffer` in place and write |X[k]| for k in [0, N/2)
    ///
    /// On success `buffer` holds the complex spectrum; the time-domain input
    /// is gone. On error neither buffer is touched.
    ///
    /// # Arguments
    /// * `buffer` - One full window of `fft_size` complex samples
    /// * `magnitudes` - Output of exactly `num_bins` values
    ///
    /// # Returns
    /// `TransformError` when either slice has the wrong length
    pub fn transform(
        &mut self,
        buffer: &mut [Complex<f32>],
        magnitudes: &mut [f32],
    ) -> Result<(), TransformError> {
        let expected = self.size.samples();
        if buffer.len() != expected {
            return Err(TransformError::BufferLength {
                expected,
                actual: buffer.len(),
            });
        }
        if magnitudes.len() != self.size.num_bins() {
            return Err(TransformError::OutputLength {
                expected: self.size.num_bins(),
                actual: magnitudes.len(),
            });
        }

        self.fft.process_with_scratch(buffer, &mut self.scratch);

        for (mag, c) in magnitudes.iter_mut().zip(buffer.iter()) {
            *mag = c.norm();
        }

        Ok(())
    }

    /// Number of points per window
    pub fn fft_size(&self) -> usize {
        self.size.samples()
    }

    /// Number of magnitude bins produced (fft_size / 2)
    pub fn num_bins(&self) -> usize {
        self.size.num_bins()
    }

    pub fn window_size(&self) -> WindowSize {
        self.size
    }
}
