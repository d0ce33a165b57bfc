//! Per-axis complex sample windows
//!
//! Three windows (x, y, z) share one write cursor. Each debiased sample lands
//! in the real lane; the imaginary lane stays zero until the window is
//! transformed in place.

use num_complex::Complex;

use crate::config::WindowSize;

/// Accelerometer axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Fixed-size window set filled one tick at a time
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAssembler {
    size: WindowSize,

    /// One complex buffer per axis, allocated once
    buffers: [Vec<Complex<f32>>; 3],

    /// Next write position, in [0, size)
    cursor: usize,
}

impl WindowAssembler {
    pub fn new(size: WindowSize) -> Self {
        let zeroed = || vec![Complex::new(0.0, 0.0); size.samples()];
        Self {
            size,
            buffers: [zeroed(), zeroed(), zeroed()],
            cursor: 0,
        }
    }

    /// Write one debiased sample per axis and advance the cursor
    ///
    /// # Arguments
    /// * `values` - Debiased x, y and z for this tick
    ///
    /// # Returns
    /// `true` when the cursor wraps back to zero, i.e. all three windows are
    /// full and ready for the transform
    pub fn push(&mut self, values: [f32; 3]) -> bool {
        for (buffer, value) in self.buffers.iter_mut().zip(values) {
            buffer[self.cursor] = Complex::new(value, 0.0);
        }

        self.cursor += 1;
        if self.cursor >= self.size.samples() {
            self.cursor = 0;
            return true;
        }
        false
    }

    pub fn buffer(&self, axis: Axis) -> &[Complex<f32>] {
        &self.buffers[axis.index()]
    }

    /// Mutable window of one axis, transformed in place by the caller
    pub fn buffer_mut(&mut self, axis: Axis) -> &mut [Complex<f32>] {
        &mut self.buffers[axis.index()]
    }

    /// Zero both lanes of every window
    pub fn clear(&mut self) {
        for buffer in self.buffers.iter_mut() {
            buffer.fill(Complex::new(0.0, 0.0));
        }
    }

    pub fn is_clear(&self) -> bool {
        self.buffers
            .iter()
            .all(|b| b.iter().all(|c| c.re == 0.0 && c.im == 0.0))
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn window_size(&self) -> WindowSize {
        self.size
    }
}
