//! Per-tick vibration analysis
//!
//! One call to [`VibrationAnalyzer::tick`] runs one pass of the periodic
//! task on a drained accumulator snapshot:
//!
//! ```text
//! no samples        -> Idle (nothing touched)
//! samples           -> update bias, write debiased average, advance cursor
//! window completed  -> transform each axis, publish, clear windows
//! ```

use crate::config::WindowSize;
use crate::sensor::{AccumulatorSnapshot, BiasTracker};
use crate::spectrum::{
    Axis, SpectralTransform, SpectrumBin, SpectrumPublisher, SpectrumStore, TransformError,
    WindowAssembler,
};

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No samples since the last tick; state untouched
    Idle,

    /// One sample written into the windows
    Sampled,

    /// A window completed and its spectrum was published
    Published {
        /// Axes whose spectrum was not refreshed this cycle
        failed_axes: usize,

        /// Bins with no live store instance
        skipped_bins: usize,
    },
}

/// Bias removal, windowing, transform and publication for one sensor
pub struct VibrationAnalyzer<S: SpectrumStore> {
    size: WindowSize,
    bias: BiasTracker,
    window: WindowAssembler,

    /// Transform context, built on first use and rebuilt after a failed init
    transform: Option<SpectralTransform>,

    /// Point count requested when (re)building the transform context
    transform_samples: usize,

    /// Magnitude scratch, one window's worth of bins
    magnitudes: Vec<f32>,

    publisher: SpectrumPublisher<S>,
    completed_windows: u64,
}

impl<S: SpectrumStore> VibrationAnalyzer<S> {
    /// Allocate every buffer for `size` and create the output instances
    pub fn new(size: WindowSize, store: S) -> Self {
        Self::with_transform_samples(size, store, size.samples())
    }

    pub(crate) fn with_transform_samples(size: WindowSize, store: S, transform_samples: usize) -> Self {
        let transform = SpectralTransform::new(transform_samples).ok();
        Self {
            size,
            bias: BiasTracker::new(),
            window: WindowAssembler::new(size),
            transform,
            transform_samples,
            magnitudes: vec![0.0; size.num_bins()],
            publisher: SpectrumPublisher::new(store, size),
            completed_windows: 0,
        }
    }

    /// Run one tick on the samples drained since the previous one
    pub fn tick(&mut self, snapshot: &AccumulatorSnapshot) -> TickOutcome {
        let Some(avg) = snapshot.average() else {
            tracing::trace!("No accelerometer samples this tick");
            return TickOutcome::Idle;
        };

        self.bias.update(avg);
        let debiased = self.bias.remove(avg);

        if !self.window.push(debiased) {
            return TickOutcome::Sampled;
        }

        self.process_window()
    }

    fn process_window(&mut self) -> TickOutcome {
        let mut failed_axes = 0;

        for axis in Axis::ALL {
            match self.transform_axis(axis) {
                Ok(()) => self.publisher.update_axis(axis, &self.magnitudes),
                Err(e) => {
                    failed_axes += 1;
                    tracing::warn!("Skipping {:?} axis spectrum this cycle: {}", axis, e);
                }
            }
        }

        let skipped_bins = self.publisher.publish_all();
        self.window.clear();
        self.completed_windows += 1;

        tracing::debug!(
            "Window {} published ({} samples, {} axes stale)",
            self.completed_windows,
            self.size.samples(),
            failed_axes
        );

        TickOutcome::Published {
            failed_axes,
            skipped_bins,
        }
    }

    fn transform_axis(&mut self, axis: Axis) -> Result<(), TransformError> {
        let transform = match self.transform.take() {
            Some(t) => t,
            None => SpectralTransform::new(self.transform_samples)?,
        };
        self.transform
            .insert(transform)
            .transform(self.window.buffer_mut(axis), &mut self.magnitudes)
    }

    pub fn window_size(&self) -> WindowSize {
        self.size
    }

    pub fn bias(&self) -> [f32; 3] {
        self.bias.bias()
    }

    pub fn window(&self) -> &WindowAssembler {
        &self.window
    }

    /// Latest spectrum held by the publisher
    pub fn spectrum(&self) -> &[SpectrumBin] {
        self.publisher.bins()
    }

    pub fn store(&self) -> &S {
        self.publisher.store()
    }

    /// Windows transformed and published since start
    pub fn completed_windows(&self) -> u64 {
        self.completed_windows
    }
}
