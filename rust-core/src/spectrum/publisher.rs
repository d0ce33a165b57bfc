//! Spectrum output
//!
//! Magnitude bins are published to an external object store as one record
//! per frequency index. The store owns its instances; the publisher only
//! creates the extra ones at startup and then overwrites them in place.

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::WindowSize;
use crate::spectrum::window::Axis;

/// Magnitude of one frequency bin on each axis
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpectrumBin {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SpectrumBin {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn set(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }
}

/// Multi-instance object store receiving the spectrum
///
/// Writes are synchronous and must not block.
pub trait SpectrumStore: Send {
    /// Append one instance, returning its index, or `None` if refused
    fn create_instance(&mut self) -> Option<usize>;

    /// Overwrite instance `index`
    fn set_instance(&mut self, index: usize, bin: SpectrumBin);

    /// Number of live instances
    fn instance_count(&self) -> usize;
}

#[derive(Debug)]
struct StoreInner {
    instances: Vec<SpectrumBin>,
    max_instances: Option<usize>,
    revision: u64,
}

/// In-process spectrum store
///
/// Cloning gives another handle onto the same instances, so a reader can
/// observe what the task publishes.
#[derive(Debug, Clone)]
pub struct MemorySpectrumStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemorySpectrumStore {
    /// New store holding the single instance created by its initialisation
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Store that refuses to grow past `max_instances`
    pub fn with_max_instances(max_instances: usize) -> Self {
        Self::build(Some(max_instances.max(1)))
    }

    fn build(max_instances: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                instances: vec![SpectrumBin::default()],
                max_instances,
                revision: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of every instance
    pub fn snapshot(&self) -> Vec<SpectrumBin> {
        self.lock().instances.clone()
    }

    pub fn get(&self, index: usize) -> Option<SpectrumBin> {
        self.lock().instances.get(index).copied()
    }

    /// Drop instances beyond `len`, as a consumer shrinking capacity would
    pub fn truncate(&self, len: usize) {
        self.lock().instances.truncate(len);
    }

    /// Number of writes accepted so far
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }
}

impl Default for MemorySpectrumStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumStore for MemorySpectrumStore {
    fn create_instance(&mut self) -> Option<usize> {
        let mut inner = self.lock();
        if inner
            .max_instances
            .is_some_and(|max| inner.instances.len() >= max)
        {
            return None;
        }
        inner.instances.push(SpectrumBin::default());
        Some(inner.instances.len() - 1)
    }

    fn set_instance(&mut self, index: usize, bin: SpectrumBin) {
        let mut inner = self.lock();
        if let Some(slot) = inner.instances.get_mut(index) {
            *slot = bin;
            inner.revision += 1;
        }
    }

    fn instance_count(&self) -> usize {
        self.lock().instances.len()
    }
}

/// Writes completed spectra into a [`SpectrumStore`]
pub struct SpectrumPublisher<S: SpectrumStore> {
    store: S,

    /// Latest magnitudes per bin; an axis that failed to transform keeps its
    /// previous values
    bins: Vec<SpectrumBin>,
}

impl<S: SpectrumStore> SpectrumPublisher<S> {
    /// Wrap `store` and create one instance per bin
    ///
    /// The store already holds its first instance, so `num_bins - 1` more are
    /// requested.
    ///
    /// # Arguments
    /// * `store` - Destination store, holding its first instance already
    /// * `size` - Window size; the spectrum has `size.num_bins()` bins
    pub fn new(mut store: S, size: WindowSize) -> Self {
        let num_bins = size.num_bins();
        let mut refused = 0usize;
        for _ in 1..num_bins {
            if store.create_instance().is_none() {
                refused += 1;
            }
        }
        if refused > 0 {
            tracing::warn!(
                "Spectrum store refused {} of {} instances, upper bins will not be published",
                refused,
                num_bins - 1
            );
        }

        Self {
            store,
            bins: vec![SpectrumBin::default(); num_bins],
        }
    }

    /// Replace one axis of every bin with fresh magnitudes
    pub fn update_axis(&mut self, axis: Axis, magnitudes: &[f32]) {
        for (bin, &mag) in self.bins.iter_mut().zip(magnitudes) {
            bin.set(axis, mag);
        }
    }

    /// Write one bin, skipping indices the store has no instance for
    ///
    /// # Arguments
    /// * `index` - Bin index, also the store instance index
    /// * `bin` - Magnitudes of the three axes
    ///
    /// # Returns
    /// Whether the write happened
    pub fn publish(&mut self, index: usize, bin: SpectrumBin) -> bool {
        if index >= self.store.instance_count() {
            return false;
        }
        self.store.set_instance(index, bin);
        true
    }

    /// Write every bin
    ///
    /// # Returns
    /// How many bins were skipped for lack of instances
    pub fn publish_all(&mut self) -> usize {
        let mut skipped = 0;
        for index in 0..self.bins.len() {
            let bin = self.bins[index];
            if !self.publish(index, bin) {
                skipped += 1;
            }
        }
        if skipped > 0 {
            tracing::debug!("Skipped {} spectrum bins with no live instance", skipped);
        }
        skipped
    }

    /// Latest spectrum, whether or not every bin reached the store
    pub fn bins(&self) -> &[SpectrumBin] {
        &self.bins
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
