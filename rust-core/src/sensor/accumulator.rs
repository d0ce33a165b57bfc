//! Lock-free accelerometer sample accumulator
//!
//! The sensor driver pushes raw samples from its own context while the
//! periodic task drains and averages them. The hand-off is a single-producer
//! single-consumer ring, so the producer never blocks and the consumer always
//! sees whole samples.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::{ConfigError, MAX_SAMPLES_PER_TICK};

/// One accelerometer reading in m/s²
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RawSample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Sums and count of the samples drained in one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccumulatorSnapshot {
    pub sum: [f64; 3],
    pub count: u32,
}

impl AccumulatorSnapshot {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Per-axis mean, or `None` when no samples arrived
    pub fn average(&self) -> Option<[f32; 3]> {
        if self.count == 0 {
            return None;
        }
        let n = f64::from(self.count);
        Some(self.sum.map(|s| (s / n) as f32))
    }
}

/// Bounded accumulator shared by the sensor driver and the periodic task
pub struct SampleAccumulator {
    producer: HeapProducer<RawSample>,
    consumer: HeapConsumer<RawSample>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl SampleAccumulator {
    /// Create an accumulator holding at most `capacity` samples between ticks
    ///
    /// # Arguments
    /// * `capacity` - Bound on buffered readings, 1 to `MAX_SAMPLES_PER_TICK`
    ///
    /// # Returns
    /// The accumulator, or a configuration error for an out-of-range bound
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroSampleBound);
        }
        if capacity > MAX_SAMPLES_PER_TICK {
            return Err(ConfigError::SampleBoundTooLarge(capacity));
        }
        let rb = HeapRb::<RawSample>::new(capacity);
        let (producer, consumer) = rb.split();

        Ok(Self {
            producer,
            consumer,
            dropped: Arc::new(AtomicU64::new(0)),
            capacity,
        })
    }

    /// Split into the driver-side and task-side ends
    pub fn split(self) -> (SampleProducer, SampleConsumer) {
        (
            SampleProducer {
                producer: self.producer,
                dropped: Arc::clone(&self.dropped),
            },
            SampleConsumer {
                consumer: self.consumer,
                dropped: self.dropped,
                capacity: self.capacity,
            },
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Driver end of the accumulator
pub struct SampleProducer {
    producer: HeapProducer<RawSample>,
    dropped: Arc<AtomicU64>,
}

impl SampleProducer {
    /// Add one reading
    ///
    /// Never blocks. When the task has not drained the previous batch yet and
    /// the bound is reached, the reading is dropped and counted.
    pub fn add_sample(&mut self, x: f32, y: f32, z: f32) {
        if self.producer.push(RawSample::new(x, y, z)).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn free_len(&self) -> usize {
        self.producer.free_len()
    }

    /// Total readings dropped since start
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Task end of the accumulator
pub struct SampleConsumer {
    consumer: HeapConsumer<RawSample>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl SampleConsumer {
    /// Drain every sample present at call time into a snapshot
    ///
    /// Samples pushed while draining are left for the next tick.
    ///
    /// # Returns
    /// Per-axis sums and the number of readings drained (zero when idle)
    pub fn drain(&mut self) -> AccumulatorSnapshot {
        let available = self.consumer.len();
        let mut snapshot = AccumulatorSnapshot::default();

        for _ in 0..available {
            let Some(sample) = self.consumer.pop() else {
                break;
            };
            for (sum, value) in snapshot.sum.iter_mut().zip(sample.to_array()) {
                *sum += f64::from(value);
            }
            snapshot.count += 1;
        }

        snapshot
    }

    /// Samples waiting for the next drain
    pub fn pending(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Total readings dropped since start
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Shared handle to the dropped-sample counter
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            SampleAccumulator::new(0),
            Err(ConfigError::ZeroSampleBound)
        ));
    }

    #[test]
    fn test_bound_limits() {
        let largest = SampleAccumulator::new(MAX_SAMPLES_PER_TICK).unwrap();
        assert_eq!(largest.capacity(), MAX_SAMPLES_PER_TICK);

        assert!(matches!(
            SampleAccumulator::new(MAX_SAMPLES_PER_TICK + 1),
            Err(ConfigError::SampleBoundTooLarge(n)) if n == MAX_SAMPLES_PER_TICK + 1
        ));
        assert!(matches!(
            SampleAccumulator::new(usize::MAX),
            Err(ConfigError::SampleBoundTooLarge(_))
        ));
    }

    #[test]
    fn test_drain_averages_and_resets() {
        let (mut producer, mut consumer) = SampleAccumulator::new(16).unwrap().split();
        assert_eq!(consumer.capacity(), 16);

        producer.add_sample(1.0, 2.0, 9.0);
        producer.add_sample(3.0, 4.0, 11.0);
        assert_eq!(consumer.pending(), 2);

        let snapshot = consumer.drain();
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.average(), Some([2.0, 3.0, 10.0]));

        // Drained samples are gone
        assert!(consumer.is_empty());
        assert_eq!(consumer.pending(), 0);
        assert!(consumer.drain().is_empty());
        assert_eq!(consumer.drain().average(), None);
    }

    #[test]
    fn test_overflow_drops_instead_of_blocking() {
        let (mut producer, mut consumer) = SampleAccumulator::new(4).unwrap().split();

        for i in 0..10 {
            producer.add_sample(i as f32, 0.0, 0.0);
        }

        assert_eq!(producer.dropped(), 6);
        assert_eq!(consumer.dropped(), 6);

        // The first four readings survive
        let snapshot = consumer.drain();
        assert_eq!(snapshot.count, 4);
        assert_eq!(snapshot.sum[0], 0.0 + 1.0 + 2.0 + 3.0);

        // Space is available again after the drain
        assert_eq!(producer.free_len(), 4);
    }

    #[test]
    fn test_concurrent_producer_never_corrupts_sums() {
        let (mut producer, mut consumer) = SampleAccumulator::new(64).unwrap().split();
        const TOTAL: u64 = 20_000;

        let handle = std::thread::spawn(move || {
            for _ in 0..TOTAL {
                producer.add_sample(1.0, 2.0, 3.0);
            }
            producer
        });

        let mut received = 0u64;
        loop {
            let snapshot = consumer.drain();
            if let Some(avg) = snapshot.average() {
                // Every sample is identical, so any torn read would show here
                assert_eq!(avg, [1.0, 2.0, 3.0]);
            }
            received += u64::from(snapshot.count);
            if handle.is_finished() && consumer.is_empty() {
                break;
            }
            std::thread::yield_now();
        }

        let producer = handle.join().unwrap();
        received += u64::from(consumer.drain().count);
        assert_eq!(received + producer.dropped(), TOTAL);
    }
}
