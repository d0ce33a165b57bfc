//! Accelerometer sample intake and static bias removal

pub mod accumulator;
pub mod bias;

pub use accumulator::{AccumulatorSnapshot, RawSample, SampleAccumulator, SampleConsumer, SampleProducer};
pub use bias::BiasTracker;
