//! Vibration test module: periodic analysis task and its lifecycle

pub mod pipeline;
pub mod task;

pub use pipeline::{TickOutcome, VibrationAnalyzer};
pub use task::{task_stack_bytes, ModuleError, VibrationTest};
