//! Seed-deterministic, parallel data augmentation for training pipelines.
//!
//! A [Generator] runs a chain of [Operator]s on every sample and groups the
//! results into [Batch]es. Each sample is processed with its own random
//! generator seeded by the scheduler, so a flow with a fixed seed produces
//! the same batches on every run regardless of the worker count.

mod common;

pub mod batch;
pub mod cache;
pub mod config;
pub mod context;
pub mod dataset;
pub mod generator;
pub mod mixup;
pub mod ndimage;
pub mod operator;
pub mod processor;
pub mod profiling;
mod schedule;
pub mod sequence;
pub mod value;

pub use batch::*;
pub use cache::*;
pub use config::*;
pub use context::*;
pub use dataset::*;
pub use generator::*;
pub use mixup::*;
pub use operator::*;
pub use processor::*;
pub use profiling::*;
pub use sequence::*;
pub use value::*;
