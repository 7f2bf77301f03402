#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Incremental stability scheduling for placed pieces.
//!
//! [`StabilityOptimizer`] sits in front of the structural validator. It keeps
//! a bounded, time-stamped cache of per-piece stability values and a
//! five-tier queue of pieces awaiting recomputation, which is drained once
//! per frame within a wall-clock budget. [`ZonedStabilityOptimizer`] adds a
//! coarse zone grid so only work near the player is drained eagerly.

mod cache;
mod optimizer;
mod queue;
mod zones;

pub use optimizer::{OptimizerStats, ProcessReport, StabilityOptimizer};
pub use zones::{ZoneStats, ZonedStabilityOptimizer};
