//! Eviction policy.
//!
//! - [`ClockReplacer`] - CLOCK (second chance), the pool's only policy

mod clock;

pub use clock::ClockReplacer;
