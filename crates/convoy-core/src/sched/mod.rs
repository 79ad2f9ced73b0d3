//! Concurrency primitives: logical-order labelling and fan-out execution.
//!
//! Provides:
//! - [`SchedulingContext`]: a parent-linked node capturing where, in program
//!   order, a concurrent unit of work was spawned
//! - [`Usher`]: fan-out executor that collects results in registration order
//! - [`replay`]: offline re-sorting of captured logs into logical order

pub mod context;
pub mod replay;
pub mod usher;

pub use context::SchedulingContext;
pub use replay::{reorder, LogRecord};
pub use usher::Usher;
