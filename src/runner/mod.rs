//! Query runners: background workers that turn the text the user is typing
//! into results pushed to a [`ResultSender`](crate::result_queue::ResultSender).

mod catalog;
mod compound;
mod pacing;

pub use catalog::CatalogRunner;
pub use compound::CompoundRunner;
pub use pacing::Pacing;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies the runner that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunnerId(pub u64);

impl RunnerId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RunnerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RunnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runner#{}", self.0)
    }
}

/// What the user interface drives while the user types.
///
/// None of these calls wait for results; results arrive through the
/// result queue the runner was created with.
pub trait QueryRunner: Send {
    /// Get ready to serve queries (open connections and so on).
    fn start(&mut self);

    /// Replace the current query. A query still running for older text is
    /// abandoned. Empty text means no query.
    fn set_query(&mut self, query: &str);

    /// The user is waiting for more: spend extra effort on the current query.
    fn consolidate(&mut self);

    /// Drop the current query and release connections until the next `start`.
    fn stop(&mut self);

    /// Stop and free everything; returns once background threads are gone.
    /// Calling it again does nothing.
    fn release(&mut self);
}
