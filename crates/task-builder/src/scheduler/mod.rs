//! The seam between built task specs and whatever engine runs them.
//!
//! Building a [`TaskSpec`] schedules nothing. Callers hand it to a [`Scheduler`], which owns
//! worker threads, ordering, delays and exclusion. [`LocalScheduler`] is a tokio based
//! implementation for callers without an engine of their own.

use std::time::Duration;

use super::spec::TaskSpec;

mod exclusion;
mod handle;
mod local;

pub use handle::{TaskHandle, TaskStatus};
pub use local::LocalScheduler;

pub trait Scheduler {
	/// Whatever the engine gives back to track a submitted task.
	type Handle;

	fn submit(&self, spec: TaskSpec) -> Self::Handle {
		self.submit_with_delay(spec, Duration::ZERO)
	}

	/// Submits the task to start after `delay`.
	///
	/// Submitting a clone of a spec that is still tracked doesn't create a second task, the
	/// engine decides how the new delay applies to the pending one.
	fn submit_with_delay(&self, spec: TaskSpec, delay: Duration) -> Self::Handle;
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
	type Handle = S::Handle;

	fn submit(&self, spec: TaskSpec) -> Self::Handle {
		(**self).submit(spec)
	}

	fn submit_with_delay(&self, spec: TaskSpec, delay: Duration) -> Self::Handle {
		(**self).submit_with_delay(spec, delay)
	}
}
