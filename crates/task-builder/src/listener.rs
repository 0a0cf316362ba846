use std::time::Duration;

use super::{spec::TaskSpec, work::TaskResult};

/// Lifecycle notifications a scheduler sends to the listener attached to a [`TaskSpec`].
#[derive(Debug, Clone)]
pub enum TaskEvent {
	/// The task was handed to the scheduler and will start after `delay`.
	Scheduled { delay: Duration },
	/// The task was submitted again while still sleeping, its delay restarted.
	Rearmed { delay: Duration },
	/// The delay elapsed, the task is now waiting for its exclusion rule and a free slot.
	AboutToRun,
	Running,
	Done(TaskResult),
}

/// Receives [`TaskEvent`]s from the worker side, so implementations must not block for long.
pub trait TaskListener: Send + Sync + 'static {
	fn on_event(&self, spec: &TaskSpec, event: &TaskEvent);
}

impl<F> TaskListener for F
where
	F: Fn(&TaskSpec, &TaskEvent) + Send + Sync + 'static,
{
	fn on_event(&self, spec: &TaskSpec, event: &TaskEvent) {
		self(spec, event);
	}
}
