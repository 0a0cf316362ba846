use std::num::NonZeroUsize;

use serde::Deserialize;

/// Settings for a [`LocalScheduler`](crate::LocalScheduler), every field is optional when
/// deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
	/// Name of the designated thread spawned for feedback callbacks.
	pub feedback_thread_name: String,
	/// Cap on simultaneously running tasks, unbounded when `None`.
	pub max_concurrent_tasks: Option<NonZeroUsize>,
	/// Hold idle priority tasks until no other task is waiting or running.
	pub defer_idle_tasks: bool,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			feedback_thread_name: "sd-task-feedback".to_string(),
			max_concurrent_tasks: None,
			defer_idle_tasks: true,
		}
	}
}
