//! Completion feedback delivered on a single designated thread.
//!
//! A [`FeedbackPolicy`] pairs a user callback with a [`FeedbackTiming`]:
//! - [`FeedbackTiming::Immediate`] fires as soon as the task finishes, with `immediate = true`;
//! - [`FeedbackTiming::Deferred`] fires right away only if the [`Observer`] is attached when the
//!   task finishes. Otherwise the result is withheld until the observer attaches again, and the
//!   callback then gets `immediate = false`. An observer that never comes back means the callback
//!   is never called.
//!
//! The callback always runs through a [`DesignatedThread`], never on the worker that ran the task.

use std::{fmt, sync::Arc};

use super::work::TaskResult;

mod dispatch;
mod observer;
mod state;
mod thread;

pub use dispatch::FeedbackDispatcher;
pub use observer::{Attachment, Observer};
pub use state::{Delivery, FeedbackState};
pub use thread::{DesignatedThread, FeedbackJob, UiThread};

/// User code giving feedback about a finished task, runs on the designated thread.
pub trait Feedback: Send + Sync + 'static {
	/// `immediate` is `false` only when delivery was postponed until the observer came back.
	fn perform(&self, result: &TaskResult, immediate: bool);
}

impl<F> Feedback for F
where
	F: Fn(&TaskResult, bool) + Send + Sync + 'static,
{
	fn perform(&self, result: &TaskResult, immediate: bool) {
		self(result, immediate);
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTiming {
	Immediate,
	Deferred,
}

#[derive(Clone)]
pub struct FeedbackPolicy {
	callback: Arc<dyn Feedback>,
	timing: FeedbackTiming,
	completion_title: Option<Arc<str>>,
}

impl FeedbackPolicy {
	/// A blank completion title is the same as none, the task title is shown instead.
	pub fn new(
		timing: FeedbackTiming,
		completion_title: Option<&str>,
		callback: impl Feedback,
	) -> Self {
		Self {
			callback: Arc::new(callback),
			timing,
			completion_title: completion_title
				.filter(|title| !title.trim().is_empty())
				.map(Arc::from),
		}
	}

	#[must_use]
	pub const fn timing(&self) -> FeedbackTiming {
		self.timing
	}

	#[must_use]
	pub fn completion_title(&self) -> Option<&str> {
		self.completion_title.as_deref()
	}

	/// Text shown to the observer for a withheld result.
	#[must_use]
	pub fn completion_title_or<'a>(&'a self, task_title: &'a str) -> &'a str {
		self.completion_title().unwrap_or(task_title)
	}

	pub(crate) fn perform(&self, result: &TaskResult, immediate: bool) {
		self.callback.perform(result, immediate);
	}
}

impl fmt::Debug for FeedbackPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FeedbackPolicy")
			.field("timing", &self.timing)
			.field("completion_title", &self.completion_title)
			.finish_non_exhaustive()
	}
}
