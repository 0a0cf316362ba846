use std::{fmt, future::Future, sync::Arc, time::Duration};

use tracing::trace;

use super::{
	error::{BuildError, WorkError},
	feedback::{FeedbackPolicy, FeedbackTiming},
	listener::TaskListener,
	rule::ExclusionRule,
	scheduler::Scheduler,
	spec::{DisplayHint, GroupKey, Priority, TaskSpec, TaskSpecId, Visibility},
	work::{BlockingWork, PlainWork, ProgressWork, TaskResult, Work},
};

/// Title used until [`TaskSpecBuilder::title`] is called.
pub const DEFAULT_TITLE: &str = "Operation in progress...";

/// Accumulates the configuration of a background task and freezes it into a [`TaskSpec`].
///
/// Every setter follows last-call-wins: calling one again replaces the previous value. That also
/// holds between [`exclusion_rule`](Self::exclusion_rule) and the `runs_not_concurrently*`
/// setters, which all write the same slot.
///
/// A builder is meant to be owned and configured by a single thread, it has no internal
/// synchronization. [`build`](Self::build) takes a snapshot, so the builder can keep being
/// configured and built again without touching specs it already produced. A failed setter call
/// leaves the builder unchanged.
///
/// ## Example
/// ```
/// use sd_task_builder::{TaskResult, TaskSpec};
///
/// # fn main() -> Result<(), sd_task_builder::BuildError> {
/// let spec = TaskSpec::builder()
/// 	.title("Sync")?
/// 	.work(|| async { Ok::<_, std::io::Error>(()) })
/// 	.runs_not_concurrently()
/// 	.immediate_feedback(|result: &TaskResult, _immediate| {
/// 		assert!(result.is_success());
/// 	})
/// 	.build()?;
///
/// assert_eq!(spec.exclusion_rule().map(|rule| rule.name()), Some("Sync"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TaskSpecBuilder {
	title: Arc<str>,
	priority: Priority,
	visibility: Visibility,
	group: Option<GroupKey>,
	exclusion_rule: Option<ExclusionRule>,
	work: Option<Work>,
	feedback: Option<FeedbackPolicy>,
	listener: Option<Arc<dyn TaskListener>>,
	display_hint: Option<DisplayHint>,
}

impl Default for TaskSpecBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl TaskSpecBuilder {
	#[must_use]
	pub fn new() -> Self {
		Self {
			title: Arc::from(DEFAULT_TITLE),
			priority: Priority::default(),
			visibility: Visibility::default(),
			group: None,
			exclusion_rule: None,
			work: None,
			feedback: None,
			listener: None,
			display_hint: None,
		}
	}

	/// Sets the title shown for the task, which must not be blank.
	///
	/// Work units set with [`work`](Self::work) or [`blocking_work`](Self::blocking_work) keep the
	/// title current at the time they were set as their fault label. A later
	/// [`runs_not_concurrently`](Self::runs_not_concurrently) uses the title current at that call.
	pub fn title(&mut self, title: impl Into<Arc<str>>) -> Result<&mut Self, BuildError> {
		let title = title.into();

		if title.trim().is_empty() {
			return Err(BuildError::InvalidArgument("task title is blank"));
		}

		self.title = title;
		Ok(self)
	}

	pub fn priority(&mut self, priority: Priority) -> &mut Self {
		self.priority = priority;
		self
	}

	pub fn interactive(&mut self) -> &mut Self {
		self.priority(Priority::Interactive)
	}

	/// The default priority.
	pub fn background(&mut self) -> &mut Self {
		self.priority(Priority::Background)
	}

	pub fn idle(&mut self) -> &mut Self {
		self.priority(Priority::Idle)
	}

	pub fn visibility(&mut self, visibility: Visibility) -> &mut Self {
		self.visibility = visibility;
		self
	}

	pub fn default_visibility(&mut self) -> &mut Self {
		self.visibility(Visibility::Default)
	}

	pub fn user_initiated(&mut self) -> &mut Self {
		self.visibility(Visibility::UserInitiated)
	}

	pub fn system(&mut self) -> &mut Self {
		self.visibility(Visibility::System)
	}

	/// Sets an async work unit without progress reporting.
	///
	/// Its progress is reported as indeterminate, it can't be cancelled once running, and any
	/// error or panic it raises becomes a failed [`TaskResult`].
	pub fn work<F, Fut, E>(&mut self, f: F) -> &mut Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), E>> + Send + 'static,
		E: Into<WorkError>,
	{
		self.work = Some(Work::Plain(PlainWork::new(Arc::clone(&self.title), f)));
		self
	}

	/// Same as [`work`](Self::work) but for a synchronous closure, run on a blocking thread.
	pub fn blocking_work<F, E>(&mut self, f: F) -> &mut Self
	where
		F: Fn() -> Result<(), E> + Send + Sync + 'static,
		E: Into<WorkError>,
	{
		self.work = Some(Work::Blocking(BlockingWork::new(Arc::clone(&self.title), f)));
		self
	}

	/// Sets a work unit that reports its own progress and honors cancellation.
	pub fn work_with_progress(&mut self, work: impl ProgressWork) -> &mut Self {
		self.work = Some(Work::ProgressAware(Arc::new(work)));
		self
	}

	/// Deferred feedback: delivered on completion if the observer is attached, otherwise on its
	/// next attach.
	pub fn feedback<F>(&mut self, callback: F) -> &mut Self
	where
		F: Fn(&TaskResult, bool) + Send + Sync + 'static,
	{
		self.set_feedback(FeedbackTiming::Deferred, None, callback)
	}

	/// Deferred feedback with the text shown to the observer for a withheld result.
	pub fn feedback_titled<F>(&mut self, completion_title: &str, callback: F) -> &mut Self
	where
		F: Fn(&TaskResult, bool) + Send + Sync + 'static,
	{
		self.set_feedback(FeedbackTiming::Deferred, Some(completion_title), callback)
	}

	/// Feedback delivered as soon as the task finishes, attached observer or not.
	pub fn immediate_feedback<F>(&mut self, callback: F) -> &mut Self
	where
		F: Fn(&TaskResult, bool) + Send + Sync + 'static,
	{
		self.set_feedback(FeedbackTiming::Immediate, None, callback)
	}

	pub fn immediate_feedback_titled<F>(&mut self, completion_title: &str, callback: F) -> &mut Self
	where
		F: Fn(&TaskResult, bool) + Send + Sync + 'static,
	{
		self.set_feedback(FeedbackTiming::Immediate, Some(completion_title), callback)
	}

	/// Sets an already built policy, for callbacks implementing [`Feedback`](crate::Feedback).
	pub fn feedback_policy(&mut self, policy: FeedbackPolicy) -> &mut Self {
		self.feedback = Some(policy);
		self
	}

	fn set_feedback<F>(
		&mut self,
		timing: FeedbackTiming,
		completion_title: Option<&str>,
		callback: F,
	) -> &mut Self
	where
		F: Fn(&TaskResult, bool) + Send + Sync + 'static,
	{
		self.feedback_policy(FeedbackPolicy::new(timing, completion_title, callback))
	}

	pub fn exclusion_rule(&mut self, rule: ExclusionRule) -> &mut Self {
		self.exclusion_rule = Some(rule);
		self
	}

	/// Serializes this task with every other task whose rule carries the current title.
	pub fn runs_not_concurrently(&mut self) -> &mut Self {
		self.exclusion_rule(ExclusionRule::from_checked(Arc::clone(&self.title)))
	}

	/// Serializes this task with every other task whose rule carries the given name.
	pub fn runs_not_concurrently_named(
		&mut self,
		name: impl Into<Arc<str>>,
	) -> Result<&mut Self, BuildError> {
		let rule = ExclusionRule::new(name)?;
		Ok(self.exclusion_rule(rule))
	}

	/// Groups related tasks so they can be found, cancelled or joined together. Defaults to the title.
	pub fn group(&mut self, group: impl Into<GroupKey>) -> &mut Self {
		self.group = Some(group.into());
		self
	}

	pub fn listener(&mut self, listener: impl TaskListener) -> &mut Self {
		self.listener = Some(Arc::new(listener));
		self
	}

	pub fn display_hint(&mut self, hint: impl Into<DisplayHint>) -> &mut Self {
		self.display_hint = Some(hint.into());
		self
	}

	/// Validates the configuration and freezes it into a new logical task.
	pub fn build(&self) -> Result<TaskSpec, BuildError> {
		let Some(work) = self.work.clone() else {
			return Err(BuildError::IllegalState("task work unit is not set"));
		};

		let spec = TaskSpec {
			id: TaskSpecId::new(),
			title: Arc::clone(&self.title),
			priority: self.priority,
			visibility: self.visibility,
			group: self
				.group
				.clone()
				.unwrap_or_else(|| GroupKey::from(Arc::clone(&self.title))),
			exclusion_rule: self.exclusion_rule.clone(),
			work,
			feedback: self.feedback.clone(),
			listener: self.listener.clone(),
			display_hint: self.display_hint.clone(),
		};

		trace!(task_id = %spec.id, title = %spec.title, "Built task spec");

		Ok(spec)
	}

	pub fn build_and_schedule<S: Scheduler>(&self, scheduler: &S) -> Result<S::Handle, BuildError> {
		self.build().map(|spec| scheduler.submit(spec))
	}

	/// Builds and submits with a delay, passed to the scheduler unchanged.
	pub fn build_and_schedule_with_delay<S: Scheduler>(
		&self,
		scheduler: &S,
		delay: Duration,
	) -> Result<S::Handle, BuildError> {
		self.build()
			.map(|spec| scheduler.submit_with_delay(spec, delay))
	}
}

impl fmt::Debug for TaskSpecBuilder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskSpecBuilder")
			.field("title", &self.title)
			.field("priority", &self.priority)
			.field("visibility", &self.visibility)
			.field("group", &self.group)
			.field("exclusion_rule", &self.exclusion_rule)
			.field("work", &self.work)
			.field("feedback", &self.feedback)
			.finish_non_exhaustive()
	}
}
