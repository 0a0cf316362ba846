use std::{fmt, sync::Arc, time::Duration};

use uuid::Uuid;

use super::{
	builder::TaskSpecBuilder,
	feedback::FeedbackPolicy,
	listener::TaskListener,
	rule::ExclusionRule,
	scheduler::Scheduler,
	work::Work,
};

/// Identifies a logical task: every clone of a [`TaskSpec`] shares it, every `build` makes a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskSpecId(Uuid);

impl TaskSpecId {
	pub(crate) fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl fmt::Display for TaskSpecId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Scheduling hint telling which tasks should preferably be dispatched first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Priority {
	/// Short tasks someone is actively waiting on.
	Interactive,
	#[default]
	Background,
	/// Runs after every other background task is done.
	Idle,
}

impl Priority {
	/// Lower ranks are preferred for earlier dispatch.
	#[must_use]
	pub const fn rank(self) -> u8 {
		match self {
			Self::Interactive => 0,
			Self::Background => 1,
			Self::Idle => 2,
		}
	}
}

/// How prominently a task should be shown to the user while it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
	/// Shown in progress listings, without stealing focus.
	#[default]
	Default,
	/// Started on explicit user request, watched in the foreground until sent to the background.
	UserInitiated,
	/// Internal housekeeping, hidden from progress listings.
	System,
}

/// Key used to find, cancel or join related tasks together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(Arc<str>);

impl GroupKey {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for GroupKey {
	fn from(key: &str) -> Self {
		Self(key.into())
	}
}

impl From<String> for GroupKey {
	fn from(key: String) -> Self {
		Self(key.into())
	}
}

impl From<Arc<str>> for GroupKey {
	fn from(key: Arc<str>) -> Self {
		Self(key)
	}
}

impl fmt::Display for GroupKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Reference to an icon or image representing the task in a UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayHint(Arc<str>);

impl DisplayHint {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for DisplayHint {
	fn from(hint: &str) -> Self {
		Self(hint.into())
	}
}

impl From<String> for DisplayHint {
	fn from(hint: String) -> Self {
		Self(hint.into())
	}
}

impl From<Arc<str>> for DisplayHint {
	fn from(hint: Arc<str>) -> Self {
		Self(hint)
	}
}

/// An immutable description of a background task, ready to be handed to a [`Scheduler`].
///
/// Built with [`TaskSpec::builder`]. Cloning is cheap and clones describe the same logical task,
/// which schedulers rely on to re-arm a pending task instead of running it twice.
#[derive(Clone)]
pub struct TaskSpec {
	pub(crate) id: TaskSpecId,
	pub(crate) title: Arc<str>,
	pub(crate) priority: Priority,
	pub(crate) visibility: Visibility,
	pub(crate) group: GroupKey,
	pub(crate) exclusion_rule: Option<ExclusionRule>,
	pub(crate) work: Work,
	pub(crate) feedback: Option<FeedbackPolicy>,
	pub(crate) listener: Option<Arc<dyn TaskListener>>,
	pub(crate) display_hint: Option<DisplayHint>,
}

impl TaskSpec {
	#[must_use]
	pub fn builder() -> TaskSpecBuilder {
		TaskSpecBuilder::new()
	}

	#[must_use]
	pub const fn id(&self) -> TaskSpecId {
		self.id
	}

	#[must_use]
	pub fn title(&self) -> &str {
		&self.title
	}

	#[must_use]
	pub const fn priority(&self) -> Priority {
		self.priority
	}

	#[must_use]
	pub const fn visibility(&self) -> Visibility {
		self.visibility
	}

	/// The explicit group key, or the title when none was set.
	#[must_use]
	pub const fn group(&self) -> &GroupKey {
		&self.group
	}

	#[must_use]
	pub const fn exclusion_rule(&self) -> Option<&ExclusionRule> {
		self.exclusion_rule.as_ref()
	}

	#[must_use]
	pub const fn work(&self) -> &Work {
		&self.work
	}

	#[must_use]
	pub const fn feedback(&self) -> Option<&FeedbackPolicy> {
		self.feedback.as_ref()
	}

	#[must_use]
	pub fn listener(&self) -> Option<&dyn TaskListener> {
		self.listener.as_deref()
	}

	#[must_use]
	pub const fn display_hint(&self) -> Option<&DisplayHint> {
		self.display_hint.as_ref()
	}

	/// Whether both tasks hold exclusion rules with the same name, and so must never run together.
	#[must_use]
	pub fn conflicts_with(&self, other: &Self) -> bool {
		match (&self.exclusion_rule, &other.exclusion_rule) {
			(Some(rule), Some(other_rule)) => rule.is_conflicting(other_rule),
			_ => false,
		}
	}

	pub fn schedule<S: Scheduler>(&self, scheduler: &S) -> S::Handle {
		scheduler.submit(self.clone())
	}

	/// The delay is passed to the scheduler unchanged.
	pub fn schedule_with_delay<S: Scheduler>(&self, scheduler: &S, delay: Duration) -> S::Handle {
		scheduler.submit_with_delay(self.clone(), delay)
	}
}

impl fmt::Debug for TaskSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskSpec")
			.field("id", &self.id)
			.field("title", &self.title)
			.field("priority", &self.priority)
			.field("visibility", &self.visibility)
			.field("group", &self.group)
			.field("exclusion_rule", &self.exclusion_rule)
			.field("work", &self.work)
			.field("feedback", &self.feedback)
			.field("has_listener", &self.listener.is_some())
			.field("display_hint", &self.display_hint)
			.finish()
	}
}
