use std::{fmt, sync::Arc};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
	feedback::{Attachment, Observer},
	progress::{Progress, ProgressMonitor},
	spec::{TaskSpec, TaskSpecId, Visibility},
	work::TaskResult,
};

/// Where a logical task is in the [`LocalScheduler`](super::LocalScheduler) lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
	/// Waiting for its delay to elapse, a new submission restarts the delay.
	Sleeping,
	/// Waiting for its exclusion rule, a free slot or for non-idle tasks to finish.
	Waiting,
	Running,
	/// No longer tracked, submitting the spec again starts a new run.
	Finished,
}

#[derive(Debug, Clone)]
pub(super) struct HandleState {
	pub(super) status: TaskStatus,
	pub(super) last_result: Option<TaskResult>,
}

/// State of one tracked logical task, shared by the scheduler and every handle given for it.
pub(super) struct Shared {
	pub(super) spec: TaskSpec,
	pub(super) observer: Observer,
	pub(super) cancel: CancellationToken,
	progress_tx: Arc<watch::Sender<Progress>>,
	state_tx: watch::Sender<HandleState>,
}

impl Shared {
	pub(super) fn new(spec: TaskSpec) -> Self {
		let observer = Observer::new(if spec.visibility() == Visibility::UserInitiated {
			Attachment::Attached
		} else {
			Attachment::Detached
		});

		let (progress_tx, _) = watch::channel(Progress::Idle);
		let (state_tx, _) = watch::channel(HandleState {
			status: TaskStatus::Sleeping,
			last_result: None,
		});

		Self {
			spec,
			observer,
			cancel: CancellationToken::new(),
			progress_tx: Arc::new(progress_tx),
			state_tx,
		}
	}

	/// A fresh monitor for one run, reporting through the handles' progress channel.
	pub(super) fn monitor(&self) -> ProgressMonitor {
		ProgressMonitor::with_parts(
			Arc::clone(&self.spec.title),
			Arc::clone(&self.progress_tx),
			self.cancel.clone(),
		)
	}

	pub(super) fn set_status(&self, status: TaskStatus) {
		self.state_tx.send_modify(|state| state.status = status);
	}

	pub(super) fn set_result(&self, result: TaskResult) {
		self.state_tx
			.send_modify(|state| state.last_result = Some(result));
	}

	pub(super) fn finish(&self, result: TaskResult) {
		self.state_tx.send_modify(|state| {
			state.last_result = Some(result);
			state.status = TaskStatus::Finished;
		});
	}
}

/// Tracks a task submitted to a [`LocalScheduler`](super::LocalScheduler).
///
/// Every handle for the same logical task shares its state, so resubmitting a pending spec gives
/// back a handle equivalent to the first one.
#[derive(Clone)]
pub struct TaskHandle {
	shared: Arc<Shared>,
}

impl TaskHandle {
	pub(super) const fn new(shared: Arc<Shared>) -> Self {
		Self { shared }
	}

	#[must_use]
	pub fn id(&self) -> TaskSpecId {
		self.shared.spec.id()
	}

	#[must_use]
	pub fn spec(&self) -> &TaskSpec {
		&self.shared.spec
	}

	/// Attach/detach signal deciding when deferred feedback is delivered.
	///
	/// Starts attached for [`Visibility::UserInitiated`] tasks and detached for every other one.
	#[must_use]
	pub fn observer(&self) -> &Observer {
		&self.shared.observer
	}

	#[must_use]
	pub fn progress(&self) -> watch::Receiver<Progress> {
		self.shared.progress_tx.subscribe()
	}

	#[must_use]
	pub fn status(&self) -> TaskStatus {
		self.shared.state_tx.borrow().status
	}

	#[must_use]
	pub fn is_active(&self) -> bool {
		self.status() != TaskStatus::Finished
	}

	/// Result of the most recent run, `None` while the first one hasn't finished.
	#[must_use]
	pub fn last_result(&self) -> Option<TaskResult> {
		self.shared.state_tx.borrow().last_result.clone()
	}

	/// Requests cancellation.
	///
	/// A task that hasn't started finishes as cancelled without running. A running progress-aware
	/// task sees the request through its monitor, a running plain one runs to completion. Either way
	/// a pending reschedule is dropped.
	pub fn cancel(&self) {
		self.shared.cancel.cancel();
	}

	/// Waits until the task is no longer tracked and returns its last result.
	pub async fn join(&self) -> TaskResult {
		let mut state_rx = self.shared.state_tx.subscribe();

		// The sender lives as long as `self.shared`, so this can't fail
		let last_result = state_rx
			.wait_for(|state| state.status == TaskStatus::Finished)
			.await
			.ok()
			.and_then(|state| state.last_result.clone());

		last_result.unwrap_or_else(TaskResult::cancelled)
	}
}

impl fmt::Debug for TaskHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskHandle")
			.field("id", &self.id())
			.field("title", &self.shared.spec.title())
			.field("status", &self.status())
			.finish_non_exhaustive()
	}
}
