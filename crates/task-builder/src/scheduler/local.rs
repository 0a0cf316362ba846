use std::{
	collections::HashMap,
	fmt,
	panic::{catch_unwind, AssertUnwindSafe},
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	time::Duration,
};

use futures::future::pending;
use futures_concurrency::future::{Join, Race};
use tokio::{
	runtime::Handle,
	sync::{watch, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore},
	time::{sleep_until, Instant},
};
use tracing::{debug, error, instrument, trace, warn};

use super::{
	exclusion::ExclusionLocks,
	handle::{Shared, TaskHandle, TaskStatus},
	Scheduler,
};
use crate::{
	config::SchedulerConfig,
	error::SchedulerError,
	feedback::{DesignatedThread, FeedbackDispatcher, UiThread},
	listener::TaskEvent,
	spec::{Priority, TaskSpec, TaskSpecId},
	work::TaskResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
	Sleeping,
	Waiting,
	/// `rerun` holds the delay of the latest submission received while running.
	Running { rerun: Option<Duration> },
}

struct Entry {
	shared: Arc<Shared>,
	phase: Phase,
	deadline_tx: watch::Sender<Instant>,
}

struct Inner {
	runtime: Handle,
	config: SchedulerConfig,
	dispatcher: FeedbackDispatcher,
	exclusion: ExclusionLocks,
	slots: Option<Arc<Semaphore>>,
	tasks: Mutex<HashMap<TaskSpecId, Entry>>,
	/// Count of non-idle tasks currently waiting or running.
	non_idle_tx: watch::Sender<usize>,
}

/// A [`Scheduler`] running tasks on the ambient tokio runtime.
///
/// Each submitted logical task gets its own tokio task going through sleeping, waiting and
/// running. Waiting means, in this order: idle priority tasks wait for every non-idle task to be
/// done (when [`SchedulerConfig::defer_idle_tasks`] is set), then for the task's exclusion rule,
/// then for a free slot if [`SchedulerConfig::max_concurrent_tasks`] is set.
///
/// Submitting a spec that is already tracked doesn't start a second copy:
/// - while sleeping, its delay restarts from the new submission;
/// - while waiting, nothing changes;
/// - while running, one more run is recorded with the latest delay and starts after this one.
///
/// Feedback callbacks run on the designated thread given at creation.
#[derive(Clone)]
pub struct LocalScheduler {
	inner: Arc<Inner>,
}

impl LocalScheduler {
	/// Creates a scheduler with its own [`UiThread`] as designated feedback thread.
	///
	/// Must be called from within a tokio runtime.
	pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
		let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
		let thread = UiThread::spawn(config.feedback_thread_name.as_str())?;

		Ok(Self::from_parts(runtime, config, Arc::new(thread)))
	}

	/// Creates a scheduler delivering feedback through the given thread.
	pub fn with_thread(
		config: SchedulerConfig,
		thread: Arc<dyn DesignatedThread>,
	) -> Result<Self, SchedulerError> {
		let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

		Ok(Self::from_parts(runtime, config, thread))
	}

	fn from_parts(
		runtime: Handle,
		config: SchedulerConfig,
		thread: Arc<dyn DesignatedThread>,
	) -> Self {
		let (non_idle_tx, _) = watch::channel(0);

		Self {
			inner: Arc::new(Inner {
				runtime,
				slots: config
					.max_concurrent_tasks
					.map(|max| Arc::new(Semaphore::new(max.get()))),
				config,
				dispatcher: FeedbackDispatcher::new(thread),
				exclusion: ExclusionLocks::default(),
				tasks: Mutex::new(HashMap::new()),
				non_idle_tx,
			}),
		}
	}

	/// Handles of every tracked task in the group.
	#[must_use]
	pub fn find_group(&self, group: &str) -> Vec<TaskHandle> {
		self.inner
			.tasks()
			.values()
			.filter(|entry| entry.shared.spec.group().as_str() == group)
			.map(|entry| TaskHandle::new(Arc::clone(&entry.shared)))
			.collect()
	}

	/// Requests cancellation of every tracked task in the group, returning how many there were.
	pub fn cancel_group(&self, group: &str) -> usize {
		let handles = self.find_group(group);

		debug!(%group, count = handles.len(), "Cancelling task group");

		handles.iter().for_each(TaskHandle::cancel);

		handles.len()
	}

	/// Waits for every task tracked in the group at call time.
	pub async fn join_group(&self, group: &str) -> Vec<TaskResult> {
		let handles = self.find_group(group);

		handles
			.iter()
			.map(|handle| handle.join())
			.collect::<Vec<_>>()
			.join()
			.await
	}

	pub fn cancel_all(&self) {
		self.inner
			.tasks()
			.values()
			.for_each(|entry| entry.shared.cancel.cancel());
	}

	/// Number of logical tasks currently tracked, in any phase.
	#[must_use]
	pub fn tracked_tasks(&self) -> usize {
		self.inner.tasks().len()
	}
}

impl Scheduler for LocalScheduler {
	type Handle = TaskHandle;

	#[instrument(skip_all, fields(task_id = %spec.id(), title = %spec.title(), ?delay))]
	fn submit_with_delay(&self, spec: TaskSpec, delay: Duration) -> TaskHandle {
		enum Submission {
			New(Arc<Shared>, watch::Receiver<Instant>),
			Existing(Arc<Shared>, Option<TaskEvent>),
		}

		let submission = {
			let mut tasks = self.inner.tasks();

			if let Some(entry) = tasks.get_mut(&spec.id()) {
				let event = match &mut entry.phase {
					Phase::Sleeping => {
						entry.deadline_tx.send_replace(deadline_after(delay));
						trace!("Re-armed sleeping task");
						Some(TaskEvent::Rearmed { delay })
					}
					Phase::Waiting => {
						trace!("Task is already waiting to run, ignoring submission");
						None
					}
					Phase::Running { rerun } => {
						*rerun = Some(delay);
						trace!("Task is running, it will run again once finished");
						None
					}
				};

				Submission::Existing(Arc::clone(&entry.shared), event)
			} else {
				let id = spec.id();
				let shared = Arc::new(Shared::new(spec));
				let (deadline_tx, deadline_rx) = watch::channel(deadline_after(delay));

				tasks.insert(
					id,
					Entry {
						shared: Arc::clone(&shared),
						phase: Phase::Sleeping,
						deadline_tx,
					},
				);

				Submission::New(shared, deadline_rx)
			}
		};

		match submission {
			Submission::New(shared, deadline_rx) => {
				debug!("Scheduled new task");
				notify(&shared, &TaskEvent::Scheduled { delay });

				self.inner.runtime.spawn(drive(
					Arc::clone(&self.inner),
					Arc::clone(&shared),
					deadline_rx,
				));

				TaskHandle::new(shared)
			}

			Submission::Existing(shared, event) => {
				if let Some(event) = event {
					notify(&shared, &event);
				}

				TaskHandle::new(shared)
			}
		}
	}
}

impl fmt::Debug for LocalScheduler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LocalScheduler")
			.field("config", &self.inner.config)
			.field("tracked_tasks", &self.tracked_tasks())
			.finish_non_exhaustive()
	}
}

impl Inner {
	fn tasks(&self) -> MutexGuard<'_, HashMap<TaskSpecId, Entry>> {
		self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Moves a sleeping task to waiting, unless it was re-armed to a later deadline meanwhile.
	fn start_waiting(&self, shared: &Shared, deadline: Instant) -> bool {
		let mut tasks = self.tasks();

		if let Some(entry) = tasks.get_mut(&shared.spec.id()) {
			if *entry.deadline_tx.borrow() > deadline {
				return false;
			}

			entry.phase = Phase::Waiting;
		}

		shared.set_status(TaskStatus::Waiting);

		true
	}

	fn start_running(&self, shared: &Shared) {
		if let Some(entry) = self.tasks().get_mut(&shared.spec.id()) {
			entry.phase = Phase::Running { rerun: None };
		}

		shared.set_status(TaskStatus::Running);
	}

	/// Publishes the result of one run, returning the delay of the next run if one was requested.
	fn conclude(&self, shared: &Shared, result: TaskResult) -> Option<Duration> {
		let mut tasks = self.tasks();
		let id = shared.spec.id();

		let rerun = tasks.get_mut(&id).and_then(|entry| match entry.phase {
			Phase::Running { rerun: Some(delay) } if !shared.cancel.is_cancelled() => {
				entry.phase = Phase::Sleeping;
				entry.deadline_tx.send_replace(deadline_after(delay));
				Some(delay)
			}
			_ => None,
		});

		if rerun.is_some() {
			shared.set_result(result);
			shared.set_status(TaskStatus::Sleeping);
		} else {
			tasks.remove(&id);
			shared.finish(result);
		}

		rerun
	}
}

/// Keeps idle priority tasks waiting while alive.
struct NonIdleGuard<'a> {
	non_idle_tx: &'a watch::Sender<usize>,
}

impl<'a> NonIdleGuard<'a> {
	fn new(non_idle_tx: &'a watch::Sender<usize>) -> Self {
		non_idle_tx.send_modify(|count| *count += 1);

		Self { non_idle_tx }
	}
}

impl Drop for NonIdleGuard<'_> {
	fn drop(&mut self) {
		self.non_idle_tx
			.send_modify(|count| *count = count.saturating_sub(1));
	}
}

/// Everything a task holds while running, released on drop.
struct Admission<'a> {
	_non_idle: Option<NonIdleGuard<'a>>,
	_exclusion: Option<OwnedMutexGuard<()>>,
	_slot: Option<OwnedSemaphorePermit>,
}

#[instrument(
	name = "local_task",
	skip_all,
	fields(task_id = %shared.spec.id(), title = %shared.spec.title())
)]
async fn drive(inner: Arc<Inner>, shared: Arc<Shared>, mut deadline_rx: watch::Receiver<Instant>) {
	loop {
		let result = if sleep(&inner, &shared, &mut deadline_rx).await {
			notify(&shared, &TaskEvent::AboutToRun);

			if let Some(admission) = admit(&inner, &shared).await {
				run(&inner, &shared, admission).await
			} else {
				debug!("Task cancelled while waiting to run");
				TaskResult::cancelled()
			}
		} else {
			debug!("Task cancelled while sleeping");
			TaskResult::cancelled()
		};

		notify(&shared, &TaskEvent::Done(result.clone()));

		if let Some(policy) = shared.spec.feedback() {
			inner
				.dispatcher
				.complete(policy, result.clone(), &shared.observer);
		}

		let Some(delay) = inner.conclude(&shared, result) else {
			trace!("Task finished");
			break;
		};

		trace!(?delay, "Task rescheduled after running");
		notify(&shared, &TaskEvent::Scheduled { delay });
	}
}

/// Sleeps until the latest deadline, returning `false` if cancelled first.
async fn sleep(inner: &Inner, shared: &Shared, deadline_rx: &mut watch::Receiver<Instant>) -> bool {
	enum Wake {
		Elapsed(Instant),
		Rearmed,
		Cancelled,
	}

	loop {
		let deadline = *deadline_rx.borrow_and_update();

		let wake = (
			async {
				sleep_until(deadline).await;
				Wake::Elapsed(deadline)
			},
			async {
				if deadline_rx.changed().await.is_err() {
					// The entry is gone, only cancellation or the deadline can wake us now
					pending::<()>().await;
				}
				Wake::Rearmed
			},
			async {
				shared.cancel.cancelled().await;
				Wake::Cancelled
			},
		)
			.race()
			.await;

		match wake {
			Wake::Elapsed(deadline) => {
				if inner.start_waiting(shared, deadline) {
					return true;
				}
			}
			Wake::Rearmed => trace!("Delay restarted"),
			Wake::Cancelled => return false,
		}
	}
}

/// Waits for every admission gate, returning `None` if cancelled first.
async fn admit<'a>(inner: &'a Inner, shared: &Shared) -> Option<Admission<'a>> {
	enum Wait<'a> {
		Admitted(Admission<'a>),
		Cancelled,
	}

	match (
		async { Wait::Admitted(acquire(inner, &shared.spec).await) },
		async {
			shared.cancel.cancelled().await;
			Wait::Cancelled
		},
	)
		.race()
		.await
	{
		Wait::Admitted(admission) => Some(admission),
		Wait::Cancelled => None,
	}
}

async fn acquire<'a>(inner: &'a Inner, spec: &TaskSpec) -> Admission<'a> {
	let non_idle = if spec.priority() == Priority::Idle {
		if inner.config.defer_idle_tasks {
			trace!("Idle task waiting for other tasks to finish");

			if inner
				.non_idle_tx
				.subscribe()
				.wait_for(|count| *count == 0)
				.await
				.is_err()
			{
				warn!("Idle gate closed while waiting, running idle task anyway");
			}
		}

		None
	} else {
		Some(NonIdleGuard::new(&inner.non_idle_tx))
	};

	let exclusion = match spec.exclusion_rule() {
		Some(rule) => Some(inner.exclusion.acquire(rule).await),
		None => None,
	};

	let slot = match &inner.slots {
		Some(slots) => Arc::clone(slots).acquire_owned().await.ok(),
		None => None,
	};

	Admission {
		_non_idle: non_idle,
		_exclusion: exclusion,
		_slot: slot,
	}
}

async fn run(inner: &Inner, shared: &Shared, admission: Admission<'_>) -> TaskResult {
	inner.start_running(shared);
	notify(shared, &TaskEvent::Running);

	debug!("Running task");

	let result = shared.spec.work().execute(&shared.monitor()).await;

	drop(admission);

	result
}

fn deadline_after(delay: Duration) -> Instant {
	let now = Instant::now();

	// Roughly 30 years, same cap tokio applies to its own far future deadlines
	now.checked_add(delay)
		.unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

fn notify(shared: &Shared, event: &TaskEvent) {
	if let Some(listener) = shared.spec.listener() {
		if catch_unwind(AssertUnwindSafe(|| listener.on_event(&shared.spec, event))).is_err() {
			error!(?event, "Task listener panicked");
		}
	}
}
