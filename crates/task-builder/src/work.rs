use std::{fmt, future::Future, panic::AssertUnwindSafe, pin::Pin, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::spawn_blocking;
use tracing::{instrument, trace, warn};

use super::{
	error::{TaskFault, WorkError},
	progress::ProgressMonitor,
};

type BoxWorkFuture = Pin<Box<dyn Future<Output = Result<(), WorkError>> + Send>>;
type PlainFn = dyn Fn() -> BoxWorkFuture + Send + Sync;
type BlockingFn = dyn Fn() -> Result<(), WorkError> + Send + Sync;

/// How a single execution of a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Success,
	Failure,
	Cancelled,
}

/// The uniform value every work unit is turned into once it finishes.
#[derive(Debug, Clone)]
pub struct TaskResult {
	outcome: Outcome,
	fault: Option<TaskFault>,
}

impl TaskResult {
	#[must_use]
	pub const fn success() -> Self {
		Self {
			outcome: Outcome::Success,
			fault: None,
		}
	}

	#[must_use]
	pub const fn cancelled() -> Self {
		Self {
			outcome: Outcome::Cancelled,
			fault: None,
		}
	}

	#[must_use]
	pub const fn failure(fault: TaskFault) -> Self {
		Self {
			outcome: Outcome::Failure,
			fault: Some(fault),
		}
	}

	#[must_use]
	pub const fn outcome(&self) -> Outcome {
		self.outcome
	}

	#[must_use]
	pub const fn fault(&self) -> Option<&TaskFault> {
		self.fault.as_ref()
	}

	#[must_use]
	pub fn is_success(&self) -> bool {
		self.outcome == Outcome::Success
	}
}

/// What a progress-aware work unit reports back when it stops without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
	Done,
	Canceled,
}

/// A work unit that reports fine-grained progress and cooperates with cancellation.
///
/// We're using the [`async_trait`](https://docs.rs/async-trait) crate so the work unit can be
/// stored as a trait object inside a [`TaskSpec`](crate::TaskSpec).
#[async_trait]
pub trait ProgressWork: Send + Sync + 'static {
	/// Runs the work unit once. Cancellation checks and progress reports are up to the
	/// implementation, through the given [`ProgressMonitor`].
	async fn run(&self, monitor: &ProgressMonitor) -> Result<ExecStatus, WorkError>;
}

/// An async closure without any progress reporting, labeled with the title it was configured under.
#[derive(Clone)]
pub struct PlainWork {
	label: Arc<str>,
	f: Arc<PlainFn>,
}

impl PlainWork {
	pub fn new<F, Fut, E>(label: impl Into<Arc<str>>, f: F) -> Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), E>> + Send + 'static,
		E: Into<WorkError>,
	{
		Self {
			label: label.into(),
			f: Arc::new(move || -> BoxWorkFuture {
				let fut = f();
				Box::pin(async move { fut.await.map_err(Into::into) })
			}),
		}
	}

	#[must_use]
	pub fn label(&self) -> &str {
		&self.label
	}
}

/// A synchronous closure without any progress reporting, run on tokio's blocking thread pool.
#[derive(Clone)]
pub struct BlockingWork {
	label: Arc<str>,
	f: Arc<BlockingFn>,
}

impl BlockingWork {
	pub fn new<F, E>(label: impl Into<Arc<str>>, f: F) -> Self
	where
		F: Fn() -> Result<(), E> + Send + Sync + 'static,
		E: Into<WorkError>,
	{
		Self {
			label: label.into(),
			f: Arc::new(move || f().map_err(Into::into)),
		}
	}

	#[must_use]
	pub fn label(&self) -> &str {
		&self.label
	}
}

/// The work unit of a task, normalized so every kind of closure ends in a [`TaskResult`].
///
/// Plain and blocking work units report indeterminate progress and are not cancellable, they
/// always run to completion. Progress-aware ones get the monitor as is and their status is passed
/// through. Errors and panics from any variant become a [`Outcome::Failure`] carrying a
/// [`TaskFault`], they never escape to the worker running the task.
#[derive(Clone)]
pub enum Work {
	Plain(PlainWork),
	Blocking(BlockingWork),
	ProgressAware(Arc<dyn ProgressWork>),
}

impl Work {
	#[instrument(name = "task_work", skip_all, fields(task = %monitor.title()))]
	pub async fn execute(&self, monitor: &ProgressMonitor) -> TaskResult {
		let result = match self {
			Self::Plain(plain) => {
				monitor.indeterminate(&*plain.label);

				// The closure itself may panic before handing out its future
				match AssertUnwindSafe(async { (plain.f)().await })
					.catch_unwind()
					.await
				{
					Ok(Ok(())) => TaskResult::success(),
					Ok(Err(e)) => {
						TaskResult::failure(TaskFault::from_error(Arc::clone(&plain.label), e))
					}
					Err(payload) => TaskResult::failure(TaskFault::from_panic(
						Arc::clone(&plain.label),
						&*payload,
					)),
				}
			}

			Self::Blocking(blocking) => {
				monitor.indeterminate(&*blocking.label);

				let f = Arc::clone(&blocking.f);

				match spawn_blocking(move || f()).await {
					Ok(Ok(())) => TaskResult::success(),
					Ok(Err(e)) => {
						TaskResult::failure(TaskFault::from_error(Arc::clone(&blocking.label), e))
					}
					Err(join_error) => match join_error.try_into_panic() {
						Ok(payload) => TaskResult::failure(TaskFault::from_panic(
							Arc::clone(&blocking.label),
							&*payload,
						)),
						Err(e) => {
							warn!(?e, "Blocking work unit was aborted by the runtime");
							TaskResult::failure(TaskFault::unknown(Arc::clone(&blocking.label)))
						}
					},
				}
			}

			Self::ProgressAware(work) => {
				match AssertUnwindSafe(async { work.run(monitor).await })
					.catch_unwind()
					.await
				{
					Ok(Ok(ExecStatus::Done)) => TaskResult::success(),
					Ok(Ok(ExecStatus::Canceled)) => TaskResult::cancelled(),
					Ok(Err(e)) => {
						TaskResult::failure(TaskFault::from_error(monitor.title_arc(), e))
					}
					Err(payload) => {
						TaskResult::failure(TaskFault::from_panic(monitor.title_arc(), &*payload))
					}
				}
			}
		};

		monitor.done();

		trace!(outcome = ?result.outcome(), "Work unit finished");

		result
	}
}

impl fmt::Debug for Work {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Plain(plain) => write!(f, "Work::Plain<label='{}'>", plain.label),
			Self::Blocking(blocking) => write!(f, "Work::Blocking<label='{}'>", blocking.label),
			Self::ProgressAware(_) => write!(f, "Work::ProgressAware"),
		}
	}
}
