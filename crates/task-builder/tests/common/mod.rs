#![allow(dead_code)]

use sd_task_builder::{
	ExecStatus, Outcome, ProgressMonitor, ProgressWork, TaskEvent, TaskHandle, TaskResult, TaskSpec,
	TaskStatus, WorkError,
};

use std::{
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex,
	},
	thread::{self, ThreadId},
	time::Duration,
};

use async_channel as chan;
use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::info;

pub const PATIENCE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SampleError {
	#[error("sample failure: {0}")]
	Failed(&'static str),
}

pub async fn wait_for_status(handle: &TaskHandle, status: TaskStatus) {
	timeout(PATIENCE, async {
		while handle.status() != status {
			sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.unwrap_or_else(|_| panic!("task never reached {status:?}, still {:?}", handle.status()));
}

/// What a feedback callback saw when it was called.
#[derive(Debug, Clone)]
pub struct FeedbackCall {
	pub outcome: Outcome,
	pub has_fault: bool,
	pub immediate: bool,
	pub thread_id: ThreadId,
}

#[derive(Debug, Clone)]
pub struct FeedbackProbe {
	calls_tx: chan::Sender<FeedbackCall>,
	calls_rx: chan::Receiver<FeedbackCall>,
}

impl FeedbackProbe {
	pub fn new() -> Self {
		let (calls_tx, calls_rx) = chan::unbounded();
		Self { calls_tx, calls_rx }
	}

	pub fn callback(&self) -> impl Fn(&TaskResult, bool) + Send + Sync + 'static {
		let calls_tx = self.calls_tx.clone();

		move |result: &TaskResult, immediate: bool| {
			calls_tx
				.try_send(FeedbackCall {
					outcome: result.outcome(),
					has_fault: result.fault().is_some(),
					immediate,
					thread_id: thread::current().id(),
				})
				.unwrap();
		}
	}

	pub async fn next_call(&self) -> FeedbackCall {
		timeout(PATIENCE, self.calls_rx.recv())
			.await
			.expect("feedback was never delivered")
			.unwrap()
	}

	/// Checks nothing was delivered within a short grace period.
	pub async fn assert_silent(&self) {
		sleep(Duration::from_millis(100)).await;
		assert!(self.calls_rx.is_empty(), "unexpected feedback call");
	}

	pub fn calls(&self) -> usize {
		self.calls_rx.len()
	}
}

/// Tracks how many work units run at the same time.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
	current: Arc<AtomicUsize>,
	max: Arc<AtomicUsize>,
	runs: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
	pub async fn hold(&self, duration: Duration) {
		let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
		self.max.fetch_max(now, Ordering::SeqCst);

		sleep(duration).await;

		self.current.fetch_sub(1, Ordering::SeqCst);
		self.runs.fetch_add(1, Ordering::SeqCst);
	}

	pub fn max(&self) -> usize {
		self.max.load(Ordering::SeqCst)
	}

	pub fn runs(&self) -> usize {
		self.runs.load(Ordering::SeqCst)
	}

	pub fn current(&self) -> usize {
		self.current.load(Ordering::SeqCst)
	}
}

/// Records every lifecycle event by name.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
	events: Arc<Mutex<Vec<&'static str>>>,
}

impl EventLog {
	pub fn listener(&self) -> impl Fn(&TaskSpec, &TaskEvent) + Send + Sync + 'static {
		let events = Arc::clone(&self.events);

		move |_: &TaskSpec, event: &TaskEvent| {
			events.lock().unwrap().push(match event {
				TaskEvent::Scheduled { .. } => "scheduled",
				TaskEvent::Rearmed { .. } => "rearmed",
				TaskEvent::AboutToRun => "about_to_run",
				TaskEvent::Running => "running",
				TaskEvent::Done(_) => "done",
			});
		}
	}

	pub fn events(&self) -> Vec<&'static str> {
		self.events.lock().unwrap().clone()
	}
}

/// Reports `steps` units of progress, checking for cancellation before each one.
#[derive(Debug)]
pub struct StepsWork {
	pub steps: u64,
	pub step_duration: Duration,
}

#[async_trait]
impl ProgressWork for StepsWork {
	async fn run(&self, monitor: &ProgressMonitor) -> Result<ExecStatus, WorkError> {
		monitor.begin_task("Counting", self.steps);

		for step in 0..self.steps {
			if monitor.is_cancelled() {
				info!("Cancelling StepsWork at step {step}");
				return Ok(ExecStatus::Canceled);
			}

			sleep(self.step_duration).await;
			monitor.worked(1);
		}

		Ok(ExecStatus::Done)
	}
}

/// Never finishes unless cancelled.
#[derive(Debug, Default)]
pub struct UntilCancelledWork;

#[async_trait]
impl ProgressWork for UntilCancelledWork {
	async fn run(&self, monitor: &ProgressMonitor) -> Result<ExecStatus, WorkError> {
		monitor.indeterminate("Waiting for cancellation");
		monitor.cancelled().await;

		Ok(ExecStatus::Canceled)
	}
}

/// Starts reporting progress, then gives up with an error or a panic.
#[derive(Debug)]
pub struct FailingWork {
	pub panics: bool,
}

#[async_trait]
impl ProgressWork for FailingWork {
	async fn run(&self, monitor: &ProgressMonitor) -> Result<ExecStatus, WorkError> {
		monitor.begin_task("Failing", 2);
		monitor.worked(1);

		if self.panics {
			panic!("progress work exploded");
		}

		Err(SampleError::Failed("halfway there").into())
	}
}
