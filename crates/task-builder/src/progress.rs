use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Last progress reported by a running work unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Progress {
	#[default]
	Idle,
	/// The work unit can't tell how far along it is.
	Indeterminate { task: String },
	Determinate { task: String, done: u64, total: u64 },
	Finished,
}

/// Handed to a work unit on each run to report progress and observe cancellation requests.
///
/// Plain work units never see it: the execution wrapper reports indeterminate progress on their
/// behalf. Progress-aware work units are expected to check [`ProgressMonitor::is_cancelled`] at
/// safe points and return [`ExecStatus::Canceled`](crate::ExecStatus::Canceled) when asked to stop.
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
	title: Arc<str>,
	progress_tx: Arc<watch::Sender<Progress>>,
	cancel: CancellationToken,
}

impl ProgressMonitor {
	/// Creates a standalone monitor, useful for schedulers that don't track progress themselves.
	#[must_use]
	pub fn new(title: impl Into<Arc<str>>) -> Self {
		let (progress_tx, _) = watch::channel(Progress::Idle);

		Self::with_parts(title.into(), Arc::new(progress_tx), CancellationToken::new())
	}

	pub(crate) fn with_parts(
		title: Arc<str>,
		progress_tx: Arc<watch::Sender<Progress>>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			title,
			progress_tx,
			cancel,
		}
	}

	/// Title of the task this monitor reports for.
	#[must_use]
	pub fn title(&self) -> &str {
		&self.title
	}

	pub(crate) fn title_arc(&self) -> Arc<str> {
		Arc::clone(&self.title)
	}

	#[must_use]
	pub fn progress(&self) -> Progress {
		self.progress_tx.borrow().clone()
	}

	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<Progress> {
		self.progress_tx.subscribe()
	}

	/// Starts a named unit of work made of `total` steps, a zero total means indeterminate.
	pub fn begin_task(&self, name: impl Into<String>, total: u64) {
		let task = name.into();

		self.progress_tx.send_replace(if total == 0 {
			Progress::Indeterminate { task }
		} else {
			Progress::Determinate {
				task,
				done: 0,
				total,
			}
		});
	}

	pub fn indeterminate(&self, name: impl Into<String>) {
		self.progress_tx
			.send_replace(Progress::Indeterminate { task: name.into() });
	}

	/// Advances a determinate task, saturating at its total. No-op for any other state.
	pub fn worked(&self, units: u64) {
		self.progress_tx.send_if_modified(|progress| {
			if let Progress::Determinate { done, total, .. } = progress {
				let advanced = done.saturating_add(units).min(*total);
				let changed = advanced != *done;
				*done = advanced;
				changed
			} else {
				false
			}
		});
	}

	pub fn sub_task(&self, name: impl Into<String>) {
		let name = name.into();

		self.progress_tx.send_if_modified(|progress| match progress {
			Progress::Indeterminate { task } | Progress::Determinate { task, .. } => {
				*task = name;
				true
			}
			Progress::Idle | Progress::Finished => false,
		});
	}

	pub fn done(&self) {
		self.progress_tx.send_replace(Progress::Finished);
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Resolves once cancellation was requested for the current run.
	pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
		self.cancel.cancelled()
	}

	/// Requests cancellation, only progress-aware work units will notice it.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}
}
