use std::{
	io,
	panic::{catch_unwind, AssertUnwindSafe},
	thread::{self, ThreadId},
};

use async_channel as chan;
use tracing::{error, trace, warn};

/// A feedback call waiting to be run on the designated thread.
pub type FeedbackJob = Box<dyn FnOnce() + Send + 'static>;

/// Marshals feedback calls onto the one thread reserved for observer interaction.
///
/// Implementations must run every job eventually, on that same thread, in the order they were
/// handed over.
pub trait DesignatedThread: Send + Sync + 'static {
	fn run_on_thread(&self, job: FeedbackJob);
}

/// A dedicated OS thread draining a FIFO queue of feedback jobs.
///
/// A panicking job is logged and doesn't take the thread down. The thread exits once this value
/// is dropped and the queue is drained.
#[derive(Debug)]
pub struct UiThread {
	jobs_tx: chan::Sender<FeedbackJob>,
	thread_id: ThreadId,
}

impl UiThread {
	pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
		let (jobs_tx, jobs_rx) = chan::unbounded::<FeedbackJob>();

		let handle = thread::Builder::new().name(name.into()).spawn(move || {
			trace!("Feedback thread started");

			while let Ok(job) = jobs_rx.recv_blocking() {
				if catch_unwind(AssertUnwindSafe(job)).is_err() {
					error!("Feedback job panicked on the designated thread");
				}
			}

			trace!("Feedback thread exiting");
		})?;

		Ok(Self {
			jobs_tx,
			thread_id: handle.thread().id(),
		})
	}

	#[must_use]
	pub const fn thread_id(&self) -> ThreadId {
		self.thread_id
	}
}

impl DesignatedThread for UiThread {
	fn run_on_thread(&self, job: FeedbackJob) {
		if self.jobs_tx.try_send(job).is_err() {
			warn!("Feedback thread is gone, dropping feedback job");
		}
	}
}

impl Drop for UiThread {
	fn drop(&mut self) {
		self.jobs_tx.close();
	}
}
