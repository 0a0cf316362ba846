use std::sync::Arc;

use tokio::spawn;
use tracing::{instrument, trace, Instrument};

use super::{
	observer::Observer,
	state::{Delivery, FeedbackState},
	thread::DesignatedThread,
	FeedbackPolicy,
};
use crate::work::TaskResult;

/// Routes finished task results to their [`FeedbackPolicy`] callbacks on the designated thread.
///
/// Any scheduler can use it: once a task execution yields its [`TaskResult`], hand it to
/// [`FeedbackDispatcher::complete`] together with the task's policy and observer.
#[derive(Clone)]
pub struct FeedbackDispatcher {
	thread: Arc<dyn DesignatedThread>,
}

impl FeedbackDispatcher {
	pub fn new(thread: Arc<dyn DesignatedThread>) -> Self {
		Self { thread }
	}

	/// Evaluates the policy for one execution result.
	///
	/// Withheld results wait on a background tokio task for the observer to attach again, so this
	/// must be called from within a tokio runtime.
	#[instrument(skip_all, fields(timing = ?policy.timing(), attachment = ?observer.attachment()))]
	pub fn complete(&self, policy: &FeedbackPolicy, result: TaskResult, observer: &Observer) {
		// Subscribing before reading the attachment so an attach racing with us isn't missed
		let mut attachment_rx = observer.subscribe();
		let attachment = *attachment_rx.borrow_and_update();

		let (state, delivery) =
			FeedbackState::Pending.on_result(policy.timing(), attachment, result);

		if let Some(delivery) = delivery {
			self.deliver(policy.clone(), delivery);
			return;
		}

		if !state.is_withheld() {
			return;
		}

		trace!("Observer is detached, withholding feedback until it attaches again");

		spawn({
			let this = self.clone();
			let policy = policy.clone();

			async move {
				if attachment_rx
					.wait_for(|attachment| attachment.is_attached())
					.await
					.is_err()
				{
					trace!("Observer dropped without attaching again, discarding withheld feedback");
					return;
				}

				if let (_, Some(delivery)) = state.on_attach() {
					this.deliver(policy, delivery);
				}
			}
			.in_current_span()
		});
	}

	fn deliver(&self, policy: FeedbackPolicy, Delivery { result, immediate }: Delivery) {
		trace!(%immediate, "Dispatching feedback to the designated thread");

		self.thread.run_on_thread(Box::new(move || {
			policy.perform(&result, immediate);
		}));
	}
}
