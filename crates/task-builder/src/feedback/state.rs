use super::{observer::Attachment, FeedbackTiming};
use crate::work::TaskResult;

/// A feedback call that must happen now.
#[derive(Debug, Clone)]
pub struct Delivery {
	pub result: TaskResult,
	pub immediate: bool,
}

/// Delivery state of the feedback for one task execution.
///
/// ```text
/// Pending ──result, Immediate────────────► Completed (deliver, immediate)
///    │   ──result, Deferred + Attached───► Completed (deliver, immediate)
///    └───result, Deferred + Detached───► Withheld ──attach──► Completed (deliver, not immediate)
/// ```
///
/// `Completed` absorbs every further event, so a single execution never delivers twice.
#[derive(Debug, Clone, Default)]
pub enum FeedbackState {
	#[default]
	Pending,
	Withheld(TaskResult),
	Completed,
}

impl FeedbackState {
	#[must_use]
	pub fn on_result(
		self,
		timing: FeedbackTiming,
		attachment: Attachment,
		result: TaskResult,
	) -> (Self, Option<Delivery>) {
		match (self, timing, attachment) {
			(Self::Pending, FeedbackTiming::Immediate, _)
			| (Self::Pending, FeedbackTiming::Deferred, Attachment::Attached) => (
				Self::Completed,
				Some(Delivery {
					result,
					immediate: true,
				}),
			),
			(Self::Pending, FeedbackTiming::Deferred, Attachment::Detached) => {
				(Self::Withheld(result), None)
			}
			(state @ (Self::Withheld(_) | Self::Completed), _, _) => (state, None),
		}
	}

	#[must_use]
	pub fn on_attach(self) -> (Self, Option<Delivery>) {
		match self {
			Self::Withheld(result) => (
				Self::Completed,
				Some(Delivery {
					result,
					immediate: false,
				}),
			),
			state @ (Self::Pending | Self::Completed) => (state, None),
		}
	}

	#[must_use]
	pub const fn is_withheld(&self) -> bool {
		matches!(self, Self::Withheld(_))
	}

	#[must_use]
	pub const fn is_completed(&self) -> bool {
		matches!(self, Self::Completed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn immediate_delivers_regardless_of_attachment() {
		for attachment in [Attachment::Attached, Attachment::Detached] {
			let (state, delivery) = FeedbackState::Pending.on_result(
				FeedbackTiming::Immediate,
				attachment,
				TaskResult::success(),
			);

			assert!(state.is_completed());
			assert!(delivery.expect("must deliver").immediate);

			let (state, delivery) = state.on_attach();
			assert!(state.is_completed());
			assert!(delivery.is_none());
		}
	}

	#[test]
	fn deferred_and_attached_delivers_immediately() {
		let (state, delivery) = FeedbackState::Pending.on_result(
			FeedbackTiming::Deferred,
			Attachment::Attached,
			TaskResult::success(),
		);

		assert!(state.is_completed());
		assert!(delivery.expect("must deliver").immediate);
	}

	#[test]
	fn deferred_and_detached_waits_for_attach_once() {
		let (state, delivery) = FeedbackState::Pending.on_result(
			FeedbackTiming::Deferred,
			Attachment::Detached,
			TaskResult::cancelled(),
		);
		assert!(state.is_withheld());
		assert!(delivery.is_none());

		let (state, delivery) = state.on_attach();
		let delivery = delivery.expect("must deliver on attach");
		assert!(!delivery.immediate);
		assert!(state.is_completed());

		let (state, delivery) = state.on_attach();
		assert!(state.is_completed());
		assert!(delivery.is_none());
	}

	#[test]
	fn attach_before_result_does_nothing() {
		let (state, delivery) = FeedbackState::Pending.on_attach();
		assert!(matches!(state, FeedbackState::Pending));
		assert!(delivery.is_none());
	}

	#[test]
	fn second_result_is_ignored() {
		let (state, _) = FeedbackState::Pending.on_result(
			FeedbackTiming::Deferred,
			Attachment::Detached,
			TaskResult::success(),
		);
		let (state, delivery) =
			state.on_result(FeedbackTiming::Immediate, Attachment::Attached, TaskResult::success());

		assert!(state.is_withheld());
		assert!(delivery.is_none());
	}
}
