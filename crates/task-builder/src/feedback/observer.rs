use std::sync::Arc;

use tokio::sync::watch;
use tracing::trace;

/// Whether someone is currently watching a task in the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
	Attached,
	Detached,
}

impl Attachment {
	#[must_use]
	pub const fn is_attached(self) -> bool {
		matches!(self, Self::Attached)
	}
}

/// Attach/detach signal for a task's observer, shared by all clones.
///
/// Sending a task to the background is a [`detach`](Observer::detach), coming back to look at it
/// (or acknowledging its result) is an [`attach`](Observer::attach). Withheld deferred feedback
/// is delivered on the next attach. Once every clone is dropped, withheld feedback is discarded.
#[derive(Debug, Clone)]
pub struct Observer {
	attachment_tx: Arc<watch::Sender<Attachment>>,
}

impl Observer {
	#[must_use]
	pub fn new(initial: Attachment) -> Self {
		let (attachment_tx, _) = watch::channel(initial);

		Self {
			attachment_tx: Arc::new(attachment_tx),
		}
	}

	pub fn attach(&self) {
		self.set(Attachment::Attached);
	}

	pub fn detach(&self) {
		self.set(Attachment::Detached);
	}

	#[must_use]
	pub fn attachment(&self) -> Attachment {
		*self.attachment_tx.borrow()
	}

	pub(crate) fn subscribe(&self) -> watch::Receiver<Attachment> {
		self.attachment_tx.subscribe()
	}

	fn set(&self, attachment: Attachment) {
		if self.attachment_tx.send_replace(attachment) != attachment {
			trace!(?attachment, "Observer attachment changed");
		}
	}
}

impl Default for Observer {
	fn default() -> Self {
		Self::new(Attachment::Attached)
	}
}
