use std::{any::Any, error::Error as StdError, fmt, io, sync::Arc};

use thiserror::Error;

/// Any error a work unit may return, erased so every task shares one fault representation.
pub type WorkError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors reported synchronously while configuring a task, the builder stays usable afterwards.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
	#[error("invalid argument: {0}")]
	InvalidArgument(&'static str),
	#[error("illegal state: {0}")]
	IllegalState(&'static str),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
	#[error("local scheduler must be created inside a tokio runtime")]
	NoRuntime,
	#[error("failed to spawn the feedback thread: {0}")]
	FeedbackThread(#[from] io::Error),
}

/// How a fault inside a work unit was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
	/// The work unit returned an error.
	Error,
	/// The work unit panicked.
	Panic,
	/// The work unit failed without leaving anything we could capture.
	Unknown,
}

/// A fault captured while executing a work unit.
///
/// This is data, never raised back across the worker/observer boundary: it travels inside
/// [`TaskResult`](crate::TaskResult) to listeners and feedback callbacks.
#[derive(Clone)]
pub struct TaskFault {
	kind: FaultKind,
	label: Arc<str>,
	message: String,
	source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl TaskFault {
	pub(crate) fn from_error(label: Arc<str>, error: WorkError) -> Self {
		Self {
			kind: FaultKind::Error,
			label,
			message: error.to_string(),
			source: Some(Arc::from(error)),
		}
	}

	pub(crate) fn from_panic(label: Arc<str>, payload: &(dyn Any + Send)) -> Self {
		let message = payload
			.downcast_ref::<&str>()
			.map(ToString::to_string)
			.or_else(|| payload.downcast_ref::<String>().cloned())
			.unwrap_or_else(|| "<non-string panic payload>".to_string());

		Self {
			kind: FaultKind::Panic,
			label,
			message,
			source: None,
		}
	}

	/// Marker used when a work unit failed but no fault information could be built.
	#[must_use]
	pub fn unknown(label: impl Into<Arc<str>>) -> Self {
		Self {
			kind: FaultKind::Unknown,
			label: label.into(),
			message: "unknown fault".to_string(),
			source: None,
		}
	}

	#[must_use]
	pub const fn kind(&self) -> FaultKind {
		self.kind
	}

	/// Title of the task at the moment its work unit was configured.
	#[must_use]
	pub fn label(&self) -> &str {
		&self.label
	}

	#[must_use]
	pub fn message(&self) -> &str {
		&self.message
	}

	/// Tries to get the original error back as a concrete type.
	#[must_use]
	pub fn downcast_source<E: StdError + 'static>(&self) -> Option<&E> {
		self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
	}
}

impl fmt::Debug for TaskFault {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskFault")
			.field("kind", &self.kind)
			.field("label", &self.label)
			.field("message", &self.message)
			.finish_non_exhaustive()
	}
}

impl fmt::Display for TaskFault {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind {
			FaultKind::Error | FaultKind::Unknown => {
				write!(f, "task <title='{}'> failed: {}", self.label, self.message)
			}
			FaultKind::Panic => write!(f, "task <title='{}'> panicked: {}", self.label, self.message),
		}
	}
}

impl StdError for TaskFault {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self.source
			.as_deref()
			.map(|e| e as &(dyn StdError + 'static))
	}
}
