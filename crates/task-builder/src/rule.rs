use std::{fmt, sync::Arc};

use super::error::BuildError;

/// A named lock token that keeps tasks from running at the same time.
///
/// Rules are compared by name only: two rules with the same name conflict, no matter which
/// task created them, while tasks with different or absent rules are free to run side by side.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ExclusionRule {
	name: Arc<str>,
}

impl ExclusionRule {
	/// Creates a rule with the given name, which must not be blank.
	pub fn new(name: impl Into<Arc<str>>) -> Result<Self, BuildError> {
		let name = name.into();

		if name.trim().is_empty() {
			return Err(BuildError::InvalidArgument("exclusion rule name is blank"));
		}

		Ok(Self { name })
	}

	/// For names already known to be non-blank, like a task title.
	pub(crate) const fn from_checked(name: Arc<str>) -> Self {
		Self { name }
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn is_conflicting(&self, other: &Self) -> bool {
		self.name == other.name
	}

	pub(crate) fn key(&self) -> Arc<str> {
		Arc::clone(&self.name)
	}
}

impl fmt::Debug for ExclusionRule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ExclusionRule<name='{}'>", self.name)
	}
}
