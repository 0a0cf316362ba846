use std::{
	collections::HashMap,
	sync::{Arc, Weak},
};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::rule::ExclusionRule;

/// One async lock per exclusion rule name, created on first use and forgotten once unused.
///
/// Tokio's mutex is fair, so tasks sharing a rule are admitted in the order they asked.
#[derive(Debug, Default)]
pub(super) struct ExclusionLocks {
	locks: Mutex<HashMap<Arc<str>, Weak<Mutex<()>>>>,
}

impl ExclusionLocks {
	pub(super) async fn acquire(&self, rule: &ExclusionRule) -> OwnedMutexGuard<()> {
		let lock = {
			let mut locks = self.locks.lock().await;

			locks.retain(|_, lock| lock.strong_count() > 0);

			if let Some(lock) = locks.get(rule.name()).and_then(Weak::upgrade) {
				lock
			} else {
				let lock = Arc::new(Mutex::new(()));
				locks.insert(rule.key(), Arc::downgrade(&lock));
				lock
			}
		};

		trace!(rule = rule.name(), "Waiting for exclusion rule");

		lock.lock_owned().await
	}
}
