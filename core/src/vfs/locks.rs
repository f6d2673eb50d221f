use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::model::{FileId, FolderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
	Folder(FolderId),
	File(FileId),
}

/// Per-object async locks, created on demand and dropped once nobody holds or waits on them.
///
/// There is no global lock: operations on disjoint objects never contend.
#[derive(Debug, Default, Clone)]
pub struct LockTable {
	locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl LockTable {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Locks every key, always in the same global order so two callers can't deadlock
	pub async fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> LockGuard {
		let mut keys = keys.into_iter().collect::<Vec<_>>();
		keys.sort_unstable();
		keys.dedup();

		let mut held = Vec::with_capacity(keys.len());
		for key in keys {
			let lock = Arc::clone(self.locks.entry(key).or_default().value());
			held.push((key, lock.lock_owned().await));
		}

		trace!(count = held.len(), "Object locks acquired");

		LockGuard {
			locks: Arc::clone(&self.locks),
			held,
		}
	}

	/// Locks currently tracked, held or awaited
	#[must_use]
	pub fn len(&self) -> usize {
		self.locks.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.locks.is_empty()
	}
}

#[must_use = "locks are released as soon as the guard is dropped"]
pub struct LockGuard {
	locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
	held: Vec<(LockKey, OwnedMutexGuard<()>)>,
}

impl Drop for LockGuard {
	fn drop(&mut self) {
		for (key, guard) in self.held.drain(..) {
			drop(guard);
			// Only the table still points at the mutex: no holder and no waiter left
			self.locks
				.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
		}
	}
}
