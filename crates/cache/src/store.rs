use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{trace, warn};

use super::clock::{Clock, SystemClock};

#[derive(Debug, Error)]
pub enum Error {
	#[error("failed to serialize cache value <key='{key}'>: {source}")]
	Serialize {
		key: String,
		#[source]
		source: serde_json::Error,
	},
}

#[derive(Debug, Clone)]
struct Entry {
	value: serde_json::Value,
	expires_at: Option<DateTime<Utc>>,
}

impl Entry {
	fn is_alive(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.map_or(true, |expires_at| now < expires_at)
	}
}

/// Clock seconds between two sweeps of expired entries
const SWEEP_INTERVAL_SECS: i64 = 60;

pub struct Cache {
	entries: RwLock<HashMap<String, Entry>>,
	/// Bumped by every eviction, always under the `entries` write lock
	generation: AtomicU64,
	last_sweep: Mutex<DateTime<Utc>>,
	clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Cache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Cache")
			.field("entries", &self.entries.read().len())
			.finish_non_exhaustive()
	}
}

impl Default for Cache {
	fn default() -> Self {
		Self::new()
	}
}

impl Cache {
	#[must_use]
	pub fn new() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}

	#[must_use]
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self {
			entries: RwLock::default(),
			generation: AtomicU64::new(0),
			last_sweep: Mutex::new(clock.now()),
			clock,
		}
	}

	#[must_use]
	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	/// Returns the live value under `key`, if any.
	///
	/// A value that no longer deserializes into `T` is treated as a miss.
	pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		let now = self.clock.now();

		let value = {
			let entries = self.entries.read();
			let entry = entries.get(key)?;
			if !entry.is_alive(now) {
				drop(entries);
				self.evict_if_expired(key, now);
				return None;
			}
			entry.value.clone()
		};

		serde_json::from_value(value)
			.map_err(|e| warn!(%key, ?e, "Cached value has an unexpected shape;"))
			.ok()
	}

	/// Stores `value` under `key` for `ttl`. A zero `ttl` keeps the entry until it is deleted.
	///
	/// Expired entries of other keys are swept here too, at most once per minute of clock time.
	pub fn set<T: Serialize>(
		&self,
		key: impl Into<String>,
		value: &T,
		ttl: Duration,
	) -> Result<(), Error> {
		let (key, entry) = self.entry(key.into(), value, ttl)?;

		trace!(%key, expires_at = ?entry.expires_at, "Caching value");

		self.entries.write().insert(key, entry);

		Ok(())
	}

	/// Eviction generation at this instant, see [`Cache::set_unless_invalidated`]
	#[must_use]
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	/// Like [`Cache::set`], but only when nothing was evicted since `since` was read from
	/// [`Cache::generation`]. Returns whether the value was stored.
	///
	/// A value computed from a source that changed (and evicted) while it was being computed
	/// is then never written back.
	pub fn set_unless_invalidated<T: Serialize>(
		&self,
		key: impl Into<String>,
		value: &T,
		ttl: Duration,
		since: u64,
	) -> Result<bool, Error> {
		let (key, entry) = self.entry(key.into(), value, ttl)?;

		let mut entries = self.entries.write();
		if self.generation.load(Ordering::Acquire) != since {
			trace!(%key, "Not caching value computed before an eviction");
			return Ok(false);
		}

		entries.insert(key, entry);

		Ok(true)
	}

	/// Removes and returns the live value under `key`, so only one caller can ever consume it
	pub fn take<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		let now = self.clock.now();
		let entry = self.entries.write().remove(key)?;

		if !entry.is_alive(now) {
			return None;
		}

		serde_json::from_value(entry.value)
			.map_err(|e| warn!(%key, ?e, "Taken value has an unexpected shape;"))
			.ok()
	}

	pub fn delete<K: AsRef<str>>(&self, keys: impl IntoIterator<Item = K>) {
		let mut entries = self.entries.write();
		self.generation.fetch_add(1, Ordering::AcqRel);
		for key in keys {
			entries.remove(key.as_ref());
		}
	}

	pub fn delete_prefix(&self, prefix: &str) {
		let mut entries = self.entries.write();
		self.generation.fetch_add(1, Ordering::AcqRel);
		entries.retain(|key, _| !key.starts_with(prefix));
	}

	/// Drops every expired entry, returning how many were removed
	pub fn purge_expired(&self) -> usize {
		let now = self.clock.now();
		let mut entries = self.entries.write();
		let before = entries.len();
		entries.retain(|_, entry| entry.is_alive(now));
		before - entries.len()
	}

	pub fn clear(&self) {
		let mut entries = self.entries.write();
		self.generation.fetch_add(1, Ordering::AcqRel);
		entries.clear();
	}

	/// Number of stored entries, expired ones included until they are purged
	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	fn entry<T: Serialize>(
		&self,
		key: String,
		value: &T,
		ttl: Duration,
	) -> Result<(String, Entry), Error> {
		let value = match serde_json::to_value(value) {
			Ok(value) => value,
			Err(source) => return Err(Error::Serialize { key, source }),
		};

		let now = self.clock.now();
		self.sweep_if_due(now);

		let expires_at = if ttl.is_zero() {
			None
		} else {
			// A ttl too large to represent is as good as no expiration at all
			TimeDelta::from_std(ttl)
				.ok()
				.and_then(|ttl| now.checked_add_signed(ttl))
		};

		Ok((key, Entry { value, expires_at }))
	}

	fn sweep_if_due(&self, now: DateTime<Utc>) {
		{
			let mut last_sweep = self.last_sweep.lock();
			if now.signed_duration_since(*last_sweep).num_seconds() < SWEEP_INTERVAL_SECS {
				return;
			}
			*last_sweep = now;
		}

		let purged = self.purge_expired();
		if purged > 0 {
			trace!(purged, "Swept expired cache entries");
		}
	}

	fn evict_if_expired(&self, key: &str, now: DateTime<Utc>) {
		let mut entries = self.entries.write();
		if entries.get(key).is_some_and(|entry| !entry.is_alive(now)) {
			entries.remove(key);
		}
	}
}
