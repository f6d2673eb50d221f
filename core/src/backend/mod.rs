//! Storage backend capability: the byte store behind a storage policy.
//!
//! The virtual filesystem only ever talks to [`StorageBackend`], so the logical tree does not
//! care whether bytes end up on local disk or in an object store.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use cumulus_utils::error::FileIOError;
use thiserror::Error;

mod local;
mod memory;

pub use local::LocalBackend;
pub use memory::MemoryBackend;

#[derive(Debug, Error)]
pub enum BackendError {
	#[error("object <path='{0}'> not found in backend")]
	NotFound(String),
	#[error("invalid object path '{0}'")]
	InvalidPath(String),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("backend unavailable: {0}")]
	Unavailable(String),
	#[error("no backend registered under '{0}'")]
	UnknownBackend(String),
}

impl BackendError {
	#[must_use]
	pub fn is_not_found(&self) -> bool {
		match self {
			Self::NotFound(_) => true,
			Self::FileIO(e) => e.is_not_found(),
			_ => false,
		}
	}
}

/// Object paths are `/` separated and relative to the backend's root.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
	async fn exists(&self, path: &str) -> Result<bool, BackendError>;

	async fn read(&self, path: &str) -> Result<Vec<u8>, BackendError>;

	/// Creates or replaces the object
	async fn write(&self, path: &str, data: &[u8]) -> Result<(), BackendError>;

	async fn delete(&self, path: &str) -> Result<(), BackendError>;

	async fn rename(&self, from: &str, to: &str) -> Result<(), BackendError>;

	async fn copy(&self, from: &str, to: &str) -> Result<(), BackendError>;
}

/// Backends addressable by the name a [`StoragePolicy`](crate::model::StoragePolicy) carries
#[derive(Clone, Default)]
pub struct Backends {
	registered: HashMap<String, Arc<dyn StorageBackend>>,
}

impl fmt::Debug for Backends {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.registered.keys()).finish()
	}
}

impl Backends {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, name: impl Into<String>, backend: Arc<dyn StorageBackend>) -> Self {
		self.register(name, backend);
		self
	}

	pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn StorageBackend>) {
		self.registered.insert(name.into(), backend);
	}

	pub fn get(&self, name: &str) -> Result<Arc<dyn StorageBackend>, BackendError> {
		self.registered
			.get(name)
			.cloned()
			.ok_or_else(|| BackendError::UnknownBackend(name.to_string()))
	}
}
