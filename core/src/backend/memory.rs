use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{BackendError, StorageBackend};

#[derive(Debug, Default)]
pub struct MemoryBackend {
	objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.objects.read().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.objects.read().is_empty()
	}

	#[must_use]
	pub fn paths(&self) -> Vec<String> {
		let mut paths = self.objects.read().keys().cloned().collect::<Vec<_>>();
		paths.sort();
		paths
	}
}

#[async_trait]
impl StorageBackend for MemoryBackend {
	async fn exists(&self, path: &str) -> Result<bool, BackendError> {
		Ok(self.objects.read().contains_key(path))
	}

	async fn read(&self, path: &str) -> Result<Vec<u8>, BackendError> {
		self.objects
			.read()
			.get(path)
			.cloned()
			.ok_or_else(|| BackendError::NotFound(path.to_string()))
	}

	async fn write(&self, path: &str, data: &[u8]) -> Result<(), BackendError> {
		self.objects.write().insert(path.to_string(), data.to_vec());
		Ok(())
	}

	async fn delete(&self, path: &str) -> Result<(), BackendError> {
		self.objects
			.write()
			.remove(path)
			.map(|_| ())
			.ok_or_else(|| BackendError::NotFound(path.to_string()))
	}

	async fn rename(&self, from: &str, to: &str) -> Result<(), BackendError> {
		let mut objects = self.objects.write();
		let data = objects
			.remove(from)
			.ok_or_else(|| BackendError::NotFound(from.to_string()))?;
		objects.insert(to.to_string(), data);
		Ok(())
	}

	async fn copy(&self, from: &str, to: &str) -> Result<(), BackendError> {
		let mut objects = self.objects.write();
		let data = objects
			.get(from)
			.cloned()
			.ok_or_else(|| BackendError::NotFound(from.to_string()))?;
		objects.insert(to.to_string(), data);
		Ok(())
	}
}
