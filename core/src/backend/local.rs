use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use cumulus_utils::error::FileIOError;
use tokio::fs;
use tracing::trace;

use super::{BackendError, StorageBackend};

/// Keeps objects as plain files under a root directory
#[derive(Debug, Clone)]
pub struct LocalBackend {
	root: PathBuf,
}

impl LocalBackend {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Maps an object path below the root, refusing anything that could climb out of it
	fn resolve(&self, path: &str) -> Result<PathBuf, BackendError> {
		let relative = Path::new(path);

		let mut resolved = self.root.clone();
		let mut depth = 0;
		for component in relative.components() {
			match component {
				Component::Normal(part) => {
					resolved.push(part);
					depth += 1;
				}
				Component::CurDir => {}
				Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
					return Err(BackendError::InvalidPath(path.to_string()));
				}
			}
		}

		if depth == 0 {
			return Err(BackendError::InvalidPath(path.to_string()));
		}

		Ok(resolved)
	}

	async fn ensure_parent(path: &Path) -> Result<(), BackendError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| FileIOError::from((parent, e, "creating parent directory")))?;
		}
		Ok(())
	}
}

fn not_found_or_io(path: &str, full: &Path, e: std::io::Error, context: &'static str) -> BackendError {
	if e.kind() == std::io::ErrorKind::NotFound {
		BackendError::NotFound(path.to_string())
	} else {
		FileIOError::from((full, e, context)).into()
	}
}

#[async_trait]
impl StorageBackend for LocalBackend {
	async fn exists(&self, path: &str) -> Result<bool, BackendError> {
		let full = self.resolve(path)?;
		fs::try_exists(&full)
			.await
			.map_err(|e| FileIOError::from((&full, e, "probing object")).into())
	}

	async fn read(&self, path: &str) -> Result<Vec<u8>, BackendError> {
		let full = self.resolve(path)?;
		fs::read(&full)
			.await
			.map_err(|e| not_found_or_io(path, &full, e, "reading object"))
	}

	async fn write(&self, path: &str, data: &[u8]) -> Result<(), BackendError> {
		let full = self.resolve(path)?;
		Self::ensure_parent(&full).await?;

		fs::write(&full, data)
			.await
			.map_err(|e| FileIOError::from((&full, e, "writing object")))?;

		trace!(?full, size = data.len(), "Object written");

		Ok(())
	}

	async fn delete(&self, path: &str) -> Result<(), BackendError> {
		let full = self.resolve(path)?;
		fs::remove_file(&full)
			.await
			.map_err(|e| not_found_or_io(path, &full, e, "deleting object"))
	}

	async fn rename(&self, from: &str, to: &str) -> Result<(), BackendError> {
		let (full_from, full_to) = (self.resolve(from)?, self.resolve(to)?);
		Self::ensure_parent(&full_to).await?;

		fs::rename(&full_from, &full_to)
			.await
			.map_err(|e| not_found_or_io(from, &full_from, e, "renaming object"))
	}

	async fn copy(&self, from: &str, to: &str) -> Result<(), BackendError> {
		let (full_from, full_to) = (self.resolve(from)?, self.resolve(to)?);
		Self::ensure_parent(&full_to).await?;

		fs::copy(&full_from, &full_to)
			.await
			.map(|_| ())
			.map_err(|e| not_found_or_io(from, &full_from, e, "copying object"))
	}
}
