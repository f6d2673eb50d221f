use std::collections::HashSet;

use super::FileSystem;
use crate::{
	model::{File, FileId, Folder, FolderId},
	Error,
};

/// Whatever already carries a name inside a folder
#[derive(Debug, Clone)]
pub enum Occupant {
	Folder(Folder),
	File(File),
}

impl Occupant {
	#[must_use]
	pub fn is_folder(&self, id: FolderId) -> bool {
		matches!(self, Self::Folder(folder) if folder.id == id)
	}

	#[must_use]
	pub fn is_file(&self, id: FileId) -> bool {
		matches!(self, Self::File(file) if file.id == id)
	}
}

fn components(path: &str) -> impl Iterator<Item = &str> {
	path.split('/').filter(|part| !part.is_empty() && *part != ".")
}

/// Splits `/a/b/c.txt` into `("/a/b", "c.txt")`
#[must_use]
pub fn split_file_path(path: &str) -> Option<(String, &str)> {
	let parts = components(path).collect::<Vec<_>>();
	let (name, dirs) = parts.split_last()?;
	Some((format!("/{}", dirs.join("/")), *name))
}

impl FileSystem<'_> {
	pub async fn root(&self) -> Result<Folder, Error> {
		Ok(self.ctx.store.get_root_folder(self.user.id).await?)
	}

	pub async fn folder(&self, id: FolderId) -> Result<Folder, Error> {
		self.ctx
			.store
			.get_folders_by_ids(&[id], self.user.id)
			.await?
			.pop()
			.ok_or_else(|| Error::NotFound(format!("folder <id='{id}'> not found")))
	}

	pub async fn file(&self, id: FileId) -> Result<File, Error> {
		self.ctx
			.store
			.get_files_by_ids(&[id], self.user.id)
			.await?
			.pop()
			.ok_or_else(|| Error::NotFound(format!("file <id='{id}'> not found")))
	}

	/// Bytes of a file, read from the backend of its storage policy
	pub async fn content(&self, file: &File) -> Result<Vec<u8>, Error> {
		let policy = self.ctx.store.get_policy(file.policy_id).await?;
		Ok(self
			.ctx
			.backends
			.get(&policy.backend)?
			.read(&file.source_name)
			.await?)
	}

	/// Walks `path` down from the user's root, `/` being the root itself
	pub async fn folder_at(&self, path: &str) -> Result<Folder, Error> {
		let mut current = self.root().await?;

		for name in components(path) {
			current = self
				.ctx
				.store
				.get_child_folder(current.id, name)
				.await?
				.ok_or_else(|| Error::NotFound(format!("path '{path}' not found")))?;
		}

		Ok(current)
	}

	pub async fn file_at(&self, path: &str) -> Result<File, Error> {
		let (dir, name) = split_file_path(path)
			.ok_or_else(|| Error::NotFound(format!("file '{path}' not found")))?;
		let folder = self.folder_at(&dir).await?;

		self.ctx
			.store
			.get_child_file(folder.id, name)
			.await?
			.ok_or_else(|| Error::NotFound(format!("file '{path}' not found")))
	}

	pub async fn is_path_exist(&self, path: &str) -> Result<bool, Error> {
		exists(self.folder_at(path).await)
	}

	pub async fn is_file_exist(&self, path: &str) -> Result<bool, Error> {
		exists(self.file_at(path).await)
	}

	/// Folder or file named `name` directly inside `folder_id`, folders checked first
	pub async fn occupant(&self, folder_id: FolderId, name: &str) -> Result<Option<Occupant>, Error> {
		if let Some(folder) = self.ctx.store.get_child_folder(folder_id, name).await? {
			return Ok(Some(Occupant::Folder(folder)));
		}

		Ok(self
			.ctx
			.store
			.get_child_file(folder_id, name)
			.await?
			.map(Occupant::File))
	}

	pub async fn ensure_name_free(&self, folder_id: FolderId, name: &str) -> Result<(), Error> {
		match self.occupant(folder_id, name).await? {
			None => Ok(()),
			Some(_) => Err(Error::Conflict(format!("an object named '{name}' already exists"))),
		}
	}

	/// `folder_id` followed by its parents up to the root
	pub async fn ancestors(&self, folder_id: FolderId) -> Result<Vec<Folder>, Error> {
		let mut chain = Vec::new();
		let mut visited = HashSet::new();
		let mut next = Some(folder_id);

		while let Some(id) = next {
			if !visited.insert(id) {
				break;
			}

			let folder = self.folder(id).await?;
			next = folder.parent_id;
			chain.push(folder);
		}

		Ok(chain)
	}

	pub async fn ancestor_ids(&self, folder_id: FolderId) -> Result<Vec<FolderId>, Error> {
		Ok(self
			.ancestors(folder_id)
			.await?
			.into_iter()
			.map(|folder| folder.id)
			.collect())
	}

	/// Logical path of a folder, like `/photos/2024`
	pub async fn trace_root(&self, folder_id: FolderId) -> Result<String, Error> {
		let names = self
			.ancestors(folder_id)
			.await?
			.into_iter()
			.rev()
			.filter(|folder| !folder.is_root())
			.map(|folder| folder.name)
			.collect::<Vec<_>>();

		Ok(format!("/{}", names.join("/")))
	}
}

fn exists<T>(res: Result<T, Error>) -> Result<bool, Error> {
	match res {
		Ok(_) => Ok(true),
		Err(Error::NotFound(_)) => Ok(false),
		Err(e) => Err(e),
	}
}
