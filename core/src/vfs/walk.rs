use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::FileSystem;
use crate::{
	model::{File, Folder, FolderId},
	Error,
};

/// Aggregates over everything below a folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStats {
	pub child_folder_num: u64,
	pub child_file_num: u64,
	pub size: u64,
}

/// A file and the `/` separated path it gets inside an archive
#[derive(Debug, Clone)]
pub struct ArchiveItem {
	pub path: String,
	pub file: File,
}

impl FileSystem<'_> {
	/// `roots` followed by all their descendants, level by level.
	///
	/// Iterative, and every folder is visited once, so even a corrupted tree with a cycle ends.
	pub async fn child_folders(&self, roots: &[Folder]) -> Result<Vec<Folder>, Error> {
		let mut visited = HashSet::new();
		let mut all = Vec::new();
		let mut level = Vec::new();

		for root in roots {
			if visited.insert(root.id) {
				level.push(root.id);
				all.push(root.clone());
			}
		}

		while !level.is_empty() {
			let children = self.ctx.store.get_child_folders(&level).await?;

			level = Vec::with_capacity(children.len());
			for child in children {
				if visited.insert(child.id) {
					level.push(child.id);
					all.push(child);
				}
			}
		}

		Ok(all)
	}

	/// Files directly inside any of `folders`
	pub async fn child_files(&self, folders: &[Folder]) -> Result<Vec<File>, Error> {
		if folders.is_empty() {
			return Ok(Vec::new());
		}

		let ids = folders.iter().map(|folder| folder.id).collect::<Vec<_>>();
		Ok(self.ctx.store.get_child_files(&ids).await?)
	}

	pub async fn folder_stats(&self, folder: &Folder) -> Result<FolderStats, Error> {
		let folders = self.child_folders(std::slice::from_ref(folder)).await?;
		let files = self.child_files(&folders).await?;

		Ok(FolderStats {
			// The walk includes the folder itself
			child_folder_num: folders.len().saturating_sub(1) as u64,
			child_file_num: files.len() as u64,
			size: files.iter().map(|file| file.size).sum(),
		})
	}

	/// Flattens a selection into the files an archive of it would hold.
	///
	/// Selected files sit at the archive root, selected folders keep their own name as prefix.
	pub async fn archive_items(
		&self,
		folders: &[Folder],
		files: &[File],
	) -> Result<Vec<ArchiveItem>, Error> {
		let mut items = files
			.iter()
			.map(|file| ArchiveItem {
				path: file.name.clone(),
				file: file.clone(),
			})
			.collect::<Vec<_>>();

		let tree = self.child_folders(folders).await?;
		let selected = folders.iter().map(|folder| folder.id).collect::<HashSet<_>>();

		// Breadth first order guarantees a parent's prefix is known before its children
		let mut prefixes = HashMap::<FolderId, String>::with_capacity(tree.len());
		for folder in &tree {
			let prefix = match folder.parent_id.and_then(|parent| prefixes.get(&parent)) {
				Some(parent_prefix) if !selected.contains(&folder.id) => {
					format!("{parent_prefix}/{}", folder.name)
				}
				_ => folder.name.clone(),
			};
			prefixes.insert(folder.id, prefix);
		}

		for file in self.child_files(&tree).await? {
			if let Some(prefix) = prefixes.get(&file.folder_id) {
				items.push(ArchiveItem {
					path: format!("{prefix}/{}", file.name),
					file,
				});
			}
		}

		Ok(items)
	}
}
