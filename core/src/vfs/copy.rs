use std::collections::{HashMap, HashSet};

use cumulus_utils::error::report_error;
use tracing::debug;

use super::{object_path, FileSystem, ItemSelection, LockKey, Outcome};
use crate::{
	model::{CopyMode, File, FolderId, NewFile, NewFolder},
	quota::{preflight, Requirement},
	Error,
};

impl FileSystem<'_> {
	/// Copies the selected children of `src_path`, folders recursively, into `dst_path`.
	///
	/// Each file follows the copy mode of its storage policy. The copied bytes count against
	/// the user's capacity up front, whatever the mode.
	pub async fn copy_items(
		&self,
		selection: &ItemSelection,
		src_path: &str,
		dst_path: &str,
	) -> Result<(), Error> {
		let src = self.folder_at(src_path).await?;
		let dst = self.folder_at(dst_path).await?;

		let _guard = self
			.ctx
			.locks
			.acquire(selection.lock_keys().chain([LockKey::Folder(dst.id)]))
			.await;

		let (folders, files) = self.resolve(selection, Some(&src)).await?;

		let tree = self.child_folders(&folders).await?;
		if tree.iter().any(|folder| folder.id == dst.id) {
			return Err(Error::ParamInvalid(
				"cannot copy a folder into itself".to_string(),
			));
		}

		for name in folders
			.iter()
			.map(|folder| folder.name.as_str())
			.chain(files.iter().map(|file| file.name.as_str()))
		{
			self.ensure_name_free(dst.id, name).await?;
		}

		let tree_files = self.child_files(&tree).await?;
		let total = files
			.iter()
			.chain(&tree_files)
			.map(|file| file.size)
			.sum::<u64>();

		preflight(&self.fresh_user().await?, &[Requirement::Headroom(total)]).into_result()?;

		let mut outcome = Outcome::default();
		let mut copied_bytes = 0;

		for file in &files {
			let res = self.copy_file(file, dst.id).await;
			if res.is_ok() {
				copied_bytes += file.size;
			}
			outcome.record(&file.name, res);
		}

		let top_level = folders.iter().map(|folder| folder.id).collect::<HashSet<_>>();
		let mut copies = HashMap::<FolderId, FolderId>::with_capacity(tree.len());

		// Parents come before children in the walk
		for folder in &tree {
			let target_parent = if top_level.contains(&folder.id) {
				Some(dst.id)
			} else {
				folder
					.parent_id
					.and_then(|parent| copies.get(&parent).copied())
			};

			// The parent copy failed and was already reported
			let Some(parent_id) = target_parent else {
				continue;
			};

			let res = self
				.ctx
				.store
				.create_folder(NewFolder {
					name: folder.name.clone(),
					parent_id,
					owner_id: self.user.id,
				})
				.await
				.map(|copy| {
					copies.insert(folder.id, copy.id);
				})
				.map_err(Into::into);

			outcome.record(&folder.name, res);
		}

		for file in &tree_files {
			if let Some(target) = copies.get(&file.folder_id) {
				let res = self.copy_file(file, *target).await;
				if res.is_ok() {
					copied_bytes += file.size;
				}
				outcome.record(&file.name, res);
			}
		}

		self.ctx
			.store
			.adjust_storage(self.user.id, i64::try_from(copied_bytes).unwrap_or(i64::MAX))
			.await?;

		debug!(
			user_id = self.user.id,
			src = %src_path,
			dst = %dst_path,
			copied_bytes,
			"Objects copied"
		);

		self.invalidate_props([dst.id]).await;

		outcome.into_result()
	}

	async fn copy_file(&self, file: &File, folder_id: FolderId) -> Result<(), Error> {
		let policy = self.ctx.store.get_policy(file.policy_id).await?;

		let source_name = match policy.copy_mode {
			CopyMode::Reference => file.source_name.clone(),
			CopyMode::Physical => {
				let target = object_path(self.user.id, &file.name);
				self.ctx
					.backends
					.get(&policy.backend)?
					.copy(&file.source_name, &target)
					.await?;
				target
			}
		};

		let created = self
			.ctx
			.store
			.create_file(NewFile {
				name: file.name.clone(),
				source_name: source_name.clone(),
				size: file.size,
				folder_id,
				owner_id: self.user.id,
				policy_id: file.policy_id,
			})
			.await;

		if let Err(e) = created {
			if policy.copy_mode == CopyMode::Physical {
				if let Ok(backend) = self.ctx.backends.get(&policy.backend) {
					report_error(
						&backend.delete(&source_name).await,
						"Failed to clean up copied object after record creation failed;",
					);
				}
			}
			return Err(e.into());
		}

		Ok(())
	}
}
