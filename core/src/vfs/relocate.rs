use tracing::debug;

use super::{FileSystem, ItemSelection, LockKey, Outcome};
use crate::Error;

impl FileSystem<'_> {
	/// Moves the selected children of `src_path` into `dst_path`.
	///
	/// Only records change: a file keeps its backend object, so no backend call is made and a
	/// half done move never points at missing bytes. Name collisions in the destination are
	/// checked for the whole selection before the first object moves; nothing is overwritten.
	pub async fn move_items(
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
			.acquire(
				selection
					.lock_keys()
					.chain([LockKey::Folder(src.id), LockKey::Folder(dst.id)]),
			)
			.await;

		let (folders, files) = self.resolve(selection, Some(&src)).await?;

		if src.id == dst.id {
			return Ok(());
		}

		let dst_chain = self.ancestor_ids(dst.id).await?;
		if let Some(folder) = folders.iter().find(|folder| dst_chain.contains(&folder.id)) {
			return Err(Error::ParamInvalid(format!(
				"cannot move folder '{}' into itself",
				folder.name
			)));
		}

		for name in folders
			.iter()
			.map(|folder| folder.name.as_str())
			.chain(files.iter().map(|file| file.name.as_str()))
		{
			self.ensure_name_free(dst.id, name).await?;
		}

		let mut outcome = Outcome::default();

		for folder in &folders {
			let res = self.ctx.store.move_folder(folder.id, dst.id).await;
			outcome.record(&folder.name, res.map_err(Into::into));
		}
		for file in &files {
			let res = self.ctx.store.move_file(file.id, dst.id).await;
			outcome.record(&file.name, res.map_err(Into::into));
		}

		debug!(
			user_id = self.user.id,
			src = %src_path,
			dst = %dst_path,
			moved = outcome.done,
			"Objects moved"
		);

		self.invalidate_props([src.id, dst.id]).await;

		outcome.into_result()
	}
}
