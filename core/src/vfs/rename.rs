use tracing::debug;

use super::{
	validation::{check_extension, validate_name},
	FileSystem, ItemSelection, LockKey,
};
use crate::Error;

impl FileSystem<'_> {
	/// Renames the one selected object in place
	pub async fn rename(&self, selection: &ItemSelection, new_name: &str) -> Result<(), Error> {
		if selection.len() != 1 {
			return Err(Error::ParamInvalid(
				"exactly one object can be renamed at a time".to_string(),
			));
		}

		validate_name(new_name)?;

		// First pass only finds the parent, so it can be locked along with the object
		let (folders, files) = self.resolve(selection, None).await?;
		let parent_id = match (folders.first(), files.first()) {
			(Some(folder), _) => folder.parent_id.ok_or_else(|| {
				Error::ParamInvalid("the root folder cannot be renamed".to_string())
			})?,
			(None, Some(file)) => file.folder_id,
			(None, None) => return Err(Error::NotFound("nothing to rename".to_string())),
		};

		let _guard = self
			.ctx
			.locks
			.acquire(selection.lock_keys().chain([LockKey::Folder(parent_id)]))
			.await;

		let (folders, files) = self.resolve(selection, None).await?;

		if let Some(folder) = folders.first() {
			if folder.parent_id != Some(parent_id) {
				return Err(Error::Conflict(format!(
					"folder '{}' was moved concurrently",
					folder.name
				)));
			}
			if folder.name == new_name {
				return Ok(());
			}

			if let Some(occupant) = self.occupant(parent_id, new_name).await? {
				if !occupant.is_folder(folder.id) {
					return Err(Error::Conflict(format!(
						"an object named '{new_name}' already exists"
					)));
				}
			}

			self.ctx.store.rename_folder(folder.id, new_name).await?;
			debug!(folder_id = folder.id, from = %folder.name, to = %new_name, "Folder renamed");
		} else if let Some(file) = files.first() {
			if file.folder_id != parent_id {
				return Err(Error::Conflict(format!(
					"file '{}' was moved concurrently",
					file.name
				)));
			}
			if file.name == new_name {
				return Ok(());
			}

			check_extension(&self.ctx.store.get_policy(file.policy_id).await?, new_name)?;

			if let Some(occupant) = self.occupant(parent_id, new_name).await? {
				if !occupant.is_file(file.id) {
					return Err(Error::Conflict(format!(
						"an object named '{new_name}' already exists"
					)));
				}
			}

			self.ctx.store.rename_file(file.id, new_name).await?;
			debug!(file_id = file.id, from = %file.name, to = %new_name, "File renamed");
		}

		Ok(())
	}
}
