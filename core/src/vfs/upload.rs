use cumulus_utils::error::report_error;
use tracing::debug;

use super::{
	object_path,
	validation::{check_extension, validate_name},
	FileSystem, LockKey, Occupant,
};
use crate::{
	model::{File, Folder, NewFile, NewFolder},
	quota::{preflight, Requirement},
	Error,
};

impl FileSystem<'_> {
	/// Stores `data` as a new file `name` inside `folder`, under the user's storage policy.
	///
	/// Name, extension, policy size limit, collisions and remaining capacity are all checked
	/// before the backend is written. If the record can't be created the bytes are removed again.
	pub async fn put_file(&self, folder: &Folder, name: &str, data: &[u8]) -> Result<File, Error> {
		validate_name(name)?;

		let policy = self.policy().await?;
		check_extension(&policy, name)?;

		let size = data.len() as u64;
		if policy.max_size != 0 && size > policy.max_size {
			return Err(Error::ResourceExceeded(format!(
				"file '{name}' is {size} bytes, storage policy '{}' allows {}",
				policy.name, policy.max_size
			)));
		}

		let _guard = self.ctx.locks.acquire([LockKey::Folder(folder.id)]).await;

		self.ensure_name_free(folder.id, name).await?;
		preflight(&self.fresh_user().await?, &[Requirement::Headroom(size)]).into_result()?;

		let backend = self.ctx.backends.get(&policy.backend)?;
		let source_name = object_path(self.user.id, name);
		backend.write(&source_name, data).await?;

		let file = match self
			.ctx
			.store
			.create_file(NewFile {
				name: name.to_string(),
				source_name: source_name.clone(),
				size,
				folder_id: folder.id,
				owner_id: self.user.id,
				policy_id: policy.id,
			})
			.await
		{
			Ok(file) => file,
			Err(e) => {
				report_error(
					&backend.delete(&source_name).await,
					"Failed to remove orphaned object after record creation failed;",
				);
				return Err(e.into());
			}
		};

		self.ctx
			.store
			.adjust_storage(self.user.id, i64::try_from(size).unwrap_or(i64::MAX))
			.await?;

		debug!(user_id = self.user.id, file_id = file.id, %name, size, "File stored");

		self.invalidate_props([folder.id]).await;

		Ok(file)
	}

	/// Returns the child folder `name` of `parent`, creating it when missing
	pub async fn ensure_folder(&self, parent: &Folder, name: &str) -> Result<Folder, Error> {
		validate_name(name)?;

		let _guard = self.ctx.locks.acquire([LockKey::Folder(parent.id)]).await;

		match self.occupant(parent.id, name).await? {
			Some(Occupant::Folder(folder)) => Ok(folder),
			Some(Occupant::File(_)) => Err(Error::Conflict(format!(
				"a file named '{name}' already exists"
			))),
			None => {
				let folder = self
					.ctx
					.store
					.create_folder(NewFolder {
						name: name.to_string(),
						parent_id: parent.id,
						owner_id: self.user.id,
					})
					.await?;

				self.invalidate_props([parent.id]).await;

				Ok(folder)
			}
		}
	}
}
