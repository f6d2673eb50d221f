use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use super::{props_cache_key, FileSystem, ItemSelection, Outcome};
use crate::{
	model::{File, FolderId, PolicyId},
	Error,
};

impl FileSystem<'_> {
	/// Deletes the selection and everything below the selected folders.
	///
	/// Backend objects are released once no surviving record references them. When the
	/// backend refuses, `force` still drops the records; otherwise the affected files stay,
	/// together with the folders leading to them, and the rest of the selection goes ahead.
	pub async fn delete(&self, selection: &ItemSelection, force: bool) -> Result<(), Error> {
		let _guard = self.ctx.locks.acquire(selection.lock_keys()).await;

		let (folders, files) = self.resolve(selection, None).await?;

		if folders.iter().any(|folder| folder.is_root()) {
			return Err(Error::ParamInvalid(
				"the root folder cannot be deleted".to_string(),
			));
		}

		let tree = self.child_folders(&folders).await?;

		let mut seen = HashSet::new();
		let doomed = files
			.into_iter()
			.chain(self.child_files(&tree).await?)
			.filter(|file| seen.insert(file.id))
			.collect::<Vec<_>>();

		let mut by_object = HashMap::<(PolicyId, String), Vec<File>>::new();
		for file in doomed {
			by_object
				.entry((file.policy_id, file.source_name.clone()))
				.or_default()
				.push(file);
		}

		let mut removed = Vec::new();
		let mut kept = Vec::new();
		let mut cause = None;

		for ((policy_id, source_name), group) in by_object {
			match self.release_object(policy_id, &source_name, group.len()).await {
				Ok(()) => removed.extend(group),
				Err(e) if force => {
					warn!(%source_name, ?e, "Backend failed to delete object, dropping its records anyway;");
					removed.extend(group);
				}
				Err(e) => {
					warn!(%source_name, ?e, "Backend failed to delete object, keeping its records;");
					kept.extend(group);
					cause.get_or_insert(e);
				}
			}
		}

		let removed_ids = removed.iter().map(|file| file.id).collect::<Vec<_>>();
		self.ctx.store.delete_files(&removed_ids).await?;

		let freed = removed.iter().map(|file| file.size).sum::<u64>();
		self.ctx
			.store
			.adjust_storage(self.user.id, -i64::try_from(freed).unwrap_or(i64::MAX))
			.await?;

		// Folders still holding a kept file survive, and so does the path down to them
		let parents = tree
			.iter()
			.map(|folder| (folder.id, folder.parent_id))
			.collect::<HashMap<_, _>>();
		let mut surviving = HashSet::<FolderId>::new();
		for file in &kept {
			let mut next = Some(file.folder_id);
			while let Some(id) = next {
				if !parents.contains_key(&id) || !surviving.insert(id) {
					break;
				}
				next = parents.get(&id).copied().flatten();
			}
		}

		let removed_folders = tree
			.iter()
			.map(|folder| folder.id)
			.filter(|id| !surviving.contains(id))
			.collect::<Vec<_>>();
		self.ctx.store.delete_folders(&removed_folders).await?;

		debug!(
			user_id = self.user.id,
			files = removed_ids.len(),
			folders = removed_folders.len(),
			freed,
			kept = kept.len(),
			"Objects deleted"
		);

		self.ctx
			.cache
			.delete(removed_folders.iter().map(|id| props_cache_key(*id)));
		self.invalidate_props(
			folders
				.iter()
				.filter_map(|folder| folder.parent_id)
				.chain(removed.iter().chain(&kept).map(|file| file.folder_id))
				.filter(|id| !removed_folders.contains(id))
				.collect::<Vec<_>>(),
		)
		.await;

		Outcome {
			done: removed_ids.len(),
			failed: kept.into_iter().map(|file| file.name).collect(),
			cause,
		}
		.into_result()
	}

	/// Frees a backend object unless records outside this batch still point at it.
	/// A backend that no longer has the object is treated as success.
	async fn release_object(
		&self,
		policy_id: PolicyId,
		source_name: &str,
		batch_refs: usize,
	) -> Result<(), Error> {
		let refs = self
			.ctx
			.store
			.count_source_references(policy_id, source_name)
			.await?;

		if refs > batch_refs {
			trace!(%source_name, refs, batch_refs, "Object still referenced, keeping it");
			return Ok(());
		}

		let policy = self.ctx.store.get_policy(policy_id).await?;
		match self
			.ctx
			.backends
			.get(&policy.backend)?
			.delete(source_name)
			.await
		{
			Ok(()) => Ok(()),
			Err(e) if e.is_not_found() => {
				debug!(%source_name, "Object already gone from backend");
				Ok(())
			}
			Err(e) => Err(e.into()),
		}
	}
}
