//! Per-user logical filesystem over the record store and the storage backends.
//!
//! A [`FileSystem`] is cheap and short lived: build one per request or job with the acting
//! user. It holds no state besides that user, every call reads the store.

use std::collections::HashSet;

use futures::future::try_join;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use uuid::Uuid;

use crate::{
	context::CoreContext,
	model::{File, FileId, Folder, FolderId, StoragePolicy, User, UserId},
	Error,
};

mod copy;
mod delete;
mod locks;
mod lookup;
mod relocate;
mod rename;
mod upload;
pub mod validation;
mod walk;

pub use locks::{LockGuard, LockKey, LockTable};
pub use lookup::{split_file_path, Occupant};
pub use walk::{ArchiveItem, FolderStats};

/// Decoded object ids picked by a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSelection {
	pub dirs: Vec<FolderId>,
	pub items: Vec<FileId>,
}

impl ItemSelection {
	#[must_use]
	pub fn len(&self) -> usize {
		self.dirs.len() + self.items.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.dirs.is_empty() && self.items.is_empty()
	}

	fn lock_keys(&self) -> impl Iterator<Item = LockKey> + '_ {
		self.dirs
			.iter()
			.copied()
			.map(LockKey::Folder)
			.chain(self.items.iter().copied().map(LockKey::File))
	}
}

/// Cache key of the aggregate statistics of a folder
#[must_use]
pub fn props_cache_key(folder_id: FolderId) -> String {
	format!("folder_props_{folder_id}")
}

pub struct FileSystem<'a> {
	ctx: &'a CoreContext,
	user: User,
}

impl std::fmt::Debug for FileSystem<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FileSystem")
			.field("user_id", &self.user.id)
			.finish_non_exhaustive()
	}
}

impl<'a> FileSystem<'a> {
	pub async fn new(ctx: &'a CoreContext, user_id: UserId) -> Result<Self, Error> {
		let user = ctx.store.get_user(user_id).await?;
		Ok(Self { ctx, user })
	}

	#[must_use]
	pub const fn user(&self) -> &User {
		&self.user
	}

	/// The user record as the store has it right now, for quota decisions
	pub async fn fresh_user(&self) -> Result<User, Error> {
		Ok(self.ctx.store.get_user(self.user.id).await?)
	}

	pub async fn policy(&self) -> Result<StoragePolicy, Error> {
		Ok(self.ctx.store.get_policy(self.user.policy_id).await?)
	}

	/// Loads every selected object owned by the user. With `parent`, each must also sit
	/// directly inside it. Anything missing makes the whole selection [`Error::NotFound`].
	pub async fn resolve(
		&self,
		selection: &ItemSelection,
		parent: Option<&Folder>,
	) -> Result<(Vec<Folder>, Vec<File>), Error> {
		let dirs = unique(&selection.dirs);
		let items = unique(&selection.items);

		let (folders, files) = try_join(
			self.ctx.store.get_folders_by_ids(&dirs, self.user.id),
			self.ctx.store.get_files_by_ids(&items, self.user.id),
		)
		.await?;

		let inside_parent = parent.map_or(true, |parent| {
			folders.iter().all(|f| f.parent_id == Some(parent.id))
				&& files.iter().all(|f| f.folder_id == parent.id)
		});

		if folders.len() != dirs.len() || files.len() != items.len() || !inside_parent {
			return Err(Error::NotFound("some selected objects do not exist".into()));
		}

		Ok((folders, files))
	}

	/// Evicts cached statistics of `folders` and of all their ancestors
	pub async fn invalidate_props(&self, folders: impl IntoIterator<Item = FolderId>) {
		let mut evicted = HashSet::new();

		for folder_id in folders {
			if evicted.contains(&folder_id) {
				continue;
			}

			let chain = match self.ancestor_ids(folder_id).await {
				Ok(chain) => chain,
				Err(e) => {
					// The folder is gone; its ancestors were evicted through its parent
					trace!(%folder_id, ?e, "Could not walk up from folder while evicting stats");
					vec![folder_id]
				}
			};

			evicted.extend(chain);
		}

		self.ctx.cache.delete(evicted.iter().map(|id| props_cache_key(*id)));
	}
}

/// Fresh backend path for a new object owned by `user_id`
pub(crate) fn object_path(user_id: UserId, name: &str) -> String {
	format!("{user_id}/{}_{name}", Uuid::new_v4().simple())
}

/// Per-object results of a multi-object mutation
#[derive(Debug, Default)]
struct Outcome {
	done: usize,
	failed: Vec<String>,
	cause: Option<Error>,
}

impl Outcome {
	fn record(&mut self, name: &str, res: Result<(), Error>) {
		match res {
			Ok(()) => self.done += 1,
			Err(e) => {
				warn!(%name, ?e, "Object could not be processed;");
				self.failed.push(name.to_string());
				self.cause.get_or_insert(e);
			}
		}
	}

	/// A lone failure keeps its own error, anything partial names what failed
	fn into_result(self) -> Result<(), Error> {
		match self.cause {
			None => Ok(()),
			Some(cause) if self.done == 0 && self.failed.len() == 1 => Err(cause),
			Some(cause) => Err(Error::Incomplete {
				failed: self.failed,
				cause: Box::new(cause),
			}),
		}
	}
}

fn unique(ids: &[u64]) -> Vec<u64> {
	let mut seen = HashSet::with_capacity(ids.len());
	ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
