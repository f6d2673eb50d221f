//! Request facing item operations.
//!
//! Every action decodes the opaque ids, runs the quota pre-flight, then either calls the
//! filesystem directly or submits a background job, and answers with a [`Response`]. The
//! explorer owns no state of its own beyond the task engine it drives.

use std::sync::Arc;

use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
	archive::{has_suffix, ArchiveFormat},
	context::CoreContext,
	hashid::{HashIdCodec, ObjectKind},
	jobs::{CompressJob, DecompressJob, Job, TaskEngine},
	model::{TaskRecord, UserId},
	quota::{estimate_compressed, preflight, Capability, Requirement, SizeLimit},
	vfs::{
		props_cache_key,
		validation::{check_extension, validate_name},
		FileSystem, FolderStats,
	},
	Error,
};

mod archive;
mod requests;
mod response;

pub use archive::ArchiveSession;
pub use requests::{
	ItemCompressRequest, ItemDecompressRequest, ItemDeleteRequest, ItemIds, ItemMoveRequest,
	ItemPropertyRequest, ItemRenameRequest,
};
pub use response::{ObjectProps, Response};

/// Folder statistics as kept in the cache
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
struct CachedStats {
	stats: FolderStats,
	computed_at: chrono::DateTime<chrono::Utc>,
}

pub struct Explorer {
	ctx: Arc<CoreContext>,
	hashids: HashIdCodec,
	engine: TaskEngine,
}

impl std::fmt::Debug for Explorer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Explorer")
			.field("engine", &self.engine)
			.finish_non_exhaustive()
	}
}

impl Explorer {
	/// Starts the task engine, so it must be called from within a tokio runtime
	#[must_use]
	pub fn new(ctx: Arc<CoreContext>) -> Self {
		Self {
			hashids: HashIdCodec::new(&ctx.config.hashid_secret),
			engine: TaskEngine::new(Arc::clone(&ctx)),
			ctx,
		}
	}

	#[must_use]
	pub const fn hashids(&self) -> &HashIdCodec {
		&self.hashids
	}

	#[must_use]
	pub const fn context(&self) -> &Arc<CoreContext> {
		&self.ctx
	}

	pub async fn shutdown(&self) {
		self.engine.shutdown().await;
	}

	/// Creates a one-time archive download session and answers with its signed url
	#[instrument(skip(self, ids))]
	pub async fn archive(&self, user_id: UserId, ids: &ItemIds) -> Response {
		self.try_archive(user_id, ids).await.into()
	}

	/// Builds the archive behind a signed url issued by [`Explorer::archive`].
	///
	/// The session is consumed, a second download of the same url fails with `NotFound`.
	#[instrument(skip_all)]
	pub async fn download_archive(&self, signed_uri: &str) -> Result<Vec<u8>, Error> {
		let path = self
			.ctx
			.signer
			.verify(signed_uri)
			.map_err(|e| Error::NotFound(format!("archive link is not valid: {e}")))?;

		let id = ArchiveSession::id_from_path(
			&path,
			&self.ctx.config.archive_route,
			self.ctx.codec.extension(),
		)
		.ok_or_else(|| Error::NotFound("archive link is not valid".to_string()))?;

		let session = self
			.ctx
			.cache
			.take::<ArchiveSession>(&ArchiveSession::cache_key(id))
			.ok_or_else(|| Error::NotFound("archive session expired or already used".to_string()))?;

		let fs = FileSystem::new(&self.ctx, session.owner_id).await?;
		preflight(
			fs.user(),
			&[Requirement::Capability(Capability::ArchiveDownload)],
		)
		.into_result()?;

		let (folders, files) = fs.resolve(&session.selection, None).await?;
		let items = fs.archive_items(&folders, &files).await?;

		let mut writer = self.ctx.codec.open_for_write();
		for item in &items {
			writer.append(&item.path, &fs.content(&item.file).await?)?;
		}

		Ok(writer.finish()?)
	}

	#[instrument(skip(self, request))]
	pub async fn compress(&self, user_id: UserId, request: &ItemCompressRequest) -> Response {
		self.try_compress(user_id, request).await.into()
	}

	#[instrument(skip(self, request))]
	pub async fn decompress(&self, user_id: UserId, request: &ItemDecompressRequest) -> Response {
		self.try_decompress(user_id, request).await.into()
	}

	#[instrument(skip(self, request))]
	pub async fn delete(&self, user_id: UserId, request: &ItemDeleteRequest) -> Response {
		self.try_delete(user_id, request).await.into()
	}

	#[instrument(skip(self, request))]
	pub async fn move_items(&self, user_id: UserId, request: &ItemMoveRequest) -> Response {
		self.try_move(user_id, request).await.into()
	}

	#[instrument(skip(self, request))]
	pub async fn copy(&self, user_id: UserId, request: &ItemMoveRequest) -> Response {
		self.try_copy(user_id, request).await.into()
	}

	#[instrument(skip(self, request))]
	pub async fn rename(&self, user_id: UserId, request: &ItemRenameRequest) -> Response {
		self.try_rename(user_id, request).await.into()
	}

	#[instrument(skip(self, request))]
	pub async fn property(&self, user_id: UserId, request: &ItemPropertyRequest) -> Response {
		self.try_property(user_id, request).await.into()
	}

	/// A task of this user, by id
	pub async fn task(&self, user_id: UserId, task_id: &str) -> Response {
		self.try_task(user_id, task_id).await.into()
	}

	/// Every task of this user, newest first
	pub async fn tasks(&self, user_id: UserId) -> Response {
		Response::from(
			self.ctx
				.store
				.list_tasks(user_id)
				.await
				.map_err(Error::from),
		)
	}

	async fn try_archive(&self, user_id: UserId, ids: &ItemIds) -> Result<String, Error> {
		let fs = FileSystem::new(&self.ctx, user_id).await?;
		preflight(
			fs.user(),
			&[Requirement::Capability(Capability::ArchiveDownload)],
		)
		.into_result()?;

		let selection = ids.decode(&self.hashids)?;
		if selection.is_empty() {
			return Err(Error::ParamInvalid("nothing selected".to_string()));
		}
		fs.resolve(&selection, None).await?;

		let ttl = self.ctx.config.archive_ttl();
		let now = self.ctx.cache.clock().now();
		let expires_at = chrono::TimeDelta::from_std(ttl)
			.ok()
			.and_then(|ttl| now.checked_add_signed(ttl))
			.unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
		let session = ArchiveSession::new(user_id, selection, expires_at);

		self.ctx
			.cache
			.set(ArchiveSession::cache_key(&session.id), &session, ttl)?;

		let path = session.download_path(&self.ctx.config.archive_route, self.ctx.codec.extension());

		Ok(self.ctx.signer.sign(&path, ttl))
	}

	async fn try_compress(
		&self,
		user_id: UserId,
		request: &ItemCompressRequest,
	) -> Result<TaskRecord, Error> {
		let fs = FileSystem::new(&self.ctx, user_id).await?;
		preflight(fs.user(), &[Requirement::Capability(Capability::ArchiveTask)]).into_result()?;

		let selection = request.src.decode(&self.hashids)?;
		if selection.is_empty() {
			return Err(Error::ParamInvalid("nothing selected".to_string()));
		}

		let (folders, files) = fs.resolve(&selection, None).await?;
		let dst = fs.folder_at(&request.dst).await?;

		let extension = self.ctx.codec.extension();
		let name = if has_suffix(&request.name, extension) {
			request.name.clone()
		} else {
			format!("{}{extension}", request.name)
		};
		validate_name(&name)?;
		check_extension(&fs.policy().await?, &name)?;
		fs.ensure_name_free(dst.id, &name).await?;

		let total = fs
			.archive_items(&folders, &files)
			.await?
			.iter()
			.map(|item| item.file.size)
			.sum::<u64>();

		preflight(
			&fs.fresh_user().await?,
			&[
				Requirement::SizeWithin(SizeLimit::Compress, total),
				Requirement::Headroom(estimate_compressed(total, self.ctx.config.compress_ratio)),
			],
		)
		.into_result()?;

		self.engine
			.submit(
				user_id,
				Job::Compress(CompressJob {
					selection,
					dst: request.dst.clone(),
					name,
				}),
			)
			.await
	}

	async fn try_decompress(
		&self,
		user_id: UserId,
		request: &ItemDecompressRequest,
	) -> Result<TaskRecord, Error> {
		let fs = FileSystem::new(&self.ctx, user_id).await?;
		preflight(fs.user(), &[Requirement::Capability(Capability::Decompress)]).into_result()?;

		fs.folder_at(&request.dst).await?;
		let file = fs.file_at(&request.src).await?;

		preflight(
			fs.user(),
			&[Requirement::SizeWithin(SizeLimit::Decompress, file.size)],
		)
		.into_result()?;

		if ArchiveFormat::from_name(&file.name).is_none() {
			return Err(Error::ParamInvalid(format!(
				"'{}' is not a supported archive",
				file.name
			)));
		}

		self.engine
			.submit(
				user_id,
				Job::Decompress(DecompressJob {
					src: request.src.clone(),
					dst: request.dst.clone(),
					encoding: request.encoding.clone().filter(|e| !e.is_empty()),
				}),
			)
			.await
	}

	async fn try_delete(&self, user_id: UserId, request: &ItemDeleteRequest) -> Result<(), Error> {
		let selection = request.items.decode(&self.hashids)?;
		FileSystem::new(&self.ctx, user_id)
			.await?
			.delete(&selection, request.force)
			.await
	}

	async fn try_move(&self, user_id: UserId, request: &ItemMoveRequest) -> Result<(), Error> {
		let selection = request.src.decode(&self.hashids)?;
		FileSystem::new(&self.ctx, user_id)
			.await?
			.move_items(&selection, &request.src_dir, &request.dst)
			.await
	}

	async fn try_copy(&self, user_id: UserId, request: &ItemMoveRequest) -> Result<(), Error> {
		let fs = FileSystem::new(&self.ctx, user_id).await?;
		preflight(fs.user(), &[Requirement::SingleObject(request.src.len())]).into_result()?;

		let selection = request.src.decode(&self.hashids)?;
		fs.copy_items(&selection, &request.src_dir, &request.dst)
			.await
	}

	async fn try_rename(&self, user_id: UserId, request: &ItemRenameRequest) -> Result<(), Error> {
		let fs = FileSystem::new(&self.ctx, user_id).await?;
		preflight(fs.user(), &[Requirement::SingleObject(request.src.len())]).into_result()?;

		let selection = request.src.decode(&self.hashids)?;
		fs.rename(&selection, &request.new_name).await
	}

	async fn try_property(
		&self,
		user_id: UserId,
		request: &ItemPropertyRequest,
	) -> Result<ObjectProps, Error> {
		let fs = FileSystem::new(&self.ctx, user_id).await?;

		if request.is_folder {
			let folder = fs
				.folder(self.hashids.decode(&request.id, ObjectKind::Folder)?)
				.await?;

			let key = props_cache_key(folder.id);
			let cached = match self.ctx.cache.get::<CachedStats>(&key) {
				Some(cached) => cached,
				None => {
					// Stats computed across an eviction may be stale and are not cached
					let generation = self.ctx.cache.generation();
					let cached = CachedStats {
						stats: fs.folder_stats(&folder).await?,
						computed_at: self.ctx.cache.clock().now(),
					};
					if let Err(e) = self.ctx.cache.set_unless_invalidated(
						key,
						&cached,
						self.ctx.config.folder_props_ttl(),
						generation,
					) {
						warn!(?e, "Failed to cache folder statistics;");
					}
					cached
				}
			};

			let path = if request.trace_root {
				match folder.parent_id {
					Some(parent) => fs.trace_root(parent).await?,
					None => "/".to_string(),
				}
			} else {
				String::new()
			};

			Ok(ObjectProps {
				created_at: folder.created_at,
				updated_at: folder.updated_at,
				policy: String::new(),
				size: cached.stats.size,
				child_folder_num: cached.stats.child_folder_num,
				child_file_num: cached.stats.child_file_num,
				path,
				query_date: cached.computed_at,
			})
		} else {
			let file = fs
				.file(self.hashids.decode(&request.id, ObjectKind::File)?)
				.await?;
			let policy = self.ctx.store.get_policy(file.policy_id).await?;

			let path = if request.trace_root {
				fs.trace_root(file.folder_id).await?
			} else {
				String::new()
			};

			Ok(ObjectProps {
				created_at: file.created_at,
				updated_at: file.updated_at,
				policy: policy.name,
				size: file.size,
				child_folder_num: 0,
				child_file_num: 0,
				path,
				query_date: self.ctx.cache.clock().now(),
			})
		}
	}

	async fn try_task(&self, user_id: UserId, task_id: &str) -> Result<TaskRecord, Error> {
		let not_found = || Error::NotFound(format!("task <id='{task_id}'> not found"));

		let id = Uuid::parse_str(task_id).map_err(|_| not_found())?;
		let record = self.ctx.store.get_task(id).await?;

		if record.owner_id == user_id {
			Ok(record)
		} else {
			Err(not_found())
		}
	}
}
