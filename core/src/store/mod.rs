//! Persistence capability consumed by the virtual filesystem and the task engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
	File, FileId, Folder, FolderId, NewFile, NewFolder, PolicyId, StoragePolicy, TaskId, TaskRecord,
	TaskUpdate, User, UserId,
};

mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
	/// An ordinary miss, distinguishable from transient failures
	#[error("{0} not found")]
	NotFound(String),
	#[error("{0} already exists")]
	Conflict(String),
	#[error("task <id='{id}'> cannot leave terminal state {from:?}")]
	InvalidTransition {
		id: TaskId,
		from: crate::model::TaskState,
	},
	#[error("store unavailable: {0}")]
	Unavailable(String),
}

/// Record storage for users, policies, the folder tree and task history.
///
/// Lookups by id lists are filtered by owner and silently skip ids that do not match, callers
/// compare lengths to detect foreign or missing objects. Child queries return records ordered
/// by id.
#[async_trait]
pub trait Store: Send + Sync + 'static {
	async fn get_user(&self, id: UserId) -> Result<User, StoreError>;

	/// Adds `delta` bytes (negative to release) to the user's used storage, saturating at 0
	async fn adjust_storage(&self, id: UserId, delta: i64) -> Result<(), StoreError>;

	async fn get_policy(&self, id: PolicyId) -> Result<StoragePolicy, StoreError>;

	async fn get_root_folder(&self, owner: UserId) -> Result<Folder, StoreError>;

	async fn get_folders_by_ids(
		&self,
		ids: &[FolderId],
		owner: UserId,
	) -> Result<Vec<Folder>, StoreError>;

	async fn get_files_by_ids(&self, ids: &[FileId], owner: UserId) -> Result<Vec<File>, StoreError>;

	async fn get_child_folders(&self, parent_ids: &[FolderId]) -> Result<Vec<Folder>, StoreError>;

	async fn get_child_files(&self, folder_ids: &[FolderId]) -> Result<Vec<File>, StoreError>;

	async fn get_child_folder(
		&self,
		parent: FolderId,
		name: &str,
	) -> Result<Option<Folder>, StoreError>;

	async fn get_child_file(&self, folder: FolderId, name: &str)
		-> Result<Option<File>, StoreError>;

	async fn create_folder(&self, new: NewFolder) -> Result<Folder, StoreError>;

	async fn create_file(&self, new: NewFile) -> Result<File, StoreError>;

	async fn move_folder(&self, id: FolderId, new_parent: FolderId) -> Result<(), StoreError>;

	async fn move_file(&self, id: FileId, new_folder: FolderId) -> Result<(), StoreError>;

	async fn rename_folder(&self, id: FolderId, name: &str) -> Result<(), StoreError>;

	async fn rename_file(&self, id: FileId, name: &str) -> Result<(), StoreError>;

	async fn delete_files(&self, ids: &[FileId]) -> Result<(), StoreError>;

	async fn delete_folders(&self, ids: &[FolderId]) -> Result<(), StoreError>;

	/// How many file records point at `source_name` within `policy`
	async fn count_source_references(
		&self,
		policy: PolicyId,
		source_name: &str,
	) -> Result<usize, StoreError>;

	async fn insert_task(&self, record: TaskRecord) -> Result<(), StoreError>;

	async fn get_task(&self, id: TaskId) -> Result<TaskRecord, StoreError>;

	/// Newest first
	async fn list_tasks(&self, owner: UserId) -> Result<Vec<TaskRecord>, StoreError>;

	/// Fails with [`StoreError::InvalidTransition`] once the task is terminal
	async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<TaskRecord, StoreError>;

	async fn delete_task(&self, id: TaskId) -> Result<(), StoreError>;
}
