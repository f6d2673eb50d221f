use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type UserId = u64;
pub type GroupId = u64;
pub type PolicyId = u64;
pub type FolderId = u64;
pub type FileId = u64;
pub type TaskId = Uuid;

/// Capability flags and size ceilings of a user group. A ceiling of `0` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOptions {
	pub archive_download: bool,
	pub archive_task: bool,
	pub compress_size: u64,
	pub decompress_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
	pub id: GroupId,
	pub name: String,
	/// Total bytes the group's users may store
	pub max_storage: u64,
	pub options: GroupOptions,
}

/// How a copy treats the bytes of the source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
	/// The copy shares the backend object; it is freed once no record references it
	#[default]
	Reference,
	/// The backend object is duplicated
	Physical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePolicy {
	pub id: PolicyId,
	pub name: String,
	/// Name of the backend in the [`Backends`](crate::backend::Backends) registry
	pub backend: String,
	/// Largest single file, `0` for no limit
	pub max_size: u64,
	/// Lower-case extensions without the dot; empty allows everything
	pub allowed_extensions: Vec<String>,
	pub copy_mode: CopyMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	pub nick: String,
	pub group: Group,
	pub policy_id: PolicyId,
	/// Bytes currently accounted to this user
	pub storage_used: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
	pub id: FolderId,
	pub name: String,
	/// `None` only for a user's root folder
	pub parent_id: Option<FolderId>,
	pub owner_id: UserId,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Folder {
	#[must_use]
	pub const fn is_root(&self) -> bool {
		self.parent_id.is_none()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
	pub id: FileId,
	pub name: String,
	/// Object path inside the policy's backend, shared by reference copies
	pub source_name: String,
	pub size: u64,
	pub folder_id: FolderId,
	pub owner_id: UserId,
	pub policy_id: PolicyId,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Values needed to create a folder record; the store assigns id and timestamps
#[derive(Debug, Clone)]
pub struct NewFolder {
	pub name: String,
	pub parent_id: FolderId,
	pub owner_id: UserId,
}

#[derive(Debug, Clone)]
pub struct NewFile {
	pub name: String,
	pub source_name: String,
	pub size: u64,
	pub folder_id: FolderId,
	pub owner_id: UserId,
	pub policy_id: PolicyId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
	Compress,
	Decompress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
	Queued,
	Running,
	Succeeded,
	Failed,
}

impl TaskState {
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Succeeded | Self::Failed)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
	pub done: u64,
	pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
	pub id: TaskId,
	pub owner_id: UserId,
	pub kind: TaskKind,
	pub params: Value,
	pub state: TaskState,
	pub progress: TaskProgress,
	pub error: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Partial update applied to a [`TaskRecord`]
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
	pub state: Option<TaskState>,
	pub progress: Option<TaskProgress>,
	pub error: Option<String>,
}

impl TaskUpdate {
	#[must_use]
	pub fn state(state: TaskState) -> Self {
		Self {
			state: Some(state),
			..Default::default()
		}
	}

	#[must_use]
	pub fn progress(done: u64, total: u64) -> Self {
		Self {
			progress: Some(TaskProgress { done, total }),
			..Default::default()
		}
	}

	#[must_use]
	pub fn failed(error: impl Into<String>) -> Self {
		Self {
			state: Some(TaskState::Failed),
			error: Some(error.into()),
			..Default::default()
		}
	}
}
