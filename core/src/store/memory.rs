use std::{
	collections::{BTreeMap, HashMap},
	sync::Arc,
};

use async_trait::async_trait;
use cumulus_cache::{Clock, SystemClock};
use parking_lot::RwLock;

use super::{Store, StoreError};
use crate::model::{
	File, FileId, Folder, FolderId, Group, NewFile, NewFolder, PolicyId, StoragePolicy, TaskId,
	TaskRecord, TaskUpdate, User, UserId,
};

#[derive(Debug, Default)]
struct Tables {
	last_id: u64,
	users: HashMap<UserId, User>,
	policies: HashMap<PolicyId, StoragePolicy>,
	folders: BTreeMap<FolderId, Folder>,
	files: BTreeMap<FileId, File>,
	tasks: HashMap<TaskId, TaskRecord>,
}

impl Tables {
	fn next_id(&mut self) -> u64 {
		self.last_id += 1;
		self.last_id
	}

	fn name_taken_by_folder(&self, parent: FolderId, name: &str, except: Option<FolderId>) -> bool {
		self.folders.values().any(|folder| {
			folder.parent_id == Some(parent) && folder.name == name && Some(folder.id) != except
		})
	}

	fn name_taken_by_file(&self, folder_id: FolderId, name: &str, except: Option<FileId>) -> bool {
		self.files.values().any(|file| {
			file.folder_id == folder_id && file.name == name && Some(file.id) != except
		})
	}
}

/// [`Store`] kept entirely in memory, for tests and single node scratch setups.
///
/// Names are unique per kind within a folder, like a unique index would enforce.
pub struct MemoryStore {
	tables: RwLock<Tables>,
	clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let tables = self.tables.read();
		f.debug_struct("MemoryStore")
			.field("users", &tables.users.len())
			.field("folders", &tables.folders.len())
			.field("files", &tables.files.len())
			.field("tasks", &tables.tasks.len())
			.finish_non_exhaustive()
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}

	#[must_use]
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self {
			tables: RwLock::default(),
			clock,
		}
	}

	pub fn insert_policy(&self, policy: StoragePolicy) {
		self.tables.write().policies.insert(policy.id, policy);
	}

	/// Creates a user with an empty root folder and returns both
	pub fn insert_user(&self, nick: &str, group: Group, policy_id: PolicyId) -> (User, Folder) {
		let now = self.clock.now();
		let mut tables = self.tables.write();

		let user = User {
			id: tables.next_id(),
			nick: nick.to_string(),
			group,
			policy_id,
			storage_used: 0,
		};

		let root = Folder {
			id: tables.next_id(),
			name: "/".to_string(),
			parent_id: None,
			owner_id: user.id,
			created_at: now,
			updated_at: now,
		};

		tables.users.insert(user.id, user.clone());
		tables.folders.insert(root.id, root.clone());

		(user, root)
	}

	/// Replaces the group of an existing user
	pub fn set_group(&self, user_id: UserId, group: Group) -> Result<(), StoreError> {
		let mut tables = self.tables.write();
		let user = tables
			.users
			.get_mut(&user_id)
			.ok_or_else(|| StoreError::NotFound(format!("user <id='{user_id}'>")))?;
		user.group = group;
		Ok(())
	}
}

#[async_trait]
impl Store for MemoryStore {
	async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
		self.tables
			.read()
			.users
			.get(&id)
			.cloned()
			.ok_or_else(|| StoreError::NotFound(format!("user <id='{id}'>")))
	}

	async fn adjust_storage(&self, id: UserId, delta: i64) -> Result<(), StoreError> {
		let mut tables = self.tables.write();
		let user = tables
			.users
			.get_mut(&id)
			.ok_or_else(|| StoreError::NotFound(format!("user <id='{id}'>")))?;

		user.storage_used = if delta >= 0 {
			user.storage_used.saturating_add(delta.unsigned_abs())
		} else {
			user.storage_used.saturating_sub(delta.unsigned_abs())
		};

		Ok(())
	}

	async fn get_policy(&self, id: PolicyId) -> Result<StoragePolicy, StoreError> {
		self.tables
			.read()
			.policies
			.get(&id)
			.cloned()
			.ok_or_else(|| StoreError::NotFound(format!("storage policy <id='{id}'>")))
	}

	async fn get_root_folder(&self, owner: UserId) -> Result<Folder, StoreError> {
		self.tables
			.read()
			.folders
			.values()
			.find(|folder| folder.owner_id == owner && folder.is_root())
			.cloned()
			.ok_or_else(|| StoreError::NotFound(format!("root folder of user <id='{owner}'>")))
	}

	async fn get_folders_by_ids(
		&self,
		ids: &[FolderId],
		owner: UserId,
	) -> Result<Vec<Folder>, StoreError> {
		let tables = self.tables.read();
		Ok(ids
			.iter()
			.filter_map(|id| tables.folders.get(id))
			.filter(|folder| folder.owner_id == owner)
			.cloned()
			.collect())
	}

	async fn get_files_by_ids(&self, ids: &[FileId], owner: UserId) -> Result<Vec<File>, StoreError> {
		let tables = self.tables.read();
		Ok(ids
			.iter()
			.filter_map(|id| tables.files.get(id))
			.filter(|file| file.owner_id == owner)
			.cloned()
			.collect())
	}

	async fn get_child_folders(&self, parent_ids: &[FolderId]) -> Result<Vec<Folder>, StoreError> {
		Ok(self
			.tables
			.read()
			.folders
			.values()
			.filter(|folder| folder.parent_id.is_some_and(|parent| parent_ids.contains(&parent)))
			.cloned()
			.collect())
	}

	async fn get_child_files(&self, folder_ids: &[FolderId]) -> Result<Vec<File>, StoreError> {
		Ok(self
			.tables
			.read()
			.files
			.values()
			.filter(|file| folder_ids.contains(&file.folder_id))
			.cloned()
			.collect())
	}

	async fn get_child_folder(
		&self,
		parent: FolderId,
		name: &str,
	) -> Result<Option<Folder>, StoreError> {
		Ok(self
			.tables
			.read()
			.folders
			.values()
			.find(|folder| folder.parent_id == Some(parent) && folder.name == name)
			.cloned())
	}

	async fn get_child_file(
		&self,
		folder: FolderId,
		name: &str,
	) -> Result<Option<File>, StoreError> {
		Ok(self
			.tables
			.read()
			.files
			.values()
			.find(|file| file.folder_id == folder && file.name == name)
			.cloned())
	}

	async fn create_folder(&self, new: NewFolder) -> Result<Folder, StoreError> {
		let now = self.clock.now();
		let mut tables = self.tables.write();

		if !tables.folders.contains_key(&new.parent_id) {
			return Err(StoreError::NotFound(format!("folder <id='{}'>", new.parent_id)));
		}
		if tables.name_taken_by_folder(new.parent_id, &new.name, None) {
			return Err(StoreError::Conflict(format!("folder '{}'", new.name)));
		}

		let folder = Folder {
			id: tables.next_id(),
			name: new.name,
			parent_id: Some(new.parent_id),
			owner_id: new.owner_id,
			created_at: now,
			updated_at: now,
		};
		tables.folders.insert(folder.id, folder.clone());

		Ok(folder)
	}

	async fn create_file(&self, new: NewFile) -> Result<File, StoreError> {
		let now = self.clock.now();
		let mut tables = self.tables.write();

		if !tables.folders.contains_key(&new.folder_id) {
			return Err(StoreError::NotFound(format!("folder <id='{}'>", new.folder_id)));
		}
		if tables.name_taken_by_file(new.folder_id, &new.name, None) {
			return Err(StoreError::Conflict(format!("file '{}'", new.name)));
		}

		let file = File {
			id: tables.next_id(),
			name: new.name,
			source_name: new.source_name,
			size: new.size,
			folder_id: new.folder_id,
			owner_id: new.owner_id,
			policy_id: new.policy_id,
			created_at: now,
			updated_at: now,
		};
		tables.files.insert(file.id, file.clone());

		Ok(file)
	}

	async fn move_folder(&self, id: FolderId, new_parent: FolderId) -> Result<(), StoreError> {
		let now = self.clock.now();
		let mut tables = self.tables.write();

		let name = tables
			.folders
			.get(&id)
			.map(|folder| folder.name.clone())
			.ok_or_else(|| StoreError::NotFound(format!("folder <id='{id}'>")))?;
		if !tables.folders.contains_key(&new_parent) {
			return Err(StoreError::NotFound(format!("folder <id='{new_parent}'>")));
		}
		if tables.name_taken_by_folder(new_parent, &name, Some(id)) {
			return Err(StoreError::Conflict(format!("folder '{name}'")));
		}

		if let Some(folder) = tables.folders.get_mut(&id) {
			folder.parent_id = Some(new_parent);
			folder.updated_at = now;
		}

		Ok(())
	}

	async fn move_file(&self, id: FileId, new_folder: FolderId) -> Result<(), StoreError> {
		let now = self.clock.now();
		let mut tables = self.tables.write();

		let name = tables
			.files
			.get(&id)
			.map(|file| file.name.clone())
			.ok_or_else(|| StoreError::NotFound(format!("file <id='{id}'>")))?;
		if !tables.folders.contains_key(&new_folder) {
			return Err(StoreError::NotFound(format!("folder <id='{new_folder}'>")));
		}
		if tables.name_taken_by_file(new_folder, &name, Some(id)) {
			return Err(StoreError::Conflict(format!("file '{name}'")));
		}

		if let Some(file) = tables.files.get_mut(&id) {
			file.folder_id = new_folder;
			file.updated_at = now;
		}

		Ok(())
	}

	async fn rename_folder(&self, id: FolderId, name: &str) -> Result<(), StoreError> {
		let now = self.clock.now();
		let mut tables = self.tables.write();

		let parent = tables
			.folders
			.get(&id)
			.ok_or_else(|| StoreError::NotFound(format!("folder <id='{id}'>")))?
			.parent_id;
		if let Some(parent) = parent {
			if tables.name_taken_by_folder(parent, name, Some(id)) {
				return Err(StoreError::Conflict(format!("folder '{name}'")));
			}
		}

		if let Some(folder) = tables.folders.get_mut(&id) {
			folder.name = name.to_string();
			folder.updated_at = now;
		}

		Ok(())
	}

	async fn rename_file(&self, id: FileId, name: &str) -> Result<(), StoreError> {
		let now = self.clock.now();
		let mut tables = self.tables.write();

		let folder_id = tables
			.files
			.get(&id)
			.ok_or_else(|| StoreError::NotFound(format!("file <id='{id}'>")))?
			.folder_id;
		if tables.name_taken_by_file(folder_id, name, Some(id)) {
			return Err(StoreError::Conflict(format!("file '{name}'")));
		}

		if let Some(file) = tables.files.get_mut(&id) {
			file.name = name.to_string();
			file.updated_at = now;
		}

		Ok(())
	}

	async fn delete_files(&self, ids: &[FileId]) -> Result<(), StoreError> {
		let mut tables = self.tables.write();
		for id in ids {
			tables.files.remove(id);
		}
		Ok(())
	}

	async fn delete_folders(&self, ids: &[FolderId]) -> Result<(), StoreError> {
		let mut tables = self.tables.write();
		for id in ids {
			tables.folders.remove(id);
		}
		Ok(())
	}

	async fn count_source_references(
		&self,
		policy: PolicyId,
		source_name: &str,
	) -> Result<usize, StoreError> {
		Ok(self
			.tables
			.read()
			.files
			.values()
			.filter(|file| file.policy_id == policy && file.source_name == source_name)
			.count())
	}

	async fn insert_task(&self, record: TaskRecord) -> Result<(), StoreError> {
		let mut tables = self.tables.write();
		if tables.tasks.contains_key(&record.id) {
			return Err(StoreError::Conflict(format!("task <id='{}'>", record.id)));
		}
		tables.tasks.insert(record.id, record);
		Ok(())
	}

	async fn get_task(&self, id: TaskId) -> Result<TaskRecord, StoreError> {
		self.tables
			.read()
			.tasks
			.get(&id)
			.cloned()
			.ok_or_else(|| StoreError::NotFound(format!("task <id='{id}'>")))
	}

	async fn list_tasks(&self, owner: UserId) -> Result<Vec<TaskRecord>, StoreError> {
		let mut tasks = self
			.tables
			.read()
			.tasks
			.values()
			.filter(|task| task.owner_id == owner)
			.cloned()
			.collect::<Vec<_>>();

		tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

		Ok(tasks)
	}

	async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<TaskRecord, StoreError> {
		let now = self.clock.now();
		let mut tables = self.tables.write();

		let task = tables
			.tasks
			.get_mut(&id)
			.ok_or_else(|| StoreError::NotFound(format!("task <id='{id}'>")))?;

		if task.state.is_terminal() {
			return Err(StoreError::InvalidTransition {
				id,
				from: task.state,
			});
		}

		if let Some(state) = update.state {
			task.state = state;
		}
		if let Some(progress) = update.progress {
			task.progress = progress;
		}
		if update.error.is_some() {
			task.error = update.error;
		}
		task.updated_at = now;

		Ok(task.clone())
	}

	async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
		self.tables
			.write()
			.tasks
			.remove(&id)
			.map(|_| ())
			.ok_or_else(|| StoreError::NotFound(format!("task <id='{id}'>")))
	}
}
