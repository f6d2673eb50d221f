//! Test harness shared by the integration tests: an in-memory store and backend, a manual
//! clock and one user with a root folder.

#![allow(dead_code)]

use std::{
	collections::HashSet,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use cumulus_cache::{Cache, ManualClock};
use cumulus_core::{
	archive::StandardCodec,
	backend::{BackendError, Backends, MemoryBackend, StorageBackend},
	explorer::ItemIds,
	hashid::ObjectKind,
	model::{CopyMode, File, Folder, Group, GroupOptions, StoragePolicy, TaskRecord, User},
	signer::KeyedSigner,
	store::{MemoryStore, Store},
	CoreConfig, CoreContext, Explorer, FileSystem,
};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub const BACKEND: &str = "memory";

pub struct TestHarness {
	pub store: Arc<MemoryStore>,
	pub backend: Arc<MemoryBackend>,
	pub clock: Arc<ManualClock>,
	pub ctx: Arc<CoreContext>,
	pub explorer: Explorer,
	pub policy: StoragePolicy,
	pub user: User,
	pub root: Folder,
}

pub struct TestHarnessBuilder {
	config: CoreConfig,
	options: GroupOptions,
	max_storage: u64,
	copy_mode: CopyMode,
	allowed_extensions: Vec<String>,
	backends: Option<(Arc<MemoryBackend>, Arc<dyn StorageBackend>)>,
}

impl TestHarnessBuilder {
	pub fn new() -> Self {
		Self {
			config: CoreConfig {
				hashid_secret: "hashid test secret".to_string(),
				sign_secret: "sign test secret".to_string(),
				max_workers: 2,
				task_queue_capacity: 8,
				..Default::default()
			},
			options: GroupOptions {
				archive_download: true,
				archive_task: true,
				compress_size: 0,
				decompress_size: 0,
			},
			max_storage: 1 << 20,
			copy_mode: CopyMode::Reference,
			allowed_extensions: vec![],
			backends: None,
		}
	}

	pub fn options(mut self, options: GroupOptions) -> Self {
		self.options = options;
		self
	}

	pub fn max_storage(mut self, max_storage: u64) -> Self {
		self.max_storage = max_storage;
		self
	}

	pub fn copy_mode(mut self, copy_mode: CopyMode) -> Self {
		self.copy_mode = copy_mode;
		self
	}

	pub fn allowed_extensions(mut self, extensions: &[&str]) -> Self {
		self.allowed_extensions = extensions.iter().map(ToString::to_string).collect();
		self
	}

	pub fn workers(mut self, workers: usize, queue_capacity: usize) -> Self {
		self.config.max_workers = workers;
		self.config.task_queue_capacity = queue_capacity;
		self
	}

	/// Registers `front` in place of the plain in-memory backend; `memory` is what it wraps
	pub fn backends(mut self, memory: Arc<MemoryBackend>, front: Arc<dyn StorageBackend>) -> Self {
		self.backends = Some((memory, front));
		self
	}

	pub fn build(self) -> TestHarness {
		let clock = Arc::new(ManualClock::starting_at(
			Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
		));

		let store = Arc::new(MemoryStore::with_clock(clock.clone()));
		let policy = StoragePolicy {
			id: 1,
			name: "Default policy".to_string(),
			backend: BACKEND.to_string(),
			max_size: 0,
			allowed_extensions: self.allowed_extensions,
			copy_mode: self.copy_mode,
		};
		store.insert_policy(policy.clone());

		let (user, root) = store.insert_user(
			"alice",
			Group {
				id: 1,
				name: "Users".to_string(),
				max_storage: self.max_storage,
				options: self.options,
			},
			policy.id,
		);

		let (backend, registered) = self.backends.unwrap_or_else(|| {
			let backend = Arc::new(MemoryBackend::new());
			(backend.clone(), backend as Arc<dyn StorageBackend>)
		});

		let ctx = CoreContext::new(
			self.config.clone(),
			store.clone(),
			Backends::new().with(BACKEND, registered),
			Arc::new(StandardCodec),
			Arc::new(KeyedSigner::new(&self.config.sign_secret, clock.clone())),
			Arc::new(Cache::with_clock(clock.clone())),
		);

		TestHarness {
			explorer: Explorer::new(Arc::clone(&ctx)),
			store,
			backend,
			clock,
			ctx,
			policy,
			user,
			root,
		}
	}
}

impl TestHarness {
	pub async fn fs(&self) -> FileSystem<'_> {
		FileSystem::new(&self.ctx, self.user.id).await.unwrap()
	}

	pub async fn put(&self, folder: &Folder, name: &str, data: &[u8]) -> File {
		self.fs().await.put_file(folder, name, data).await.unwrap()
	}

	pub async fn mkdir(&self, parent: &Folder, name: &str) -> Folder {
		self.fs().await.ensure_folder(parent, name).await.unwrap()
	}

	pub async fn fresh_user(&self) -> User {
		self.store.get_user(self.user.id).await.unwrap()
	}

	/// A second user sharing the policy, with every capability on
	pub fn other_user(&self) -> (User, Folder) {
		self.store.insert_user(
			"mallory",
			Group {
				id: 2,
				name: "Others".to_string(),
				max_storage: 1 << 20,
				options: GroupOptions {
					archive_download: true,
					archive_task: true,
					..Default::default()
				},
			},
			self.policy.id,
		)
	}

	pub fn ids(&self, folders: &[&Folder], files: &[&File]) -> ItemIds {
		let hashids = self.explorer.hashids();
		ItemIds {
			dirs: folders
				.iter()
				.map(|folder| hashids.encode(ObjectKind::Folder, folder.id))
				.collect(),
			items: files
				.iter()
				.map(|file| hashids.encode(ObjectKind::File, file.id))
				.collect(),
		}
	}

	/// Polls the task record until the job ended
	pub async fn wait_for_terminal(&self, task_id: uuid::Uuid) -> TaskRecord {
		for _ in 0..500 {
			let record = self.store.get_task(task_id).await.unwrap();
			if record.state.is_terminal() {
				return record;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}

		panic!("task {task_id} never reached a terminal state");
	}
}

/// Refuses deletes of marked paths, everything else goes to the inner backend
#[derive(Debug)]
pub struct FlakyBackend {
	inner: Arc<MemoryBackend>,
	failing: Mutex<HashSet<String>>,
	fail_all: AtomicBool,
}

impl FlakyBackend {
	pub fn new(inner: Arc<MemoryBackend>) -> Self {
		Self {
			inner,
			failing: Mutex::default(),
			fail_all: AtomicBool::new(false),
		}
	}

	pub fn fail_delete_of(&self, path: &str) {
		self.failing.lock().insert(path.to_string());
	}

	pub fn fail_all_deletes(&self) {
		self.fail_all.store(true, Ordering::Relaxed);
	}
}

#[async_trait]
impl StorageBackend for FlakyBackend {
	async fn exists(&self, path: &str) -> Result<bool, BackendError> {
		self.inner.exists(path).await
	}

	async fn read(&self, path: &str) -> Result<Vec<u8>, BackendError> {
		self.inner.read(path).await
	}

	async fn write(&self, path: &str, data: &[u8]) -> Result<(), BackendError> {
		self.inner.write(path, data).await
	}

	async fn delete(&self, path: &str) -> Result<(), BackendError> {
		if self.fail_all.load(Ordering::Relaxed) || self.failing.lock().contains(path) {
			return Err(BackendError::Unavailable(format!("refusing to delete '{path}'")));
		}
		self.inner.delete(path).await
	}

	async fn rename(&self, from: &str, to: &str) -> Result<(), BackendError> {
		self.inner.rename(from, to).await
	}

	async fn copy(&self, from: &str, to: &str) -> Result<(), BackendError> {
		self.inner.copy(from, to).await
	}
}

/// Holds every read until the gate is opened
#[derive(Debug)]
pub struct GatedBackend {
	inner: Arc<MemoryBackend>,
	gate: Semaphore,
}

impl GatedBackend {
	pub fn new(inner: Arc<MemoryBackend>) -> Self {
		Self {
			inner,
			gate: Semaphore::new(0),
		}
	}

	pub fn open(&self) {
		self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
	}
}

#[async_trait]
impl StorageBackend for GatedBackend {
	async fn exists(&self, path: &str) -> Result<bool, BackendError> {
		self.inner.exists(path).await
	}

	async fn read(&self, path: &str) -> Result<Vec<u8>, BackendError> {
		let _permit = self
			.gate
			.acquire()
			.await
			.map_err(|e| BackendError::Unavailable(e.to_string()))?;
		self.inner.read(path).await
	}

	async fn write(&self, path: &str, data: &[u8]) -> Result<(), BackendError> {
		self.inner.write(path, data).await
	}

	async fn delete(&self, path: &str) -> Result<(), BackendError> {
		self.inner.delete(path).await
	}

	async fn rename(&self, from: &str, to: &str) -> Result<(), BackendError> {
		self.inner.rename(from, to).await
	}

	async fn copy(&self, from: &str, to: &str) -> Result<(), BackendError> {
		self.inner.copy(from, to).await
	}
}
