//! Background archive jobs and the engine that schedules them.
//!
//! Job kinds are a closed set: [`Job`] is matched in [`ScheduledJob::run`], there is no runtime
//! type registry. Each job runs once on the bounded worker pool of `cumulus-task-system`; its
//! [`TaskRecord`] in the store is the only thing the submitter ever sees of it afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cumulus_task_system::{
	IntoAnyTaskOutput, Task, TaskHandle, TaskId, TaskOutput, TaskStatus, TaskSystem,
	TaskSystemError,
};
use cumulus_utils::error::report_error;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn, Instrument};
use uuid::Uuid;

use crate::{
	context::CoreContext,
	model::{File, TaskKind, TaskProgress, TaskRecord, TaskState, TaskUpdate, UserId},
	store::Store,
	vfs::{FileSystem, ItemSelection},
	Error,
};

mod compress;
mod decompress;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressJob {
	pub selection: ItemSelection,
	/// Folder receiving the archive
	pub dst: String,
	/// Archive file name, extension included
	pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompressJob {
	/// Path of the archive file
	pub src: String,
	/// Folder receiving the extracted tree
	pub dst: String,
	/// Charset of entry names, `None` for UTF-8
	pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
	Compress(CompressJob),
	Decompress(DecompressJob),
}

impl Job {
	#[must_use]
	pub const fn kind(&self) -> TaskKind {
		match self {
			Self::Compress(_) => TaskKind::Compress,
			Self::Decompress(_) => TaskKind::Decompress,
		}
	}
}

/// What a successful job hands back to its watcher
#[derive(Debug)]
pub enum JobOutput {
	ArchiveCreated(File),
	Extracted { folders: usize, files: usize },
}

/// Writes progress into the task record; a failed write never fails the job
struct Progress<'a> {
	store: &'a dyn Store,
	task_id: TaskId,
}

impl Progress<'_> {
	async fn report(&self, done: u64, total: u64) {
		report_error(
			&self
				.store
				.update_task(self.task_id, TaskUpdate::progress(done, total))
				.await
				.map(|_| ()),
			"Failed to record job progress;",
		);
	}
}

pub struct ScheduledJob {
	id: TaskId,
	owner: UserId,
	job: Job,
	ctx: Arc<CoreContext>,
}

impl std::fmt::Debug for ScheduledJob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScheduledJob")
			.field("id", &self.id)
			.field("owner", &self.owner)
			.field("job", &self.job)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl Task<Error> for ScheduledJob {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self) -> Result<TaskOutput, Error> {
		let ctx = &*self.ctx;

		ctx.store
			.update_task(self.id, TaskUpdate::state(TaskState::Running))
			.await?;

		let fs = FileSystem::new(ctx, self.owner).await?;
		let progress = Progress {
			store: ctx.store.as_ref(),
			task_id: self.id,
		};

		let output = match &self.job {
			Job::Compress(job) => compress::run(ctx, &fs, job, &progress).await?,
			Job::Decompress(job) => decompress::run(ctx, &fs, job, &progress).await?,
		};

		debug!(task_id = %self.id, ?output, "Job finished");

		Ok(output.into_output())
	}
}

/// Accepts jobs without blocking and records how each one ends
pub struct TaskEngine {
	system: TaskSystem<ScheduledJob, Error>,
	ctx: Arc<CoreContext>,
	watchers: Mutex<JoinSet<()>>,
}

impl std::fmt::Debug for TaskEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TaskEngine")
			.field("workers", &self.system.workers_count())
			.field("watching", &self.watchers.lock().len())
			.finish_non_exhaustive()
	}
}

impl TaskEngine {
	/// Must be called from within a tokio runtime
	#[must_use]
	pub fn new(ctx: Arc<CoreContext>) -> Self {
		Self {
			system: TaskSystem::new(ctx.config.max_workers, ctx.config.task_queue_capacity),
			ctx,
			watchers: Mutex::default(),
		}
	}

	/// Records the job as queued and hands it to the worker pool.
	///
	/// Fails fast with [`Error::Busy`] when the queue is full; the job then leaves no record.
	pub async fn submit(&self, owner: UserId, job: Job) -> Result<TaskRecord, Error> {
		let now = Utc::now();
		let record = TaskRecord {
			id: Uuid::new_v4(),
			owner_id: owner,
			kind: job.kind(),
			params: serde_json::to_value(&job).unwrap_or_default(),
			state: TaskState::Queued,
			progress: TaskProgress::default(),
			error: None,
			created_at: now,
			updated_at: now,
		};

		self.ctx.store.insert_task(record.clone()).await?;

		let dispatched = self.system.dispatch(ScheduledJob {
			id: record.id,
			owner,
			job,
			ctx: Arc::clone(&self.ctx),
		});

		match dispatched {
			Ok(handle) => {
				info!(task_id = %record.id, kind = ?record.kind, %owner, "Job submitted");

				let mut watchers = self.watchers.lock();
				// Reap watchers that are done so the set doesn't grow with history
				while watchers.try_join_next().is_some() {}
				watchers.spawn(
					watch(Arc::clone(&self.ctx.store), handle)
						.instrument(tracing::info_span!("job_watcher", task_id = %record.id)),
				);

				Ok(record)
			}
			Err(e) => {
				report_error(
					&self.ctx.store.delete_task(record.id).await,
					"Failed to drop record of rejected job;",
				);

				Err(match e {
					TaskSystemError::Busy(capacity) => {
						warn!(capacity, %owner, "Job rejected, queue is full");
						Error::Busy
					}
					TaskSystemError::Shutdown | TaskSystemError::TaskJoin(_) => Error::ShuttingDown,
				})
			}
		}
	}

	/// Stops accepting jobs, lets running ones finish and fails the ones still queued.
	/// Returns once every submitted job has a terminal record.
	pub async fn shutdown(&self) {
		self.system.shutdown().await;

		let mut watchers = std::mem::take(&mut *self.watchers.lock());
		while let Some(res) = watchers.join_next().await {
			if let Err(e) = res {
				warn!(?e, "Job watcher failed;");
			}
		}

		info!("Task engine shutdown");
	}
}

/// Turns the job's terminal status into its terminal record state
async fn watch(store: Arc<dyn Store>, handle: TaskHandle<ScheduledJob, Error>) {
	let task_id = handle.task_id();

	let update = match handle.await {
		Ok(TaskStatus::Done(_)) => {
			trace!("Job succeeded");
			TaskUpdate::state(TaskState::Succeeded)
		}
		Ok(TaskStatus::Error(e)) => {
			warn!(?e, "Job failed;");
			TaskUpdate::failed(e.to_string())
		}
		Ok(TaskStatus::Panicked(message)) => TaskUpdate::failed(format!("job panicked: {message}")),
		Ok(TaskStatus::Shutdown(_)) => {
			TaskUpdate::failed("the task engine shut down before the job started")
		}
		Err(e) => TaskUpdate::failed(e.to_string()),
	};

	report_error(
		&store.update_task(task_id, update).await.map(|_| ()),
		"Failed to record job outcome;",
	);
}
