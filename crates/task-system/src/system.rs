use std::{
	marker::PhantomData,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use async_channel as chan;
use futures_concurrency::future::Join;
use tokio::{
	sync::{oneshot, Mutex},
	task::JoinHandle,
};
use tracing::{error, info, trace, warn};

use super::{
	error::{RunError, SystemError},
	task::{IntoTask, Task, TaskHandle, TaskWorkState},
	worker::WorkerBuilder,
};

/// Owns the workers and the bounded queue feeding them
pub struct System<T, E> {
	workers_count: usize,
	dispatcher: Dispatcher<T, E>,
	worker_handles: Mutex<Option<Vec<JoinHandle<()>>>>,
}

impl<T: Task<E>, E: RunError> System<T, E> {
	/// Spawns `workers_count` workers sharing a queue that holds at most `queue_capacity`
	/// pending tasks. Both values are clamped to at least 1.
	///
	/// Must be called from within a tokio runtime.
	#[must_use]
	pub fn new(workers_count: usize, queue_capacity: usize) -> Self {
		let workers_count = workers_count.max(1);
		let queue_capacity = queue_capacity.max(1);

		let (queue_tx, queue_rx) = chan::bounded(queue_capacity);
		let shutting_down = Arc::new(AtomicBool::new(false));

		let worker_handles = (0..workers_count)
			.map(|id| WorkerBuilder::new(id).build(queue_rx.clone(), Arc::clone(&shutting_down)))
			.collect::<Vec<_>>();

		info!(workers_count, queue_capacity, "Task system started");

		Self {
			workers_count,
			dispatcher: Dispatcher {
				queue_tx,
				queue_capacity,
				shutting_down,
				_task: PhantomData,
			},
			worker_handles: Mutex::new(Some(worker_handles)),
		}
	}

	/// Uses one worker per available CPU core
	#[must_use]
	pub fn with_available_parallelism(queue_capacity: usize) -> Self {
		let workers_count = std::thread::available_parallelism().map_or_else(
			|e| {
				error!(?e, "Failed to get available parallelism in the task system;");
				1
			},
			std::num::NonZeroUsize::get,
		);

		Self::new(workers_count, queue_capacity)
	}

	pub fn dispatch(&self, into_task: impl IntoTask<T>) -> Result<TaskHandle<T, E>, SystemError> {
		self.dispatcher.dispatch(into_task)
	}

	#[must_use]
	pub fn get_dispatcher(&self) -> Dispatcher<T, E> {
		self.dispatcher.clone()
	}

	#[must_use]
	pub const fn workers_count(&self) -> usize {
		self.workers_count
	}

	/// Stops accepting tasks, lets running tasks finish and hands queued ones back
	pub async fn shutdown(&self) {
		let Some(handles) = self.worker_handles.lock().await.take() else {
			warn!("Trying to shutdown the tasks system that was already shutdown");
			return;
		};

		self.dispatcher.shutting_down.store(true, Ordering::Release);
		self.dispatcher.queue_tx.close();

		handles
			.into_iter()
			.map(|handle| async move {
				if let Err(e) = handle.await {
					error!(?e, "Worker failed to shutdown on handle await;");
				}
			})
			.collect::<Vec<_>>()
			.join()
			.await;

		info!("Task system gracefully shutdown");
	}
}

/// Cheap cloneable handle to push tasks into a [`System`]
pub struct Dispatcher<T, E> {
	queue_tx: chan::Sender<TaskWorkState<T, E>>,
	queue_capacity: usize,
	shutting_down: Arc<AtomicBool>,
	_task: PhantomData<fn() -> T>,
}

impl<T, E> Clone for Dispatcher<T, E> {
	fn clone(&self) -> Self {
		Self {
			queue_tx: self.queue_tx.clone(),
			queue_capacity: self.queue_capacity,
			shutting_down: Arc::clone(&self.shutting_down),
			_task: PhantomData,
		}
	}
}

impl<T, E> std::fmt::Debug for Dispatcher<T, E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dispatcher")
			.field("queue_capacity", &self.queue_capacity)
			.field("queued", &self.queue_tx.len())
			.finish_non_exhaustive()
	}
}

impl<T: Task<E>, E: RunError> Dispatcher<T, E> {
	/// Enqueues a task without waiting. A full queue yields [`SystemError::Busy`] and the task is
	/// dropped, nothing is ever silently discarded after this returns `Ok`.
	pub fn dispatch(&self, into_task: impl IntoTask<T>) -> Result<TaskHandle<T, E>, SystemError> {
		if self.shutting_down.load(Ordering::Acquire) {
			return Err(SystemError::Shutdown);
		}

		let task = into_task.into_task();
		let task_id = task.id();

		let (done_tx, done_rx) = oneshot::channel();

		match self.queue_tx.try_send(TaskWorkState { task, done_tx }) {
			Ok(()) => {
				trace!(%task_id, "Task enqueued");
				Ok(TaskHandle::new(task_id, done_rx))
			}
			Err(chan::TrySendError::Full(_)) => {
				warn!(%task_id, capacity = self.queue_capacity, "Task queue is full, rejecting task");
				Err(SystemError::Busy(self.queue_capacity))
			}
			Err(chan::TrySendError::Closed(_)) => Err(SystemError::Shutdown),
		}
	}

	#[must_use]
	pub fn queued_count(&self) -> usize {
		self.queue_tx.len()
	}

	#[must_use]
	pub const fn capacity(&self) -> usize {
		self.queue_capacity
	}
}
