use std::{
	any::Any,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use async_channel as chan;
use tokio::spawn;
use tracing::{error, trace, warn, Instrument};

use super::{
	super::{
		error::RunError,
		task::{Task, TaskStatus, TaskWorkState},
	},
	WorkerId,
};

/// Pulls tasks from the shared queue until it is closed and drained
pub(super) async fn run<T: Task<E>, E: RunError>(
	id: WorkerId,
	queue_rx: chan::Receiver<TaskWorkState<T, E>>,
	shutting_down: Arc<AtomicBool>,
) {
	while let Ok(TaskWorkState { mut task, done_tx }) = queue_rx.recv().await {
		let task_id = task.id();

		if shutting_down.load(Ordering::Acquire) {
			trace!(%task_id, "Giving task back to its dispatcher due to shutdown");
			if done_tx.send(TaskStatus::Shutdown(Box::new(task))).is_err() {
				warn!(%task_id, "Task handle was dropped before receiving the shutdown status");
			}
			continue;
		}

		trace!(%task_id, worker_id = id, "Running task");

		// Each task runs on its own tokio task so a panic stays confined to it
		let status = match spawn(async move { task.run().await }.in_current_span()).await {
			Ok(Ok(output)) => TaskStatus::Done((task_id, output)),
			Ok(Err(e)) => {
				trace!(%task_id, ?e, "Task finished with an error");
				TaskStatus::Error(e)
			}
			Err(e) if e.is_panic() => {
				let message = panic_message(e.into_panic());
				error!(%task_id, %message, "Task panicked;");
				TaskStatus::Panicked(message)
			}
			Err(e) => {
				error!(%task_id, ?e, "Task was aborted by the runtime;");
				TaskStatus::Panicked(e.to_string())
			}
		};

		if done_tx.send(status).is_err() {
			warn!(%task_id, "Task handle was dropped before the task finished");
		}
	}

	trace!(worker_id = id, "Task queue closed");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
	payload
		.downcast_ref::<&str>()
		.map(ToString::to_string)
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "task panicked with a non-string payload".to_string())
}
