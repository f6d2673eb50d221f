use std::sync::{atomic::AtomicBool, Arc};

use async_channel as chan;
use tokio::{spawn, task::JoinHandle};
use tracing::{error, info, info_span, trace, Instrument};

use super::{
	error::RunError,
	task::{Task, TaskWorkState},
};

mod run;

use run::run;

pub(crate) type WorkerId = usize;

pub(crate) struct WorkerBuilder {
	id: WorkerId,
}

impl WorkerBuilder {
	pub const fn new(id: WorkerId) -> Self {
		Self { id }
	}

	pub fn build<T: Task<E>, E: RunError>(
		self,
		queue_rx: chan::Receiver<TaskWorkState<T, E>>,
		shutting_down: Arc<AtomicBool>,
	) -> JoinHandle<()> {
		let Self { id } = self;

		spawn(
			async move {
				trace!("Worker message processing task starting...");
				while let Err(e) = spawn(
					run(id, queue_rx.clone(), Arc::clone(&shutting_down)).in_current_span(),
				)
				.await
				{
					if e.is_panic() {
						error!(?e, "Worker critically failed and will restart;");
					} else {
						trace!("Worker was aborted and will exit...");
						break;
					}
				}

				info!("Worker gracefully shutdown");
			}
			.instrument(info_span!("task_system_worker", worker_id = id)),
		)
	}
}
