use cumulus_task_system::{Task, TaskId, TaskOutput};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::info;

#[derive(Debug, Error)]
pub enum SampleError {
	#[error("Sample error")]
	SampleError,
}

#[derive(Debug)]
enum Behavior {
	Ready,
	Bogus,
	Panic,
	WaitSignal {
		began_tx: Option<oneshot::Sender<()>>,
		signal_rx: oneshot::Receiver<()>,
	},
}

#[derive(Debug)]
pub struct SampleTask {
	id: TaskId,
	behavior: Behavior,
}

impl SampleTask {
	fn with(behavior: Behavior) -> Self {
		Self {
			id: TaskId::new_v4(),
			behavior,
		}
	}

	pub fn ready() -> Self {
		Self::with(Behavior::Ready)
	}

	pub fn bogus() -> Self {
		Self::with(Behavior::Bogus)
	}

	pub fn panicking() -> Self {
		Self::with(Behavior::Panic)
	}

	/// Returns the task, a receiver fired once the task starts running and a sender that lets it finish
	pub fn wait_signal() -> (Self, oneshot::Receiver<()>, oneshot::Sender<()>) {
		let (began_tx, began_rx) = oneshot::channel();
		let (signal_tx, signal_rx) = oneshot::channel();

		(
			Self::with(Behavior::WaitSignal {
				began_tx: Some(began_tx),
				signal_rx,
			}),
			began_rx,
			signal_tx,
		)
	}
}

#[async_trait]
impl Task<SampleError> for SampleTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self) -> Result<TaskOutput, SampleError> {
		match &mut self.behavior {
			Behavior::Ready => Ok(TaskOutput::Empty),
			Behavior::Bogus => Err(SampleError::SampleError),
			Behavior::Panic => panic!("boom"),
			Behavior::WaitSignal {
				began_tx,
				signal_rx,
			} => {
				if let Some(began_tx) = began_tx.take() {
					began_tx.send(()).expect("began receiver dropped");
				}

				info!("Waiting for signal <id='{}'>", self.id);
				signal_rx.await.expect("signal sender dropped");

				Ok(TaskOutput::Empty)
			}
		}
	}
}
